use quillcraft::Config;

fn api_key_state(config: &Config) -> &'static str {
    match config.api_key.as_deref() {
        Some(key) if !key.is_empty() => "set",
        _ => "missing (set QUILLCRAFT_API_KEY or OPENAI_API_KEY)",
    }
}

pub fn render_status(config: &Config) -> String {
    let generation = &config.generation;
    let lines = [
        "◆ Quillcraft status".to_string(),
        String::new(),
        format!("Version      {}", env!("CARGO_PKG_VERSION")),
        format!("Workspace    {}", config.workspace_dir.display()),
        format!("Config       {}", config.config_path.display()),
        String::new(),
        format!("Endpoint     {}", config.provider.base_url),
        format!("API key      {}", api_key_state(config)),
        format!("Model        {}", config.default_model),
        format!("  select     {}", config.model_for(generation.select_model.as_ref())),
        format!("  draft      {}", config.model_for(generation.draft_model.as_ref())),
        format!("  revise     {}", config.model_for(generation.revise_model.as_ref())),
        format!("  extract    {}", config.model_for(generation.extract_model.as_ref())),
        format!("Temperature  {}", config.default_temperature),
        format!("Timeout      {}s per generation call", generation.timeout_secs),
        String::new(),
        format!(
            "Checkpoints  {} ({})",
            config.storage.checkpoint_backend,
            config.checkpoint_db_path().display()
        ),
        format!(
            "Memories     {} ({})",
            config.storage.memory_backend,
            config.memory_store_path().display()
        ),
    ];
    lines.join("\n")
}

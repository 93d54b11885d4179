use super::Config;
use std::path::PathBuf;

impl Config {
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) =
            std::env::var("QUILLCRAFT_API_KEY").or_else(|_| std::env::var("OPENAI_API_KEY"))
            && !key.is_empty()
        {
            self.api_key = Some(key);
        }

        if let Ok(model) = std::env::var("QUILLCRAFT_MODEL")
            && !model.is_empty()
        {
            self.default_model = model;
        }

        if let Ok(base_url) = std::env::var("QUILLCRAFT_BASE_URL")
            && !base_url.is_empty()
        {
            self.provider.base_url = base_url;
        }

        if let Ok(workspace) = std::env::var("QUILLCRAFT_WORKSPACE")
            && !workspace.is_empty()
        {
            self.workspace_dir = PathBuf::from(workspace);
        }

        if let Ok(temp_str) = std::env::var("QUILLCRAFT_TEMPERATURE")
            && let Ok(temp) = temp_str.parse::<f64>()
            && (0.0..=2.0).contains(&temp)
        {
            self.default_temperature = temp;
        }
    }
}

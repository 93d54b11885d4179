use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ── Top-level config ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Workspace directory - computed from home, not serialized
    #[serde(skip)]
    pub workspace_dir: PathBuf,
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_temperature")]
    pub default_temperature: f64,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}

fn default_temperature() -> f64 {
    0.7
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace_dir: PathBuf::new(),
            config_path: PathBuf::new(),
            api_key: None,
            default_model: default_model(),
            default_temperature: default_temperature(),
            provider: ProviderConfig::default(),
            generation: GenerationConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(ConfigError::Validation(format!(
                "default_temperature must be within 0.0..=2.0, got {}",
                self.default_temperature
            )));
        }
        if self.default_model.trim().is_empty() {
            return Err(ConfigError::Validation("default_model is empty".into()));
        }
        if self.provider.request_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "provider.request_timeout_secs must be positive".into(),
            ));
        }
        if self.generation.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "generation.timeout_secs must be positive".into(),
            ));
        }
        if self.generation.max_suggested_memories == 0 {
            return Err(ConfigError::Validation(
                "generation.max_suggested_memories must be positive".into(),
            ));
        }
        if !self.provider.base_url.starts_with("http://")
            && !self.provider.base_url.starts_with("https://")
        {
            return Err(ConfigError::Validation(format!(
                "provider.base_url must be an http(s) URL, got {}",
                self.provider.base_url
            )));
        }
        Ok(())
    }

    /// Model for one collaborator call, falling back to the default.
    pub fn model_for(&self, override_model: Option<&String>) -> String {
        override_model
            .filter(|m| !m.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| self.default_model.clone())
    }

    pub fn checkpoint_db_path(&self) -> PathBuf {
        self.workspace_dir.join("checkpoints.db")
    }

    pub fn memory_store_path(&self) -> PathBuf {
        match self.storage.memory_backend {
            MemoryBackend::Json => self.workspace_dir.join("users.json"),
            MemoryBackend::Sqlite => self.workspace_dir.join("memories.db"),
        }
    }
}

// ── Provider ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// OpenAI-compatible API root, without the `/chat/completions` suffix
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

// ── Generation ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Upper bound for a single collaborator call
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub select_model: Option<String>,
    #[serde(default)]
    pub draft_model: Option<String>,
    #[serde(default)]
    pub revise_model: Option<String>,
    #[serde(default)]
    pub extract_model: Option<String>,
    /// Cap on memory statements proposed after one task
    #[serde(default = "default_max_suggested_memories")]
    pub max_suggested_memories: usize,
}

fn default_generation_timeout_secs() -> u64 {
    90
}

fn default_max_suggested_memories() -> usize {
    3
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_generation_timeout_secs(),
            select_model: None,
            draft_model: None,
            revise_model: None,
            extract_model: None,
            max_suggested_memories: default_max_suggested_memories(),
        }
    }
}

// ── Storage ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CheckpointBackend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MemoryBackend {
    #[default]
    Json,
    Sqlite,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub checkpoint_backend: CheckpointBackend,
    #[serde(default)]
    pub memory_backend: MemoryBackend,
}

mod env_overrides;
mod loader;
pub mod schema;

pub use schema::{
    CheckpointBackend, Config, GenerationConfig, MemoryBackend, ProviderConfig, StorageConfig,
};

use crate::config::{MemoryBackend, StorageConfig};

use super::{JsonMemoryStore, MemoryStore, SqliteMemoryStore};

use std::path::Path;
use std::sync::Arc;

pub async fn create_memory_store(
    config: &StorageConfig,
    workspace_dir: &Path,
) -> anyhow::Result<Arc<dyn MemoryStore>> {
    let store: Arc<dyn MemoryStore> = match config.memory_backend {
        MemoryBackend::Json => Arc::new(JsonMemoryStore::new(workspace_dir.join("users.json"))),
        MemoryBackend::Sqlite => {
            Arc::new(SqliteMemoryStore::open(&workspace_dir.join("memories.db")).await?)
        }
    };

    if !store.health_check().await {
        tracing::warn!(backend = store.name(), "memory store failed its health check");
    }

    Ok(store)
}

use super::traits::MemoryStore;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::sync::Mutex;

/// On-disk record for one user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct UserRecord {
    #[serde(default)]
    memories: Vec<String>,
    /// Ids of writes already applied to `memories`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    applied_writes: Vec<String>,
}

type UsersFile = BTreeMap<String, UserRecord>;

/// JSON file store: `{"<user>": {"memories": ["..."]}}`.
///
/// Writes go to a sibling temp file and are renamed over the original, so a
/// crash mid-write leaves the previous contents intact.
pub struct JsonMemoryStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonMemoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<UsersFile> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(UsersFile::new()),
            Ok(contents) => serde_json::from_str(&contents)
                .with_context(|| format!("parse memory file {}", self.path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(UsersFile::new()),
            Err(e) => {
                Err(e).with_context(|| format!("read memory file {}", self.path.display()))
            }
        }
    }

    async fn persist(&self, data: &UsersFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create memory directory {}", parent.display()))?;
        }
        let body = serde_json::to_string_pretty(data).context("serialize memory file")?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .with_context(|| format!("write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replace {}", self.path.display()))?;
        Ok(())
    }
}

impl MemoryStore for JsonMemoryStore {
    fn name(&self) -> &str {
        "json"
    }

    fn get_memories<'a>(
        &'a self,
        user: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>>> + Send + 'a>> {
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            let mut data = self.load().await?;
            if let Some(record) = data.get(user) {
                return Ok(record.memories.clone());
            }
            // Unknown users are created empty on first read.
            data.insert(user.to_string(), UserRecord::default());
            self.persist(&data).await?;
            Ok(Vec::new())
        })
    }

    fn add_memories<'a>(
        &'a self,
        user: &'a str,
        write_id: &'a str,
        memories: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>> {
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            let mut data = self.load().await?;
            let record = data.entry(user.to_string()).or_default();
            if record.applied_writes.iter().any(|id| id == write_id) {
                return Ok(false);
            }
            record.memories.extend(memories.iter().cloned());
            record.applied_writes.push(write_id.to_string());
            self.persist(&data).await?;
            Ok(true)
        })
    }

    fn list_users(&self) -> Pin<Box<dyn Future<Output = Result<Vec<String>>> + Send + '_>> {
        Box::pin(async move {
            let data = self.load().await?;
            Ok(data.into_keys().collect())
        })
    }
}

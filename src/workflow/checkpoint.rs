use super::graph::NodeName;
use super::state::SessionState;
use super::suspension::Suspension;
use crate::config::CheckpointBackend;
use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use strum::{Display, EnumString};

/// Where a session stands after its latest run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunStatus {
    Suspended,
    Completed,
    Rejected,
}

/// Latest durable record of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub session_id: String,
    pub state: SessionState,
    pub pending_suspension: Option<Suspension>,
    pub status: RunStatus,
    /// Every node entered, in order. Resumes do not add entries.
    pub trail: Vec<NodeName>,
    /// Bumped on every write.
    pub version: u64,
    pub updated_at: String,
}

impl Checkpoint {
    pub fn suspended(
        session_id: impl Into<String>,
        state: SessionState,
        suspension: Suspension,
        trail: Vec<NodeName>,
        version: u64,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            state,
            pending_suspension: Some(suspension),
            status: RunStatus::Suspended,
            trail,
            version,
            updated_at: Utc::now().to_rfc3339(),
        }
    }

    pub fn terminal(
        session_id: impl Into<String>,
        state: SessionState,
        status: RunStatus,
        trail: Vec<NodeName>,
        version: u64,
    ) -> Self {
        debug_assert_ne!(status, RunStatus::Suspended);
        Self {
            session_id: session_id.into(),
            state,
            pending_suspension: None,
            status,
            trail,
            version,
            updated_at: Utc::now().to_rfc3339(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.pending_suspension.is_none()
    }
}

/// Durable mapping from session id to its latest checkpoint.
///
/// `save` is a full overwrite; last writer wins. The engine is the only
/// writer and serialises calls per session.
pub trait CheckpointStore: Send + Sync {
    fn name(&self) -> &str;

    fn load<'a>(
        &'a self,
        session_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Checkpoint>>> + Send + 'a>>;

    fn save<'a>(
        &'a self,
        checkpoint: &'a Checkpoint,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    /// Session ids, most recently updated first.
    fn list_sessions(&self) -> Pin<Box<dyn Future<Output = Result<Vec<String>>> + Send + '_>>;
}

// ─── In-process store ──────────────────────────────────────────────────────

/// Checkpoints held in memory; lost on restart.
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    checkpoints: Mutex<HashMap<String, Checkpoint>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for InMemoryCheckpointStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn load<'a>(
        &'a self,
        session_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Checkpoint>>> + Send + 'a>> {
        Box::pin(async move {
            let checkpoints = self
                .checkpoints
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            Ok(checkpoints.get(session_id).cloned())
        })
    }

    fn save<'a>(
        &'a self,
        checkpoint: &'a Checkpoint,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.checkpoints
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(checkpoint.session_id.clone(), checkpoint.clone());
            Ok(())
        })
    }

    fn list_sessions(&self) -> Pin<Box<dyn Future<Output = Result<Vec<String>>> + Send + '_>> {
        Box::pin(async move {
            let checkpoints = self
                .checkpoints
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let mut entries: Vec<(&String, &String)> = checkpoints
                .values()
                .map(|c| (&c.updated_at, &c.session_id))
                .collect();
            entries.sort_by(|a, b| b.cmp(a));
            Ok(entries.into_iter().map(|(_, id)| id.clone()).collect())
        })
    }
}

// ─── SQLite store ──────────────────────────────────────────────────────────

/// SQLite-backed checkpoint store using sqlx async pool.
pub struct SqliteCheckpointStore {
    pool: SqlitePool,
}

const CHECKPOINT_SCHEMA_META_TABLE: &str = "
CREATE TABLE IF NOT EXISTS checkpoint_schema_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
)";
const CHECKPOINT_SCHEMA_VERSION_KEY: &str = "checkpoint_schema_version";
const CHECKPOINT_SCHEMA_VERSION: u32 = 1;

async fn ensure_checkpoint_schema_version(pool: &SqlitePool) -> Result<()> {
    sqlx::query(CHECKPOINT_SCHEMA_META_TABLE)
        .execute(pool)
        .await
        .context("create checkpoint_schema_meta table")?;

    let stored_version: Option<(String,)> =
        sqlx::query_as("SELECT value FROM checkpoint_schema_meta WHERE key = $1")
            .bind(CHECKPOINT_SCHEMA_VERSION_KEY)
            .fetch_optional(pool)
            .await
            .context("load checkpoint schema version")?;

    if let Some((value,)) = stored_version {
        let parsed = value
            .parse::<u32>()
            .with_context(|| format!("invalid checkpoint schema version value: {value}"))?;
        anyhow::ensure!(
            parsed == CHECKPOINT_SCHEMA_VERSION,
            "incompatible checkpoint schema version: stored={parsed}, expected={CHECKPOINT_SCHEMA_VERSION}. \
remove the checkpoint DB and restart."
        );
        return Ok(());
    }

    sqlx::query("INSERT INTO checkpoint_schema_meta (key, value) VALUES ($1, $2)")
        .bind(CHECKPOINT_SCHEMA_VERSION_KEY)
        .bind(CHECKPOINT_SCHEMA_VERSION.to_string())
        .execute(pool)
        .await
        .context("persist checkpoint schema version")?;

    Ok(())
}

impl SqliteCheckpointStore {
    /// Create a new store with an existing pool and run migrations.
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        ensure_checkpoint_schema_version(&pool).await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS checkpoints (
                 session_id TEXT PRIMARY KEY,
                 state TEXT NOT NULL,
                 pending_suspension TEXT,
                 status TEXT NOT NULL,
                 trail TEXT NOT NULL,
                 version INTEGER NOT NULL,
                 created_at TEXT NOT NULL,
                 updated_at TEXT NOT NULL
             )",
        )
        .execute(&pool)
        .await
        .context("create checkpoints table")?;

        Ok(Self { pool })
    }

    /// Open (or create) the database file at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create checkpoint directory {}", parent.display()))?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .with_context(|| format!("open checkpoint database {}", path.display()))?;
        Self::new(pool).await
    }
}

fn map_checkpoint_row(row: &SqliteRow) -> Result<Checkpoint> {
    let state_raw: String = row.try_get("state")?;
    let suspension_raw: Option<String> = row.try_get("pending_suspension")?;
    let status_raw: String = row.try_get("status")?;
    let trail_raw: String = row.try_get("trail")?;
    let version: i64 = row.try_get("version")?;

    Ok(Checkpoint {
        session_id: row.try_get("session_id")?,
        state: serde_json::from_str(&state_raw).context("deserialize session state")?,
        pending_suspension: suspension_raw
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .context("deserialize pending suspension")?,
        status: RunStatus::from_str(&status_raw)
            .map_err(|_| anyhow::anyhow!("unknown run status: {status_raw}"))?,
        trail: serde_json::from_str(&trail_raw).context("deserialize transition trail")?,
        version: u64::try_from(version).context("negative checkpoint version")?,
        updated_at: row.try_get("updated_at")?,
    })
}

impl CheckpointStore for SqliteCheckpointStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn load<'a>(
        &'a self,
        session_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Checkpoint>>> + Send + 'a>> {
        Box::pin(async move {
            let row = sqlx::query(
                "SELECT session_id, state, pending_suspension, status, trail, version, updated_at
                 FROM checkpoints
                 WHERE session_id = $1",
            )
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .context("query checkpoint by session id")?;

            row.map(|r| map_checkpoint_row(&r)).transpose()
        })
    }

    fn save<'a>(
        &'a self,
        checkpoint: &'a Checkpoint,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let state = serde_json::to_string(&checkpoint.state)?;
            let suspension = checkpoint
                .pending_suspension
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;
            let trail = serde_json::to_string(&checkpoint.trail)?;
            let version = i64::try_from(checkpoint.version).context("checkpoint version overflow")?;

            sqlx::query(
                "INSERT INTO checkpoints
                     (session_id, state, pending_suspension, status, trail, version, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
                 ON CONFLICT(session_id) DO UPDATE SET
                     state = excluded.state,
                     pending_suspension = excluded.pending_suspension,
                     status = excluded.status,
                     trail = excluded.trail,
                     version = excluded.version,
                     updated_at = excluded.updated_at",
            )
            .bind(&checkpoint.session_id)
            .bind(&state)
            .bind(suspension)
            .bind(checkpoint.status.to_string())
            .bind(&trail)
            .bind(version)
            .bind(&checkpoint.updated_at)
            .execute(&self.pool)
            .await
            .context("save checkpoint")?;

            Ok(())
        })
    }

    fn list_sessions(&self) -> Pin<Box<dyn Future<Output = Result<Vec<String>>> + Send + '_>> {
        Box::pin(async move {
            let rows: Vec<(String,)> =
                sqlx::query_as("SELECT session_id FROM checkpoints ORDER BY updated_at DESC")
                    .fetch_all(&self.pool)
                    .await
                    .context("list checkpoint sessions")?;
            Ok(rows.into_iter().map(|(id,)| id).collect())
        })
    }
}

// ─── Factory ───────────────────────────────────────────────────────────────

pub async fn create_checkpoint_store(
    backend: CheckpointBackend,
    workspace_dir: &Path,
) -> Result<Arc<dyn CheckpointStore>> {
    let store: Arc<dyn CheckpointStore> = match backend {
        CheckpointBackend::Sqlite => {
            Arc::new(SqliteCheckpointStore::open(&workspace_dir.join("checkpoints.db")).await?)
        }
        CheckpointBackend::Memory => Arc::new(InMemoryCheckpointStore::new()),
    };
    Ok(store)
}

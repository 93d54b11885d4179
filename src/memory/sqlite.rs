use super::traits::MemoryStore;
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::future::Future;
use std::path::Path;
use std::pin::Pin;

/// SQLite-backed memory store.
pub struct SqliteMemoryStore {
    pool: SqlitePool,
}

impl SqliteMemoryStore {
    /// Create a new store with an existing pool and run migrations.
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        sqlx::query("PRAGMA foreign_keys = ON;")
            .execute(&pool)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                 user_id TEXT PRIMARY KEY,
                 created_at TEXT NOT NULL
             )",
        )
        .execute(&pool)
        .await
        .context("create users table")?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS user_memories (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 user_id TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
                 content TEXT NOT NULL,
                 created_at TEXT NOT NULL
             )",
        )
        .execute(&pool)
        .await
        .context("create user_memories table")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_user_memories_user
                 ON user_memories(user_id, id)",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS applied_writes (
                 write_id TEXT PRIMARY KEY,
                 user_id TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
                 applied_at TEXT NOT NULL
             )",
        )
        .execute(&pool)
        .await
        .context("create applied_writes table")?;

        Ok(Self { pool })
    }

    /// Open (or create) the database file at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create memory directory {}", parent.display()))?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .with_context(|| format!("open memory database {}", path.display()))?;
        Self::new(pool).await
    }
}

impl MemoryStore for SqliteMemoryStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn get_memories<'a>(
        &'a self,
        user: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>>> + Send + 'a>> {
        Box::pin(async move {
            // Reading registers the user, so they show up in `list_users`.
            sqlx::query("INSERT OR IGNORE INTO users (user_id, created_at) VALUES ($1, $2)")
                .bind(user)
                .bind(Utc::now().to_rfc3339())
                .execute(&self.pool)
                .await
                .context("register user")?;

            let rows: Vec<(String,)> = sqlx::query_as(
                "SELECT content FROM user_memories
                 WHERE user_id = $1
                 ORDER BY id ASC",
            )
            .bind(user)
            .fetch_all(&self.pool)
            .await
            .context("load user memories")?;

            Ok(rows.into_iter().map(|(content,)| content).collect())
        })
    }

    fn add_memories<'a>(
        &'a self,
        user: &'a str,
        write_id: &'a str,
        memories: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>> {
        Box::pin(async move {
            let timestamp = Utc::now().to_rfc3339();
            let mut tx = self.pool.begin().await.context("begin memory write")?;

            sqlx::query("INSERT OR IGNORE INTO users (user_id, created_at) VALUES ($1, $2)")
                .bind(user)
                .bind(&timestamp)
                .execute(&mut *tx)
                .await?;

            let claimed = sqlx::query(
                "INSERT OR IGNORE INTO applied_writes (write_id, user_id, applied_at)
                 VALUES ($1, $2, $3)",
            )
            .bind(write_id)
            .bind(user)
            .bind(&timestamp)
            .execute(&mut *tx)
            .await
            .context("record memory write id")?;
            if claimed.rows_affected() == 0 {
                tx.rollback().await.context("roll back repeated memory write")?;
                return Ok(false);
            }

            for memory in memories {
                sqlx::query(
                    "INSERT INTO user_memories (user_id, content, created_at)
                     VALUES ($1, $2, $3)",
                )
                .bind(user)
                .bind(memory)
                .bind(&timestamp)
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await.context("commit memory write")?;
            Ok(true)
        })
    }

    fn list_users(&self) -> Pin<Box<dyn Future<Output = Result<Vec<String>>> + Send + '_>> {
        Box::pin(async move {
            let rows: Vec<(String,)> =
                sqlx::query_as("SELECT user_id FROM users ORDER BY created_at ASC, user_id ASC")
                    .fetch_all(&self.pool)
                    .await
                    .context("list users")?;
            Ok(rows.into_iter().map(|(id,)| id).collect())
        })
    }
}

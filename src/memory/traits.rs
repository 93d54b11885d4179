use std::future::Future;
use std::pin::Pin;

/// Per-user durable list of confirmed preference statements.
///
/// Writes are append-only and keyed by a write id; the memory sub-cycle is
/// the only writer.
pub trait MemoryStore: Send + Sync {
    /// Backend name
    fn name(&self) -> &str;

    /// Memories for `user`, in insertion order. Unknown users have none.
    fn get_memories<'a>(
        &'a self,
        user: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<String>>> + Send + 'a>>;

    /// Append `memories` for `user` in one atomic write.
    ///
    /// `write_id` makes the write idempotent: a second call with an id the
    /// store has already applied changes nothing and returns `false`.
    fn add_memories<'a>(
        &'a self,
        user: &'a str,
        write_id: &'a str,
        memories: &'a [String],
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send + 'a>>;

    /// Every user the store knows about.
    fn list_users(&self) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<String>>> + Send + '_>>;

    /// Health check
    fn health_check(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        Box::pin(async move { self.list_users().await.is_ok() })
    }
}

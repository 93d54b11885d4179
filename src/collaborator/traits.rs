use crate::workflow::state::Revision;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;

/// Inputs for one revision pass. `history` already holds the entry for the
/// draft being revised.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RevisionContext<'a> {
    pub original_request: &'a str,
    pub applicable_memories: &'a [String],
    pub history: &'a [Revision],
    pub current_draft: &'a str,
    pub feedback: &'a str,
}

/// Inputs for mining preference statements out of a finished revision cycle.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ExtractionContext<'a> {
    pub original_request: &'a str,
    pub initial_draft: &'a str,
    pub feedback: &'a str,
    pub current_draft: &'a str,
    pub past_revisions: &'a [Revision],
}

/// The four generation calls the workflow delegates.
///
/// Implementations never see or mutate session state; the engine applies
/// whatever they return.
pub trait Collaborators: Send + Sync {
    /// Memories relevant to the request. May be empty.
    fn select<'a>(
        &'a self,
        original_request: &'a str,
        memories: &'a [String],
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<String>>> + Send + 'a>>;

    fn draft<'a>(
        &'a self,
        original_request: &'a str,
        applicable_memories: &'a [String],
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>>;

    fn revise<'a>(
        &'a self,
        ctx: RevisionContext<'a>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>>;

    /// Candidate memory statements. Empty means nothing new was learned.
    fn extract<'a>(
        &'a self,
        ctx: ExtractionContext<'a>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<String>>> + Send + 'a>>;
}

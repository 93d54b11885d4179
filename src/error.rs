use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `Quillcraft`.
///
/// The workflow engine reports its failures as [`WorkflowError`] so the
/// interaction shell can decide whether a call is safe to retry. Glue code
/// (config loading, CLI dispatch) keeps using `anyhow::Result` for context
/// chains and converts at the boundary.
#[derive(Debug, Error)]
pub enum QuillError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Workflow ────────────────────────────────────────────────────────
    #[error("workflow: {0}")]
    Workflow(#[from] WorkflowError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Workflow errors ────────────────────────────────────────────────────────

/// Errors surfaced by `start`, `resume` and the checkpoint/memory stores.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("session not found: {session_id}")]
    NotFound { session_id: String },

    #[error("session {session_id} has no pending suspension")]
    NoActiveSuspension { session_id: String },

    #[error("malformed decision: {0}")]
    MalformedDecision(String),

    #[error("{collaborator} collaborator failed: {message}")]
    GenerationFailure {
        collaborator: &'static str,
        message: String,
    },

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl WorkflowError {
    pub fn generation(collaborator: &'static str, err: impl std::fmt::Display) -> Self {
        Self::GenerationFailure {
            collaborator,
            message: err.to_string(),
        }
    }

    /// Wrap a store failure, keeping the whole `anyhow` context chain.
    pub fn store(err: &anyhow::Error) -> Self {
        Self::StoreUnavailable(format!("{err:#}"))
    }

    /// Whether the caller may repeat the same call unchanged.
    ///
    /// Nothing is committed when a collaborator or store fails, so those
    /// two are safe. The others are caller bugs.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::GenerationFailure { .. } | Self::StoreUnavailable(_) => true,
            Self::NotFound { .. } | Self::NoActiveSuspension { .. } | Self::MalformedDecision(_) => {
                false
            }
        }
    }
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, QuillError>;

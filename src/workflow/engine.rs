use super::checkpoint::{Checkpoint, CheckpointStore, RunStatus};
use super::graph::{self, Exit, NodeName, Target};
use super::memory_cycle::{SuggestionEdit, SuggestionList};
use super::nodes::{self, NodeContext, Step};
use super::state::{SessionBootstrap, SessionState};
use super::suspension::{ResumeDecision, Suspension, SuspensionPayload};
use crate::collaborator::Collaborators;
use crate::config::Config;
use crate::error::WorkflowError;
use crate::memory::MemoryStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

type SessionLocks = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// Exclusive access to one session for the length of a call.
struct SessionGuard<'a> {
    locks: &'a SessionLocks,
    session_id: String,
    guard: Option<tokio::sync::OwnedMutexGuard<()>>,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Waiters hold their own clone, so a count of one means nobody is queued.
        if locks
            .get(&self.session_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.session_id);
        }
    }
}

/// Engine tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound for each collaborator call.
    pub generation_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            generation_timeout: Duration::from_secs(90),
        }
    }
}

impl EngineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            generation_timeout: Duration::from_secs(config.generation.timeout_secs),
        }
    }
}

/// Outcome of one `start`/`resume` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunResult {
    Suspended {
        session_id: String,
        suspension: Suspension,
        state: SessionState,
    },
    Completed {
        session_id: String,
        state: SessionState,
    },
    Rejected {
        session_id: String,
        state: SessionState,
    },
}

impl RunResult {
    fn terminal(session_id: &str, status: RunStatus, state: SessionState) -> Self {
        let session_id = session_id.to_string();
        match status {
            RunStatus::Rejected => Self::Rejected { session_id, state },
            RunStatus::Completed | RunStatus::Suspended => Self::Completed { session_id, state },
        }
    }

    /// Rebuild the result a checkpoint was written for.
    pub fn from_checkpoint(checkpoint: Checkpoint) -> Self {
        let Checkpoint {
            session_id,
            state,
            pending_suspension,
            status,
            ..
        } = checkpoint;
        match pending_suspension {
            Some(suspension) => Self::Suspended {
                session_id,
                suspension,
                state,
            },
            None => Self::terminal(&session_id, status, state),
        }
    }

    pub const fn status(&self) -> RunStatus {
        match self {
            Self::Suspended { .. } => RunStatus::Suspended,
            Self::Completed { .. } => RunStatus::Completed,
            Self::Rejected { .. } => RunStatus::Rejected,
        }
    }

    pub fn session_id(&self) -> &str {
        match self {
            Self::Suspended { session_id, .. }
            | Self::Completed { session_id, .. }
            | Self::Rejected { session_id, .. } => session_id,
        }
    }

    pub fn state(&self) -> &SessionState {
        match self {
            Self::Suspended { state, .. }
            | Self::Completed { state, .. }
            | Self::Rejected { state, .. } => state,
        }
    }

    pub fn suspension(&self) -> Option<&Suspension> {
        match self {
            Self::Suspended { suspension, .. } => Some(suspension),
            Self::Completed { .. } | Self::Rejected { .. } => None,
        }
    }
}

/// Where the next loop iteration picks up.
enum Cursor {
    Enter(NodeName),
    Resume(Suspension, ResumeDecision),
}

/// Drives sessions through the writing workflow.
///
/// A run works on an owned copy of the session state and writes exactly one
/// checkpoint, when it suspends or terminates. A failed run writes nothing,
/// so the same call can be retried.
pub struct WorkflowEngine {
    checkpoints: Arc<dyn CheckpointStore>,
    memory_store: Arc<dyn MemoryStore>,
    collaborators: Arc<dyn Collaborators>,
    config: EngineConfig,
    locks: SessionLocks,
}

impl WorkflowEngine {
    pub fn new(
        checkpoints: Arc<dyn CheckpointStore>,
        memory_store: Arc<dyn MemoryStore>,
        collaborators: Arc<dyn Collaborators>,
        config: EngineConfig,
    ) -> Self {
        Self {
            checkpoints,
            memory_store,
            collaborators,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn memory_store(&self) -> &dyn MemoryStore {
        self.memory_store.as_ref()
    }

    /// Wait for exclusive access to `session_id`. The map entry is dropped
    /// with the last holder, so idle sessions cost nothing.
    async fn lock_session(&self, session_id: &str) -> SessionGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(session_id.to_string()).or_default())
        };
        let guard = lock.lock_owned().await;
        SessionGuard {
            locks: &self.locks,
            session_id: session_id.to_string(),
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    fn tracked_sessions(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn node_context(&self) -> NodeContext<'_> {
        NodeContext {
            collaborators: self.collaborators.as_ref(),
            memory_store: self.memory_store.as_ref(),
            generation_timeout: self.config.generation_timeout,
        }
    }

    /// Open a new session with a fresh id and run it to its first pause.
    pub async fn start_session(
        &self,
        bootstrap: SessionBootstrap,
    ) -> Result<RunResult, WorkflowError> {
        let session_id = uuid::Uuid::new_v4().to_string();
        let state = bootstrap.into_state(&session_id);
        self.start(&session_id, state).await
    }

    /// Run `initial_state` from the entry node, replacing any checkpoint
    /// already stored under `session_id`.
    pub async fn start(
        &self,
        session_id: &str,
        initial_state: SessionState,
    ) -> Result<RunResult, WorkflowError> {
        if initial_state.original_request.trim().is_empty() {
            return Err(WorkflowError::MalformedDecision(
                "original_request must not be empty".into(),
            ));
        }

        let _session = self.lock_session(session_id).await;

        let mut state = initial_state;
        state.memories = match state.user.as_deref() {
            Some(user) => self
                .memory_store
                .get_memories(user)
                .await
                .map_err(|e| WorkflowError::store(&e))?,
            None => Vec::new(),
        };

        let previous_version = self
            .checkpoints
            .load(session_id)
            .await
            .map_err(|e| WorkflowError::store(&e))?
            .map_or(0, |c| c.version);

        let entry = graph::entry_node(!state.memories.is_empty());
        tracing::info!(
            session_id,
            user = state.user_label(),
            memories = state.memories.len(),
            entry = %entry,
            "run started"
        );

        self.run(
            session_id,
            state,
            Cursor::Enter(entry),
            Vec::new(),
            previous_version + 1,
        )
        .await
        .inspect_err(|e| tracing::warn!(session_id, error = %e, "start failed"))
    }

    /// Feed `decision` to the pending suspension of `session_id`.
    pub async fn resume(
        &self,
        session_id: &str,
        decision: ResumeDecision,
    ) -> Result<RunResult, WorkflowError> {
        self.resume_checked(session_id, None, decision).await
    }

    /// Like [`resume`](Self::resume), but only if `suspension_id` is still
    /// the pending suspension. A stale id fails with `NoActiveSuspension`.
    pub async fn resume_at(
        &self,
        session_id: &str,
        suspension_id: &str,
        decision: ResumeDecision,
    ) -> Result<RunResult, WorkflowError> {
        self.resume_checked(session_id, Some(suspension_id), decision)
            .await
    }

    async fn resume_checked(
        &self,
        session_id: &str,
        suspension_id: Option<&str>,
        decision: ResumeDecision,
    ) -> Result<RunResult, WorkflowError> {
        let _session = self.lock_session(session_id).await;

        let checkpoint = self.load(session_id).await?;
        let Some(suspension) = checkpoint.pending_suspension.clone() else {
            return Err(WorkflowError::NoActiveSuspension {
                session_id: session_id.to_string(),
            });
        };
        if let Some(expected) = suspension_id
            && expected != suspension.id
        {
            return Err(WorkflowError::NoActiveSuspension {
                session_id: session_id.to_string(),
            });
        }
        suspension.accepts(&decision)?;

        tracing::info!(
            session_id,
            node = %suspension.node,
            action = decision.action(),
            "run resumed"
        );

        let Checkpoint {
            state,
            trail,
            version,
            ..
        } = checkpoint;
        self.run(
            session_id,
            state,
            Cursor::Resume(suspension, decision),
            trail,
            version + 1,
        )
        .await
        .inspect_err(|e| tracing::warn!(session_id, error = %e, "resume failed"))
    }

    /// Edit or remove one suggested memory while `memory_confirm` is pending.
    pub async fn amend_suggestions(
        &self,
        session_id: &str,
        edit: SuggestionEdit,
    ) -> Result<Suspension, WorkflowError> {
        let _session = self.lock_session(session_id).await;

        let mut checkpoint = self.load(session_id).await?;
        let Some(mut suspension) = checkpoint.pending_suspension.take() else {
            return Err(WorkflowError::NoActiveSuspension {
                session_id: session_id.to_string(),
            });
        };
        if suspension.node != NodeName::MemoryConfirm {
            return Err(WorkflowError::MalformedDecision(format!(
                "suggestion edits need a pending {}, not {}",
                NodeName::MemoryConfirm,
                suspension.node
            )));
        }

        let mut suggestions = SuggestionList::new(checkpoint.state.suggested_memories.clone());
        let entry = match &edit {
            SuggestionEdit::Replace { index, .. } => format!("User edited suggested memory {index}."),
            SuggestionEdit::Remove { index } => format!("User deleted suggested memory {index}."),
        };
        suggestions.apply(edit)?;

        let suggested = suggestions.into_vec();
        checkpoint.state.log(entry);
        checkpoint.state.suggested_memories.clone_from(&suggested);
        suspension.payload = SuspensionPayload::MemoryConfirmation {
            suggested_memories: suggested,
        };

        let updated = Checkpoint::suspended(
            session_id,
            checkpoint.state,
            suspension.clone(),
            checkpoint.trail,
            checkpoint.version + 1,
        );
        self.commit(&updated).await?;
        Ok(suspension)
    }

    /// The latest checkpoint for `session_id`.
    pub async fn snapshot(&self, session_id: &str) -> Result<Checkpoint, WorkflowError> {
        self.load(session_id).await
    }

    pub async fn list_sessions(&self) -> Result<Vec<String>, WorkflowError> {
        self.checkpoints
            .list_sessions()
            .await
            .map_err(|e| WorkflowError::store(&e))
    }

    async fn load(&self, session_id: &str) -> Result<Checkpoint, WorkflowError> {
        self.checkpoints
            .load(session_id)
            .await
            .map_err(|e| WorkflowError::store(&e))?
            .ok_or_else(|| WorkflowError::NotFound {
                session_id: session_id.to_string(),
            })
    }

    async fn commit(&self, checkpoint: &Checkpoint) -> Result<(), WorkflowError> {
        self.checkpoints
            .save(checkpoint)
            .await
            .map_err(|e| WorkflowError::store(&e))?;
        tracing::debug!(
            session_id = %checkpoint.session_id,
            status = %checkpoint.status,
            version = checkpoint.version,
            "checkpoint written"
        );
        Ok(())
    }

    async fn run(
        &self,
        session_id: &str,
        mut state: SessionState,
        mut cursor: Cursor,
        mut trail: Vec<NodeName>,
        version: u64,
    ) -> Result<RunResult, WorkflowError> {
        let ctx = self.node_context();

        loop {
            let exit = match cursor {
                Cursor::Enter(node) => {
                    tracing::debug!(session_id, node = %node, "entering node");
                    trail.push(node);
                    match nodes::enter(ctx, node, &mut state).await? {
                        Step::Exit(exit) => exit,
                        Step::Suspend(suspension) => {
                            let checkpoint = Checkpoint::suspended(
                                session_id,
                                state.clone(),
                                suspension.clone(),
                                trail,
                                version,
                            );
                            self.commit(&checkpoint).await?;
                            tracing::info!(
                                session_id,
                                node = %node,
                                suspension_id = %suspension.id,
                                "run suspended"
                            );
                            return Ok(RunResult::Suspended {
                                session_id: session_id.to_string(),
                                suspension,
                                state,
                            });
                        }
                    }
                }
                Cursor::Resume(suspension, decision) => {
                    nodes::resume(ctx, &suspension, decision, &mut state).await?
                }
            };

            tracing::debug!(session_id, from = %exit.source(), exit = %exit, "transition");

            match exit.target() {
                Target::Node(next) => cursor = Cursor::Enter(next),
                Target::End => {
                    let status = if exit == Exit::Rejected {
                        RunStatus::Rejected
                    } else {
                        RunStatus::Completed
                    };
                    let checkpoint =
                        Checkpoint::terminal(session_id, state.clone(), status, trail, version);
                    self.commit(&checkpoint).await?;
                    tracing::info!(session_id, status = %status, "run finished");
                    return Ok(RunResult::terminal(session_id, status, state));
                }
            }
        }
    }
}

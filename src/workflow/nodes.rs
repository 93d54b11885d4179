//! Node bodies. Each node works on the run's owned copy of the session
//! state and reports how it finished; the engine owns transitions and
//! persistence.

use super::graph::{Exit, NodeName};
use super::memory_cycle::{extraction_exit, merge_confirmation, normalize_candidates, should_extract};
use super::state::{Revision, SessionState};
use super::suspension::{
    ConfirmDecision, ResumeDecision, ReviewDecision, Suspension, SuspensionPayload,
};
use crate::collaborator::{Collaborators, ExtractionContext, RevisionContext};
use crate::error::WorkflowError;
use crate::memory::MemoryStore;
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

/// Shared handles a node may call out to.
#[derive(Clone, Copy)]
pub struct NodeContext<'a> {
    pub collaborators: &'a dyn Collaborators,
    pub memory_store: &'a dyn MemoryStore,
    pub generation_timeout: Duration,
}

/// How a node finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Exit(Exit),
    Suspend(Suspension),
}

async fn call<T>(
    collaborator: &'static str,
    timeout: Duration,
    fut: impl Future<Output = anyhow::Result<T>>,
) -> Result<T, WorkflowError> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(WorkflowError::generation(collaborator, format!("{e:#}"))),
        Err(_) => Err(WorkflowError::generation(
            collaborator,
            format!("timed out after {}s", timeout.as_secs()),
        )),
    }
}

/// Run `node` from its start.
pub async fn enter(
    ctx: NodeContext<'_>,
    node: NodeName,
    state: &mut SessionState,
) -> Result<Step, WorkflowError> {
    match node {
        NodeName::MemorySelect => memory_select(ctx, state).await.map(Step::Exit),
        NodeName::Draft => draft(ctx, state).await.map(Step::Exit),
        NodeName::Review => Ok(Step::Suspend(review_enter(state))),
        NodeName::Revise => revise(ctx, state).await.map(Step::Exit),
        NodeName::MemoryExtract => memory_extract(ctx, state).await.map(Step::Exit),
        NodeName::MemoryConfirm => Ok(Step::Suspend(memory_confirm_enter(state))),
    }
}

/// Continue the node paused by `suspension` with the human's decision.
pub async fn resume(
    ctx: NodeContext<'_>,
    suspension: &Suspension,
    decision: ResumeDecision,
    state: &mut SessionState,
) -> Result<Exit, WorkflowError> {
    suspension.accepts(&decision)?;
    match decision {
        ResumeDecision::Review(decision) => Ok(review_resume(decision, state)),
        ResumeDecision::Confirm(decision) => {
            memory_confirm_resume(ctx, &suspension.id, decision, state).await
        }
    }
}

// ── memory_select ─────────────────────────────────────────────────

async fn memory_select(
    ctx: NodeContext<'_>,
    state: &mut SessionState,
) -> Result<Exit, WorkflowError> {
    state.log("Memory selector node was invoked.");

    if state.memories.is_empty() {
        state.applicable_memories.clear();
        return Ok(Exit::Selected);
    }

    let selected = call(
        "select",
        ctx.generation_timeout,
        ctx.collaborators
            .select(&state.original_request, &state.memories),
    )
    .await?;

    // Only exact stored memories survive, each at most once.
    let known: HashSet<&str> = state.memories.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    let applicable: Vec<String> = selected
        .into_iter()
        .filter(|m| known.contains(m.as_str()))
        .filter(|m| seen.insert(m.clone()))
        .collect();

    tracing::debug!(
        available = state.memories.len(),
        applicable = applicable.len(),
        "memories selected"
    );
    state.applicable_memories = applicable;
    Ok(Exit::Selected)
}

// ── draft ─────────────────────────────────────────────────────────

async fn draft(ctx: NodeContext<'_>, state: &mut SessionState) -> Result<Exit, WorkflowError> {
    state.log("Draft node was invoked.");

    let text = call(
        "draft",
        ctx.generation_timeout,
        ctx.collaborators
            .draft(&state.original_request, &state.applicable_memories),
    )
    .await?;

    if text.trim().is_empty() {
        return Err(WorkflowError::generation("draft", "empty draft"));
    }
    state.current_draft = text;
    Ok(Exit::Drafted)
}

// ── review ────────────────────────────────────────────────────────

fn review_enter(state: &mut SessionState) -> Suspension {
    state.log("Human feedback node was invoked.");
    Suspension::new(
        NodeName::Review,
        SuspensionPayload::Review {
            draft: state.current_draft.clone(),
        },
    )
}

fn review_resume(decision: ReviewDecision, state: &mut SessionState) -> Exit {
    match decision {
        ReviewDecision::Approve => {
            state.log("User approved the draft.");
            Exit::Approved
        }
        ReviewDecision::Revise { feedback } => {
            state.log(format!(
                "User requested a revision. Providing feedback: {feedback}"
            ));
            state.feedback = feedback;
            Exit::RevisionRequested
        }
        ReviewDecision::Reject => {
            state.log("User rejected the draft.");
            Exit::Rejected
        }
    }
}

// ── revise ────────────────────────────────────────────────────────

async fn revise(ctx: NodeContext<'_>, state: &mut SessionState) -> Result<Exit, WorkflowError> {
    state.log("Revisor node was invoked.");

    // Build the history the collaborator sees without touching state, so a
    // failed call leaves nothing behind.
    let mut history = state.past_revisions.clone();
    history.push(Revision {
        draft: state.current_draft.clone(),
        feedback: state.feedback.clone(),
    });

    let text = call(
        "revise",
        ctx.generation_timeout,
        ctx.collaborators.revise(RevisionContext {
            original_request: &state.original_request,
            applicable_memories: &state.applicable_memories,
            history: &history,
            current_draft: &state.current_draft,
            feedback: &state.feedback,
        }),
    )
    .await?;

    if text.trim().is_empty() {
        return Err(WorkflowError::generation("revise", "empty revision"));
    }
    state.past_revisions = history;
    state.current_draft = text;
    Ok(Exit::Revised)
}

// ── memory_extract ────────────────────────────────────────────────

async fn memory_extract(
    ctx: NodeContext<'_>,
    state: &mut SessionState,
) -> Result<Exit, WorkflowError> {
    state.log("Memory extraction node was invoked.");

    if !should_extract(state) {
        state.log("No revisions were made; skipping memory extraction.");
        state.suggested_memories.clear();
        return Ok(Exit::NothingLearned);
    }

    let candidates = call(
        "extract",
        ctx.generation_timeout,
        ctx.collaborators.extract(ExtractionContext {
            original_request: &state.original_request,
            initial_draft: state.initial_draft().unwrap_or_default(),
            feedback: &state.feedback,
            current_draft: &state.current_draft,
            past_revisions: &state.past_revisions,
        }),
    )
    .await?;

    state.suggested_memories = normalize_candidates(candidates);
    if state.suggested_memories.is_empty() {
        state.log("No new memories were found.");
    }
    Ok(extraction_exit(&state.suggested_memories))
}

// ── memory_confirm ────────────────────────────────────────────────

fn memory_confirm_enter(state: &mut SessionState) -> Suspension {
    state.log("Confirm memories node was invoked.");
    Suspension::new(
        NodeName::MemoryConfirm,
        SuspensionPayload::MemoryConfirmation {
            suggested_memories: state.suggested_memories.clone(),
        },
    )
}

/// The write is keyed by the suspension id. A retry after a failed
/// checkpoint commit resumes the same suspension, so the store skips it.
async fn memory_confirm_resume(
    ctx: NodeContext<'_>,
    suspension_id: &str,
    decision: ConfirmDecision,
    state: &mut SessionState,
) -> Result<Exit, WorkflowError> {
    let count = decision.new_memories.len();
    state.log(format!("User confirmed {count} memories."));

    match state.user.clone() {
        Some(user) if count > 0 => {
            let applied = ctx
                .memory_store
                .add_memories(&user, suspension_id, &decision.new_memories)
                .await
                .map_err(|e| WorkflowError::store(&e))?;
            if applied {
                tracing::info!(user = %user, count, "memories persisted");
            } else {
                tracing::info!(user = %user, suspension_id, "memories already persisted");
            }
            state.log(format!("Saved {count} memories for {user}."));
        }
        Some(_) => {}
        None => {
            tracing::info!(count, "no user selected; memories not persisted");
            state.log("No user selected; memories were not saved.");
        }
    }

    merge_confirmation(state, decision.new_memories);
    Ok(Exit::Confirmed)
}

//! Suspension records and the decisions that resume them.
//!
//! Wire formats:
//!
//! ```text
//! {"kind": "review", "draft": "..."}
//! {"kind": "memory_confirmation", "suggested_memories": ["..."]}
//!
//! {"action": "approve"} | {"action": "revise", "feedback": "..."} | {"action": "reject"}
//! {"action": "confirm_memories", "new_memories": ["..."]}
//! ```

use super::graph::NodeName;
use crate::error::WorkflowError;
use serde::{Deserialize, Deserializer, Serialize};

/// What the shell must show the human while a node is paused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SuspensionPayload {
    Review { draft: String },
    MemoryConfirmation { suggested_memories: Vec<String> },
}

/// A paused node plus the payload for the human.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suspension {
    /// Unique per suspension; lets a shell pin a decision to the exact
    /// pause it was shown.
    pub id: String,
    pub node: NodeName,
    pub payload: SuspensionPayload,
}

impl Suspension {
    pub fn new(node: NodeName, payload: SuspensionPayload) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            node,
            payload,
        }
    }

    /// Reject decisions meant for the other suspension kind.
    pub fn accepts(&self, decision: &ResumeDecision) -> Result<(), WorkflowError> {
        let expected = decision.node();
        if expected == self.node {
            Ok(())
        } else {
            Err(WorkflowError::MalformedDecision(format!(
                "`{}` cannot resume {}; it answers {expected}",
                decision.action(),
                self.node
            )))
        }
    }
}

/// Decision for a `review` suspension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewDecision {
    Approve,
    /// Feedback is optional free text; empty still triggers a revision.
    Revise { feedback: String },
    Reject,
}

/// Decision for a `memory_confirm` suspension: the list the human ended with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmDecision {
    pub new_memories: Vec<String>,
}

/// External input that unblocks a suspension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "DecisionWire", from = "DecisionWire")]
pub enum ResumeDecision {
    Review(ReviewDecision),
    Confirm(ConfirmDecision),
}

impl ResumeDecision {
    pub const fn approve() -> Self {
        Self::Review(ReviewDecision::Approve)
    }

    pub fn revise(feedback: impl Into<String>) -> Self {
        Self::Review(ReviewDecision::Revise {
            feedback: feedback.into(),
        })
    }

    pub const fn reject() -> Self {
        Self::Review(ReviewDecision::Reject)
    }

    pub fn confirm_memories(new_memories: Vec<String>) -> Self {
        Self::Confirm(ConfirmDecision { new_memories })
    }

    /// The node this decision can resume.
    pub const fn node(&self) -> NodeName {
        match self {
            Self::Review(_) => NodeName::Review,
            Self::Confirm(_) => NodeName::MemoryConfirm,
        }
    }

    pub const fn action(&self) -> &'static str {
        match self {
            Self::Review(ReviewDecision::Approve) => "approve",
            Self::Review(ReviewDecision::Revise { .. }) => "revise",
            Self::Review(ReviewDecision::Reject) => "reject",
            Self::Confirm(_) => "confirm_memories",
        }
    }

    /// Parse a decision submitted by the shell.
    pub fn from_json(value: serde_json::Value) -> Result<Self, WorkflowError> {
        if value.get("action").is_none() {
            return Err(WorkflowError::MalformedDecision(
                "decision is missing the `action` field".into(),
            ));
        }
        serde_json::from_value(value).map_err(|e| WorkflowError::MalformedDecision(e.to_string()))
    }

    pub fn from_json_str(raw: &str) -> Result<Self, WorkflowError> {
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| WorkflowError::MalformedDecision(format!("invalid JSON: {e}")))?;
        Self::from_json(value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum DecisionWire {
    Approve,
    Revise {
        #[serde(default, deserialize_with = "null_as_empty")]
        feedback: String,
    },
    Reject,
    ConfirmMemories {
        new_memories: Vec<String>,
    },
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl From<ResumeDecision> for DecisionWire {
    fn from(decision: ResumeDecision) -> Self {
        match decision {
            ResumeDecision::Review(ReviewDecision::Approve) => Self::Approve,
            ResumeDecision::Review(ReviewDecision::Revise { feedback }) => {
                Self::Revise { feedback }
            }
            ResumeDecision::Review(ReviewDecision::Reject) => Self::Reject,
            ResumeDecision::Confirm(ConfirmDecision { new_memories }) => {
                Self::ConfirmMemories { new_memories }
            }
        }
    }
}

impl From<DecisionWire> for ResumeDecision {
    fn from(wire: DecisionWire) -> Self {
        match wire {
            DecisionWire::Approve => Self::approve(),
            DecisionWire::Revise { feedback } => Self::revise(feedback),
            DecisionWire::Reject => Self::reject(),
            DecisionWire::ConfirmMemories { new_memories } => Self::confirm_memories(new_memories),
        }
    }
}

use serde::{Deserialize, Serialize};

/// Label shown wherever a session has no user attached.
pub const NO_USER_SELECTED: &str = "no user selected";

/// A superseded draft together with the feedback that superseded it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub draft: String,
    pub feedback: String,
}

/// The record of one in-progress writing task.
///
/// Owned by the workflow engine and only mutated by node execution. The
/// shell sees it through checkpoints and suspension payloads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    pub user: Option<String>,
    pub original_request: String,
    #[serde(default)]
    pub current_draft: String,
    #[serde(default)]
    pub past_revisions: Vec<Revision>,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub memories: Vec<String>,
    #[serde(default)]
    pub applicable_memories: Vec<String>,
    #[serde(default)]
    pub suggested_memories: Vec<String>,
    #[serde(default)]
    pub new_memories: Vec<String>,
    #[serde(default)]
    pub action_log: Vec<String>,
}

impl SessionState {
    pub fn new(user: Option<String>, original_request: impl Into<String>) -> Self {
        Self {
            user: user.filter(|u| !u.trim().is_empty()),
            original_request: original_request.into(),
            ..Self::default()
        }
    }

    /// User id for display and logging.
    pub fn user_label(&self) -> &str {
        self.user.as_deref().unwrap_or(NO_USER_SELECTED)
    }

    pub fn log(&mut self, entry: impl Into<String>) {
        self.action_log.push(entry.into());
    }

    /// The text produced by the very first draft, once at least one
    /// revision has superseded it.
    pub fn initial_draft(&self) -> Option<&str> {
        self.past_revisions.first().map(|r| r.draft.as_str())
    }

    pub fn completed_revisions(&self) -> usize {
        self.past_revisions.len()
    }
}

/// What the shell supplies to open a task. Every other field starts empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionBootstrap {
    #[serde(default)]
    pub user: Option<String>,
    pub original_request: String,
}

impl SessionBootstrap {
    pub fn new(user: Option<String>, original_request: impl Into<String>) -> Self {
        Self {
            user,
            original_request: original_request.into(),
        }
    }

    /// Build the initial state, opening the audit trail with the session id.
    pub fn into_state(self, session_id: &str) -> SessionState {
        let mut state = SessionState::new(self.user, self.original_request);
        let short: String = session_id.chars().take(6).collect();
        state.log(format!("Session {short}... initialized."));
        state.log("User sent a request.");
        state
    }
}

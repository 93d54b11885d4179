//! Coordination of the memory sub-cycle: extraction after approval, the
//! human's in-place edits, and the merge of the confirmed list back into
//! session state.

use super::graph::Exit;
use super::state::SessionState;
use crate::error::WorkflowError;
use serde::{Deserialize, Serialize};

/// Approving a first draft with no edits carries no preference signal.
pub fn should_extract(state: &SessionState) -> bool {
    !state.past_revisions.is_empty()
}

/// Trim candidates and drop blanks and repeats, keeping first-seen order.
pub fn normalize_candidates(candidates: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    candidates
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .filter(|c| seen.insert(c.clone()))
        .collect()
}

/// An empty extraction ends the task without suspending.
pub fn extraction_exit(suggested: &[String]) -> Exit {
    if suggested.is_empty() {
        Exit::NothingLearned
    } else {
        Exit::CandidatesFound
    }
}

/// One positional change to the suggested memories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SuggestionEdit {
    /// Replace the element at `index`.
    Replace { index: usize, text: String },
    /// Remove the element at `index`; later elements shift down by one.
    Remove { index: usize },
}

/// Suggested memories as an index-addressable sequence.
///
/// Every operation checks its index against the current length, so
/// repeating an edit or delete on an already-shortened list fails
/// cleanly instead of touching the wrong element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuggestionList {
    items: Vec<String>,
}

impl SuggestionList {
    pub fn new(items: Vec<String>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<String> {
        self.items
    }

    pub fn edit(&mut self, index: usize, text: impl Into<String>) -> Result<(), WorkflowError> {
        self.check(index)?;
        self.items[index] = text.into();
        Ok(())
    }

    pub fn delete(&mut self, index: usize) -> Result<String, WorkflowError> {
        self.check(index)?;
        Ok(self.items.remove(index))
    }

    pub fn apply(&mut self, edit: SuggestionEdit) -> Result<(), WorkflowError> {
        match edit {
            SuggestionEdit::Replace { index, text } => self.edit(index, text),
            SuggestionEdit::Remove { index } => self.delete(index).map(|_| ()),
        }
    }

    fn check(&self, index: usize) -> Result<(), WorkflowError> {
        if index < self.items.len() {
            Ok(())
        } else {
            Err(WorkflowError::MalformedDecision(format!(
                "suggestion index {index} out of range ({} remaining)",
                self.items.len()
            )))
        }
    }
}

/// Apply the confirmed list. The confirm payload is the human's final
/// edited list, including edits made in the shell rather than through
/// `amend_suggestions`, so it replaces the suggestions it came from.
pub fn merge_confirmation(state: &mut SessionState, new_memories: Vec<String>) {
    state.suggested_memories.clone_from(&new_memories);
    state.new_memories = new_memories;
}

use quillcraft::error::WorkflowError;
use quillcraft::workflow::{ResumeDecision, RunStatus, SuggestionEdit, SuspensionPayload};

use crate::workflow_harness::{
    Call, HAIKU_REQUEST, RecordingMemoryStore, expect_suspension, fixture, fixture_with,
    review_draft, state_for, suggested,
};

#[tokio::test]
async fn past_revisions_track_completed_revise_cycles() {
    let f = fixture();

    let mut result = f
        .engine
        .start("s1", state_for(None, HAIKU_REQUEST))
        .await
        .unwrap();
    let first_draft = review_draft(&result).to_string();

    for (round, feedback) in ["shorter", "", "more rain"].iter().enumerate() {
        result = f
            .engine
            .resume("s1", ResumeDecision::revise(*feedback))
            .await
            .unwrap();
        let state = result.state();
        assert_eq!(state.past_revisions.len(), round + 1);
        assert_eq!(state.past_revisions[0].draft, first_draft);
        assert_eq!(state.completed_revisions(), round + 1);
    }

    // Each revise call saw the whole history, including the entry for the
    // draft it was replacing.
    let history_lens: Vec<usize> = f
        .collaborators
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::Revise { history, .. } => Some(history.len()),
            _ => None,
        })
        .collect();
    assert_eq!(history_lens, vec![1, 2, 3]);
}

#[tokio::test]
async fn empty_feedback_still_revises() {
    let f = fixture();
    f.engine
        .start("s1", state_for(None, HAIKU_REQUEST))
        .await
        .unwrap();

    let result = f
        .engine
        .resume("s1", ResumeDecision::revise(""))
        .await
        .unwrap();

    assert_eq!(review_draft(&result), "D2");
    assert_eq!(result.state().past_revisions[0].feedback, "");
}

#[tokio::test]
async fn second_resume_fails_with_no_active_suspension() {
    let f = fixture();
    let first = f
        .engine
        .start("s1", state_for(None, HAIKU_REQUEST))
        .await
        .unwrap();
    let pending_id = expect_suspension(&first).id.clone();

    f.engine
        .resume("s1", ResumeDecision::reject())
        .await
        .unwrap();

    let again = f
        .engine
        .resume("s1", ResumeDecision::reject())
        .await
        .unwrap_err();
    assert!(matches!(again, WorkflowError::NoActiveSuspension { .. }));
    assert!(!again.is_retryable());

    // Replaying the decision against the suspension it was meant for.
    let replay = f
        .engine
        .resume_at("s1", &pending_id, ResumeDecision::approve())
        .await
        .unwrap_err();
    assert!(matches!(replay, WorkflowError::NoActiveSuspension { .. }));

    // The draft node ran once; nothing was re-entered.
    assert_eq!(f.collaborators.calls().len(), 1);
}

#[tokio::test]
async fn resume_at_follows_each_new_suspension() {
    let f = fixture();
    let first = f
        .engine
        .start("s1", state_for(None, HAIKU_REQUEST))
        .await
        .unwrap();
    let first_id = expect_suspension(&first).id.clone();

    let second = f
        .engine
        .resume_at("s1", &first_id, ResumeDecision::revise("shorter"))
        .await
        .unwrap();
    let second_id = expect_suspension(&second).id.clone();
    assert_ne!(first_id, second_id);

    let done = f
        .engine
        .resume_at("s1", &second_id, ResumeDecision::reject())
        .await
        .unwrap();
    assert_eq!(done.status(), RunStatus::Rejected);
}

#[tokio::test]
async fn applicable_memories_are_a_subset_of_memories() {
    let memory = RecordingMemoryStore::seeded("ada", &["A", "B", "C"]);
    let f = fixture_with(memory);
    f.collaborators
        .select_returns(&["C", "made up by the model", "A", "C"]);

    let result = f
        .engine
        .start("s1", state_for(Some("ada"), HAIKU_REQUEST))
        .await
        .unwrap();

    let state = result.state();
    assert_eq!(state.applicable_memories, vec!["C", "A"]);
    assert!(
        state
            .applicable_memories
            .iter()
            .all(|m| state.memories.contains(m))
    );
}

#[tokio::test]
async fn edit_then_delete_then_confirm_persists_final_list() {
    let f = fixture();
    f.collaborators.extraction_returns(&["A", "B", "C"]);

    f.engine
        .start("s1", state_for(Some("ada"), HAIKU_REQUEST))
        .await
        .unwrap();
    f.engine
        .resume("s1", ResumeDecision::revise("shorter"))
        .await
        .unwrap();
    let confirm = f
        .engine
        .resume("s1", ResumeDecision::approve())
        .await
        .unwrap();
    assert_eq!(suggested(&confirm), vec!["A", "B", "C"]);
    let pending_id = expect_suspension(&confirm).id.clone();

    let edited = f
        .engine
        .amend_suggestions(
            "s1",
            SuggestionEdit::Replace {
                index: 1,
                text: "B2".into(),
            },
        )
        .await
        .unwrap();
    assert_eq!(
        edited.payload,
        SuspensionPayload::MemoryConfirmation {
            suggested_memories: vec!["A".into(), "B2".into(), "C".into()]
        }
    );

    let deleted = f
        .engine
        .amend_suggestions("s1", SuggestionEdit::Remove { index: 0 })
        .await
        .unwrap();
    assert_eq!(deleted.id, pending_id);

    // Repeating an edit past the shortened end fails and changes nothing.
    let err = f
        .engine
        .amend_suggestions("s1", SuggestionEdit::Remove { index: 2 })
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::MalformedDecision(_)));

    let stored = f.engine.snapshot("s1").await.unwrap();
    assert_eq!(stored.state.suggested_memories, vec!["B2", "C"]);

    let done = f
        .engine
        .resume(
            "s1",
            ResumeDecision::confirm_memories(stored.state.suggested_memories.clone()),
        )
        .await
        .unwrap();

    assert_eq!(done.status(), RunStatus::Completed);
    assert_eq!(
        f.memory.writes(),
        vec![("ada".to_string(), vec!["B2".to_string(), "C".to_string()])]
    );
}

#[tokio::test]
async fn confirmed_list_is_persisted_exactly() {
    let f = fixture();
    f.collaborators.extraction_returns(&["prefers shorter poems"]);

    f.engine
        .start("s1", state_for(Some("ada"), HAIKU_REQUEST))
        .await
        .unwrap();
    f.engine
        .resume("s1", ResumeDecision::revise("shorter"))
        .await
        .unwrap();
    f.engine
        .resume("s1", ResumeDecision::approve())
        .await
        .unwrap();

    // The human may submit anything, duplicates and odd spacing included.
    let submitted = vec![
        "  keeps it short ".to_string(),
        "keeps it short".to_string(),
        "keeps it short".to_string(),
    ];
    let done = f
        .engine
        .resume("s1", ResumeDecision::confirm_memories(submitted.clone()))
        .await
        .unwrap();

    assert_eq!(f.memory.stored("ada"), submitted);
    assert_eq!(done.state().new_memories, submitted);
}

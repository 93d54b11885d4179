use std::time::Duration;

use quillcraft::error::WorkflowError;
use quillcraft::workflow::{CheckpointStore, ResumeDecision, RunStatus};

use crate::workflow_harness::{
    HAIKU_REQUEST, RecordingMemoryStore, fixture, fixture_with_timeout, review_draft, state_for,
    suggested,
};

#[tokio::test]
async fn failed_start_writes_nothing_and_retry_succeeds() {
    let f = fixture();
    f.collaborators.fail_next("draft", 1);

    let err = f
        .engine
        .start("s1", state_for(None, HAIKU_REQUEST))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::GenerationFailure {
            collaborator: "draft",
            ..
        }
    ));
    assert!(err.is_retryable());
    assert!(f.checkpoints.load("s1").await.unwrap().is_none());

    let retried = f
        .engine
        .start("s1", state_for(None, HAIKU_REQUEST))
        .await
        .unwrap();
    assert_eq!(review_draft(&retried), "D1");
}

#[tokio::test]
async fn failed_revision_keeps_checkpoint_and_suspension() {
    let f = fixture();
    f.engine
        .start("s1", state_for(None, HAIKU_REQUEST))
        .await
        .unwrap();
    let before = f.engine.snapshot("s1").await.unwrap();

    f.collaborators.fail_next("revise", 1);
    let err = f
        .engine
        .resume("s1", ResumeDecision::revise("shorter"))
        .await
        .unwrap_err();
    assert!(err.is_retryable());

    let after = f.engine.snapshot("s1").await.unwrap();
    assert_eq!(after, before);

    // Same call again, now that the backend is back.
    let retried = f
        .engine
        .resume("s1", ResumeDecision::revise("shorter"))
        .await
        .unwrap();
    assert_eq!(review_draft(&retried), "D2");
    assert_eq!(retried.state().past_revisions.len(), 1);
}

#[tokio::test]
async fn failed_extraction_leaves_review_pending() {
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

    f.collaborators.fail_next("extract", 1);
    assert!(
        f.engine
            .resume("s1", ResumeDecision::approve())
            .await
            .is_err()
    );
    let stored = f.engine.snapshot("s1").await.unwrap();
    assert_eq!(stored.status, RunStatus::Suspended);
    assert!(stored.state.suggested_memories.is_empty());

    let confirm = f
        .engine
        .resume("s1", ResumeDecision::approve())
        .await
        .unwrap();
    assert_eq!(suggested(&confirm), vec!["prefers shorter poems"]);
}

#[tokio::test]
async fn slow_generation_times_out_as_generation_failure() {
    let f = fixture_with_timeout(RecordingMemoryStore::new(), Duration::from_millis(50));
    f.collaborators.delay("draft", Duration::from_secs(2));

    let err = f
        .engine
        .start("s1", state_for(None, HAIKU_REQUEST))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::GenerationFailure { .. }));
    assert!(err.to_string().contains("timed out"));
}

#[tokio::test]
async fn decision_for_wrong_suspension_is_malformed() {
    let f = fixture();
    f.engine
        .start("s1", state_for(None, HAIKU_REQUEST))
        .await
        .unwrap();
    let before = f.engine.snapshot("s1").await.unwrap();

    let err = f
        .engine
        .resume("s1", ResumeDecision::confirm_memories(vec!["A".into()]))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::MalformedDecision(_)));
    assert!(!err.is_retryable());

    // The review is still pending and answerable.
    assert_eq!(f.engine.snapshot("s1").await.unwrap(), before);
    f.engine
        .resume("s1", ResumeDecision::reject())
        .await
        .unwrap();
}

#[test]
fn decision_without_action_is_malformed() {
    let err = ResumeDecision::from_json_str(r#"{"feedback": "shorter"}"#).unwrap_err();
    assert!(matches!(err, WorkflowError::MalformedDecision(_)));

    let err = ResumeDecision::from_json_str(r#"{"action": "publish"}"#).unwrap_err();
    assert!(matches!(err, WorkflowError::MalformedDecision(_)));

    let revise = ResumeDecision::from_json_str(r#"{"action": "revise"}"#).unwrap();
    assert_eq!(revise, ResumeDecision::revise(""));
}

#[tokio::test]
async fn missing_user_skips_persistence_but_still_confirms() {
    let f = fixture();
    f.collaborators.extraction_returns(&["prefers shorter poems"]);

    f.engine
        .start("s1", state_for(None, HAIKU_REQUEST))
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
    assert_eq!(suggested(&confirm), vec!["prefers shorter poems"]);

    let done = f
        .engine
        .resume(
            "s1",
            ResumeDecision::confirm_memories(vec!["prefers shorter poems".into()]),
        )
        .await
        .unwrap();

    assert_eq!(done.status(), RunStatus::Completed);
    assert!(f.memory.writes().is_empty());
    assert!(
        done.state()
            .action_log
            .iter()
            .any(|e| e == "No user selected; memories were not saved.")
    );
}

#[tokio::test]
async fn memory_store_failure_is_retryable_and_keeps_confirmation_pending() {
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

    f.memory.set_fail_writes(true);
    let decision = ResumeDecision::confirm_memories(vec!["prefers shorter poems".into()]);
    let err = f
        .engine
        .resume("s1", decision.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::StoreUnavailable(_)));
    assert!(err.is_retryable());
    assert_eq!(
        f.engine.snapshot("s1").await.unwrap().status,
        RunStatus::Suspended
    );

    f.memory.set_fail_writes(false);
    f.engine.resume("s1", decision).await.unwrap();
    assert_eq!(f.memory.stored("ada"), vec!["prefers shorter poems"]);
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let f = fixture();
    assert!(matches!(
        f.engine.snapshot("nope").await.unwrap_err(),
        WorkflowError::NotFound { .. }
    ));
    assert!(matches!(
        f.engine
            .resume("nope", ResumeDecision::approve())
            .await
            .unwrap_err(),
        WorkflowError::NotFound { .. }
    ));
}

#[tokio::test]
async fn confirmation_retried_after_failed_commit_writes_memories_once() {
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

    f.checkpoints.fail_next_saves(1);
    let decision = ResumeDecision::confirm_memories(vec!["prefers shorter poems".into()]);
    let err = f
        .engine
        .resume("s1", decision.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::StoreUnavailable(_)));
    assert!(err.is_retryable());
    assert_eq!(
        f.engine.snapshot("s1").await.unwrap().status,
        RunStatus::Suspended
    );

    let done = f.engine.resume("s1", decision).await.unwrap();
    assert_eq!(done.status(), RunStatus::Completed);
    assert_eq!(done.state().new_memories, vec!["prefers shorter poems"]);
    assert_eq!(f.memory.stored("ada"), vec!["prefers shorter poems"]);
    assert_eq!(f.memory.writes().len(), 1);
}

#[tokio::test]
async fn failed_suspend_commit_leaves_no_checkpoint() {
    let f = fixture();
    f.checkpoints.fail_next_saves(1);

    let err = f
        .engine
        .start("s1", state_for(None, HAIKU_REQUEST))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::StoreUnavailable(_)));
    assert!(f.checkpoints.load("s1").await.unwrap().is_none());

    f.engine
        .start("s1", state_for(None, HAIKU_REQUEST))
        .await
        .unwrap();
}

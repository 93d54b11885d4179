use std::sync::Arc;
use std::time::Duration;

use quillcraft::workflow::{
    EngineConfig, ResumeDecision, RunStatus, SqliteCheckpointStore, WorkflowEngine,
};
use tempfile::TempDir;

use crate::workflow_harness::{
    HAIKU_REQUEST, RecordingMemoryStore, ScriptedCollaborators, fixture, review_draft, state_for,
    suggested,
};

async fn engine_over(
    db: &std::path::Path,
    memory: Arc<RecordingMemoryStore>,
) -> (WorkflowEngine, Arc<ScriptedCollaborators>) {
    let checkpoints = SqliteCheckpointStore::open(db).await.unwrap();
    let collaborators = ScriptedCollaborators::new();
    let engine = WorkflowEngine::new(
        Arc::new(checkpoints),
        memory,
        collaborators.clone(),
        EngineConfig {
            generation_timeout: Duration::from_secs(5),
        },
    );
    (engine, collaborators)
}

#[tokio::test]
async fn suspended_session_resumes_after_restart() {
    let tmp = TempDir::new().unwrap();
    let db = tmp.path().join("checkpoints.db");
    let memory = RecordingMemoryStore::new();

    let (first, _) = engine_over(&db, memory.clone()).await;
    let paused = first
        .start("s1", state_for(Some("ada"), HAIKU_REQUEST))
        .await
        .unwrap();
    assert_eq!(review_draft(&paused), "D1");
    let before = first.snapshot("s1").await.unwrap();
    drop(first);

    // A fresh process sees the same pending review.
    let (second, collaborators) = engine_over(&db, memory.clone()).await;
    collaborators.revision_returns("rain, shorter");
    collaborators.extraction_returns(&["prefers shorter poems"]);
    assert_eq!(second.snapshot("s1").await.unwrap(), before);

    second
        .resume("s1", ResumeDecision::revise("shorter"))
        .await
        .unwrap();
    let confirm = second
        .resume("s1", ResumeDecision::approve())
        .await
        .unwrap();
    assert_eq!(suggested(&confirm), vec!["prefers shorter poems"]);

    let done = second
        .resume(
            "s1",
            ResumeDecision::confirm_memories(vec!["prefers shorter poems".into()]),
        )
        .await
        .unwrap();
    assert_eq!(done.status(), RunStatus::Completed);
    assert_eq!(done.state().current_draft, "rain, shorter");
    assert_eq!(done.state().initial_draft(), Some("D1"));
    assert_eq!(memory.stored("ada"), vec!["prefers shorter poems"]);

    let stored = second.snapshot("s1").await.unwrap();
    assert!(stored.pending_suspension.is_none());
    assert!(stored.version > before.version);
    assert_eq!(second.list_sessions().await.unwrap(), vec!["s1".to_string()]);
}

#[tokio::test]
async fn terminal_session_cannot_be_resumed_after_restart() {
    let tmp = TempDir::new().unwrap();
    let db = tmp.path().join("checkpoints.db");

    let (first, _) = engine_over(&db, RecordingMemoryStore::new()).await;
    first
        .start("s1", state_for(None, HAIKU_REQUEST))
        .await
        .unwrap();
    let rejected = first
        .resume("s1", ResumeDecision::reject())
        .await
        .unwrap();
    assert_eq!(rejected.status(), RunStatus::Rejected);
    drop(first);

    let (second, _) = engine_over(&db, RecordingMemoryStore::new()).await;
    assert_eq!(
        second.snapshot("s1").await.unwrap().status,
        RunStatus::Rejected
    );
    assert!(
        second
            .resume("s1", ResumeDecision::approve())
            .await
            .is_err()
    );
}

#[tokio::test]
async fn concurrent_sessions_do_not_share_state() {
    let f = fixture();

    let (a, b) = tokio::join!(
        f.engine
            .start("a", state_for(Some("ada"), "Write a limerick about cats")),
        f.engine
            .start("b", state_for(Some("bob"), HAIKU_REQUEST)),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.state().original_request, "Write a limerick about cats");
    assert_eq!(b.state().original_request, HAIKU_REQUEST);

    let (a, b) = tokio::join!(
        f.engine.resume("a", ResumeDecision::revise("funnier")),
        f.engine.resume("b", ResumeDecision::reject()),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.status(), RunStatus::Suspended);
    assert_eq!(a.state().past_revisions.len(), 1);
    assert_eq!(a.state().user.as_deref(), Some("ada"));
    assert_eq!(b.status(), RunStatus::Rejected);
    assert!(b.state().past_revisions.is_empty());

    let mut sessions = f.engine.list_sessions().await.unwrap();
    sessions.sort();
    assert_eq!(sessions, vec!["a".to_string(), "b".to_string()]);
}

#[tokio::test]
async fn same_session_calls_are_serialized() {
    let f = fixture();
    f.engine
        .start("s1", state_for(None, HAIKU_REQUEST))
        .await
        .unwrap();

    let (first, second) = tokio::join!(
        f.engine.resume("s1", ResumeDecision::approve()),
        f.engine.resume("s1", ResumeDecision::approve()),
    );

    // Exactly one approve finds the review still pending.
    assert_eq!(
        usize::from(first.is_ok()) + usize::from(second.is_ok()),
        1
    );
    assert_eq!(
        f.engine.snapshot("s1").await.unwrap().status,
        RunStatus::Completed
    );
}

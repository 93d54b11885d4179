use quillcraft::workflow::{NodeName, ResumeDecision, RunStatus, SuspensionPayload};

use crate::workflow_harness::{
    Call, HAIKU_REQUEST, RecordingMemoryStore, fixture, fixture_with, review_draft, state_for,
    suggested,
};

#[tokio::test]
async fn reject_ends_without_memory_cycle() {
    let f = fixture();

    let first = f
        .engine
        .start("s1", state_for(Some("ada"), HAIKU_REQUEST))
        .await
        .unwrap();
    assert_eq!(
        first.suspension().unwrap().payload,
        SuspensionPayload::Review { draft: "D1".into() }
    );

    let done = f
        .engine
        .resume("s1", ResumeDecision::reject())
        .await
        .unwrap();
    assert_eq!(done.status(), RunStatus::Rejected);
    assert!(done.suspension().is_none());

    // No stored memories, so selection never ran and extraction never ran.
    assert_eq!(
        f.collaborators.calls(),
        vec![Call::Draft {
            applicable_memories: vec![]
        }]
    );
    assert!(f.memory.writes().is_empty());

    let stored = f.engine.snapshot("s1").await.unwrap();
    assert_eq!(stored.status, RunStatus::Rejected);
    assert!(stored.pending_suspension.is_none());
    assert_eq!(stored.trail, vec![NodeName::Draft, NodeName::Review]);
}

#[tokio::test]
async fn revise_approve_confirm_persists_memory() {
    let f = fixture();
    f.collaborators.extraction_returns(&["prefers shorter poems"]);

    let first = f
        .engine
        .start("s1", state_for(Some("ada"), HAIKU_REQUEST))
        .await
        .unwrap();
    assert_eq!(review_draft(&first), "D1");

    let second = f
        .engine
        .resume("s1", ResumeDecision::revise("shorter"))
        .await
        .unwrap();
    assert_eq!(review_draft(&second), "D2");
    let revisions = &second.state().past_revisions;
    assert_eq!(revisions.len(), 1);
    assert_eq!(revisions[0].draft, "D1");
    assert_eq!(revisions[0].feedback, "shorter");

    let confirm = f
        .engine
        .resume("s1", ResumeDecision::approve())
        .await
        .unwrap();
    assert_eq!(suggested(&confirm), vec!["prefers shorter poems"]);
    assert_eq!(
        f.collaborators.count(|c| matches!(c, Call::Extract { .. })),
        1
    );

    let done = f
        .engine
        .resume(
            "s1",
            ResumeDecision::confirm_memories(vec!["prefers shorter poems".into()]),
        )
        .await
        .unwrap();
    assert_eq!(done.status(), RunStatus::Completed);
    assert_eq!(f.memory.stored("ada"), vec!["prefers shorter poems"]);

    let stored = f.engine.snapshot("s1").await.unwrap();
    assert_eq!(
        stored.trail,
        vec![
            NodeName::Draft,
            NodeName::Review,
            NodeName::Revise,
            NodeName::Review,
            NodeName::MemoryExtract,
            NodeName::MemoryConfirm,
        ]
    );
    assert_eq!(stored.state.new_memories, vec!["prefers shorter poems"]);
}

#[tokio::test]
async fn approving_first_draft_skips_extraction() {
    let f = fixture();
    f.collaborators.extraction_returns(&["should never be asked for"]);

    f.engine
        .start("s1", state_for(Some("ada"), HAIKU_REQUEST))
        .await
        .unwrap();
    let done = f
        .engine
        .resume("s1", ResumeDecision::approve())
        .await
        .unwrap();

    assert_eq!(done.status(), RunStatus::Completed);
    assert_eq!(
        f.collaborators.count(|c| matches!(c, Call::Extract { .. })),
        0
    );
    assert!(done.state().suggested_memories.is_empty());
    assert!(f.memory.writes().is_empty());
}

#[tokio::test]
async fn empty_extraction_terminates_without_suspending() {
    let f = fixture();
    f.collaborators.extraction_returns(&[]);

    f.engine
        .start("s1", state_for(Some("ada"), HAIKU_REQUEST))
        .await
        .unwrap();
    f.engine
        .resume("s1", ResumeDecision::revise("warmer"))
        .await
        .unwrap();
    let done = f
        .engine
        .resume("s1", ResumeDecision::approve())
        .await
        .unwrap();

    assert_eq!(done.status(), RunStatus::Completed);
    assert!(done.suspension().is_none());
    assert!(f.memory.writes().is_empty());
}

#[tokio::test]
async fn stored_memories_are_selected_before_drafting() {
    let memory = RecordingMemoryStore::seeded(
        "ada",
        &["Use British English spelling.", "For social posts, no emojis."],
    );
    let f = fixture_with(memory);
    f.collaborators
        .select_returns(&["Use British English spelling."]);

    let first = f
        .engine
        .start("s1", state_for(Some("ada"), HAIKU_REQUEST))
        .await
        .unwrap();

    assert_eq!(
        f.collaborators.calls(),
        vec![
            Call::Select {
                memories: vec![
                    "Use British English spelling.".into(),
                    "For social posts, no emojis.".into()
                ]
            },
            Call::Draft {
                applicable_memories: vec!["Use British English spelling.".into()]
            },
        ]
    );
    assert_eq!(first.state().memories.len(), 2);

    let stored = f.engine.snapshot("s1").await.unwrap();
    assert_eq!(stored.trail[0], NodeName::MemorySelect);
}

#[tokio::test]
async fn action_log_records_each_node_and_decision() {
    let f = fixture();

    f.engine
        .start("s1", state_for(None, HAIKU_REQUEST))
        .await
        .unwrap();
    let done = f
        .engine
        .resume("s1", ResumeDecision::reject())
        .await
        .unwrap();

    assert_eq!(
        done.state().action_log,
        vec![
            "Draft node was invoked.",
            "Human feedback node was invoked.",
            "User rejected the draft.",
        ]
    );
}

#[tokio::test]
async fn start_session_generates_id_and_opens_log() {
    let f = fixture();

    let result = f
        .engine
        .start_session(quillcraft::workflow::SessionBootstrap::new(
            None,
            HAIKU_REQUEST,
        ))
        .await
        .unwrap();

    let session_id = result.session_id().to_string();
    assert!(uuid::Uuid::parse_str(&session_id).is_ok());
    let log = &result.state().action_log;
    assert_eq!(log[0], format!("Session {}... initialized.", &session_id[..6]));
    assert_eq!(log[1], "User sent a request.");
    assert!(f.engine.snapshot(&session_id).await.is_ok());
}

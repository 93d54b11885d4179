use crate::app::status::render_status;
use crate::cli::commands::{Cli, Commands};
use quillcraft::collaborator::PromptCollaborators;
use quillcraft::error::{QuillError, WorkflowError};
use quillcraft::memory::create_memory_store;
use quillcraft::providers::create_provider;
use quillcraft::workflow::{
    EngineConfig, ResumeDecision, RunResult, SessionBootstrap, SuggestionEdit, SuspensionPayload,
    WorkflowEngine, create_checkpoint_store, graph,
};
use quillcraft::Config;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Wire the engine to the configured stores and provider.
pub async fn build_engine(config: &Config) -> anyhow::Result<WorkflowEngine> {
    graph::validate()?;
    let checkpoints =
        create_checkpoint_store(config.storage.checkpoint_backend, &config.workspace_dir).await?;
    let memory_store = create_memory_store(&config.storage, &config.workspace_dir).await?;
    let provider = create_provider(config);
    let collaborators = Arc::new(PromptCollaborators::from_config(provider, config)?);

    info!(
        checkpoints = checkpoints.name(),
        memory = memory_store.name(),
        model = %config.default_model,
        "engine ready"
    );

    Ok(WorkflowEngine::new(
        checkpoints,
        memory_store,
        collaborators,
        EngineConfig::from_config(config),
    ))
}

fn print_json(value: &impl Serialize) -> Result<(), QuillError> {
    let rendered = serde_json::to_string_pretty(value).map_err(anyhow::Error::from)?;
    println!("{rendered}");
    Ok(())
}

fn print_run(result: &RunResult) -> Result<(), QuillError> {
    info!(
        session_id = result.session_id(),
        status = %result.status(),
        "session updated"
    );
    print_json(result)
}

/// The suggestions currently awaiting confirmation.
async fn pending_suggestions(
    engine: &WorkflowEngine,
    session: &str,
) -> Result<Vec<String>, QuillError> {
    let checkpoint = engine.snapshot(session).await?;
    match checkpoint.pending_suspension.map(|s| s.payload) {
        Some(SuspensionPayload::MemoryConfirmation { suggested_memories }) => {
            Ok(suggested_memories)
        }
        Some(SuspensionPayload::Review { .. }) => Err(WorkflowError::MalformedDecision(
            "session is waiting for a review, not a memory confirmation".into(),
        )
        .into()),
        None => Err(WorkflowError::NoActiveSuspension {
            session_id: session.to_string(),
        }
        .into()),
    }
}

pub async fn dispatch(cli: Cli, config: Config) -> Result<(), QuillError> {
    if let Commands::Status = cli.command {
        println!("{}", render_status(&config));
        return Ok(());
    }

    let engine = build_engine(&config).await?;

    match cli.command {
        Commands::Status => unreachable!(),

        Commands::Start {
            request,
            user,
            session,
        } => {
            let bootstrap = SessionBootstrap::new(user, request);
            let result = match session {
                Some(session_id) => {
                    let state = bootstrap.into_state(&session_id);
                    engine.start(&session_id, state).await?
                }
                None => engine.start_session(bootstrap).await?,
            };
            print_run(&result)
        }

        Commands::Resume {
            session,
            decision,
            suspension_id,
        } => {
            let decision = ResumeDecision::from_json_str(&decision)?;
            let result = match suspension_id {
                Some(id) => engine.resume_at(&session, &id, decision).await?,
                None => engine.resume(&session, decision).await?,
            };
            print_run(&result)
        }

        Commands::Approve { session } => {
            print_run(&engine.resume(&session, ResumeDecision::approve()).await?)
        }

        Commands::Revise { session, feedback } => {
            print_run(&engine.resume(&session, ResumeDecision::revise(feedback)).await?)
        }

        Commands::Reject { session } => {
            print_run(&engine.resume(&session, ResumeDecision::reject()).await?)
        }

        Commands::Confirm { session, memories } => {
            let memories = if memories.is_empty() {
                pending_suggestions(&engine, &session).await?
            } else {
                memories
            };
            let decision = ResumeDecision::confirm_memories(memories);
            print_run(&engine.resume(&session, decision).await?)
        }

        Commands::EditSuggestion {
            session,
            index,
            text,
        } => {
            let suspension = engine
                .amend_suggestions(&session, SuggestionEdit::Replace { index, text })
                .await?;
            print_json(&suspension)
        }

        Commands::DeleteSuggestion { session, index } => {
            let suspension = engine
                .amend_suggestions(&session, SuggestionEdit::Remove { index })
                .await?;
            print_json(&suspension)
        }

        Commands::Show { session } => print_json(&engine.snapshot(&session).await?),

        Commands::Sessions => {
            for session_id in engine.list_sessions().await? {
                println!("{session_id}");
            }
            Ok(())
        }

        Commands::Users => {
            let users = engine
                .memory_store()
                .list_users()
                .await
                .map_err(|e| WorkflowError::store(&e))?;
            for user in users {
                println!("{user}");
            }
            Ok(())
        }

        Commands::Memories { user } => {
            let memories = engine
                .memory_store()
                .get_memories(&user)
                .await
                .map_err(|e| WorkflowError::store(&e))?;
            print_json(&memories)
        }
    }
}

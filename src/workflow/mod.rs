//! The writing workflow: a fixed graph of nodes, two of which pause for a
//! human decision, run against durable checkpoints.

pub mod checkpoint;
pub mod engine;
pub mod graph;
pub mod memory_cycle;
pub mod nodes;
pub mod state;
pub mod suspension;

pub use checkpoint::{
    Checkpoint, CheckpointStore, InMemoryCheckpointStore, RunStatus, SqliteCheckpointStore,
    create_checkpoint_store,
};
pub use engine::{EngineConfig, RunResult, WorkflowEngine};
pub use graph::{Exit, NodeName, Target};
pub use memory_cycle::{SuggestionEdit, SuggestionList};
pub use state::{Revision, SessionBootstrap, SessionState};
pub use suspension::{
    ConfirmDecision, ResumeDecision, ReviewDecision, Suspension, SuspensionPayload,
};

mod engine;
mod templates;

pub use engine::TeraEngine;
pub use templates::{NO_NEW_MEMORIES, PromptTemplates, SYSTEM_PROMPT};

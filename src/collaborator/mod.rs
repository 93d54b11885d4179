mod parse;
mod prompt_backed;
mod traits;

pub use parse::{parse_extraction, parse_selection};
pub use prompt_backed::{CollaboratorModels, PromptCollaborators};
pub use traits::{Collaborators, ExtractionContext, RevisionContext};

use super::engine::TeraEngine;
use crate::collaborator::{ExtractionContext, RevisionContext};
use serde::Serialize;
use tera::Context;

pub const SYSTEM_PROMPT: &str = "You are a careful writing assistant. \
Follow the user's stated preferences and reply with plain text only.";

/// Exact reply the extraction prompt asks for when nothing was learned.
pub const NO_NEW_MEMORIES: &str = "No new memories to extract.";

const SELECT: &str = "select.txt";
const DRAFT: &str = "draft.txt";
const REVISE: &str = "revise.txt";
const EXTRACT: &str = "extract.txt";

const SELECT_TEMPLATE: &str = r"You select which stored writing preferences apply to a request.

Rules:
- Keep only memories that directly affect this request.
- Explicit instructions in the request win over memories.
- Prefer a specific memory over a general one that says the same thing.
- Exclude memories aimed at a different channel or audience.
- Copy the wording of every selected memory exactly.

Request:
{{ original_request }}

Available memories:
{% for memory in memories %}- {{ memory }}
{% endfor %}
Reply with a JSON array of strings holding the applicable memories. Reply with [] if none apply.
";

const DRAFT_TEMPLATE: &str = r"Write a draft that answers the request below.

Request:
{{ original_request }}
{% if applicable_memories %}
The user has asked you to keep these preferences:
{% for memory in applicable_memories %}- {{ memory }}
{% endfor %}{% endif %}
Reply with the draft only.
";

const REVISE_TEMPLATE: &str = r"You are revising a draft based on user feedback. Address the points raised in the feedback and keep the text accurate and clear.

Request:
{{ original_request }}
{% if applicable_memories %}
The user has asked you to keep these preferences:
{% for memory in applicable_memories %}- {{ memory }}
{% endfor %}{% endif %}
Revision history:
{% for revision in history %}Round {{ loop.index }}
Draft: {{ revision.draft }}
Feedback: {{ revision.feedback }}

{% endfor %}Current draft:
{{ current_draft }}

Feedback:
{% if feedback %}{{ feedback }}{% else %}(none given; tighten and improve the draft){% endif %}

Reply with the revised draft only.
";

const EXTRACT_TEMPLATE: &str = r"You have just finished a revision cycle with a user. Find what it teaches about their writing preferences so future drafts need fewer revisions.

Request: {{ original_request }}
Initial draft: {{ initial_draft }}
Latest feedback: {{ feedback }}
Final draft: {{ current_draft }}

Revision rounds:
{% for revision in past_revisions %}Round {{ loop.index }}
Feedback: {{ revision.feedback }}
Draft: {{ revision.draft }}

{% endfor %}Look at tone, length, structure, content to stress or avoid, and explicit constraints.
Write at most {{ max_memories }} short, actionable statements, one per line, without numbering or bullets.
If nothing new was learned, reply exactly: {{ no_new_memories }}
";

/// Renders the prompts sent to the generation backend.
pub struct PromptTemplates {
    engine: TeraEngine,
}

#[derive(Serialize)]
struct SelectVars<'a> {
    original_request: &'a str,
    memories: &'a [String],
}

#[derive(Serialize)]
struct DraftVars<'a> {
    original_request: &'a str,
    applicable_memories: &'a [String],
}

impl PromptTemplates {
    pub fn new() -> anyhow::Result<Self> {
        let mut engine = TeraEngine::new();
        engine.add_template(SELECT, SELECT_TEMPLATE)?;
        engine.add_template(DRAFT, DRAFT_TEMPLATE)?;
        engine.add_template(REVISE, REVISE_TEMPLATE)?;
        engine.add_template(EXTRACT, EXTRACT_TEMPLATE)?;
        Ok(Self { engine })
    }

    pub fn select(&self, original_request: &str, memories: &[String]) -> anyhow::Result<String> {
        let vars = SelectVars {
            original_request,
            memories,
        };
        self.engine.render(SELECT, &Context::from_serialize(vars)?)
    }

    pub fn draft(
        &self,
        original_request: &str,
        applicable_memories: &[String],
    ) -> anyhow::Result<String> {
        let vars = DraftVars {
            original_request,
            applicable_memories,
        };
        self.engine.render(DRAFT, &Context::from_serialize(vars)?)
    }

    pub fn revise(&self, ctx: &RevisionContext<'_>) -> anyhow::Result<String> {
        self.engine.render(REVISE, &Context::from_serialize(ctx)?)
    }

    pub fn extract(&self, ctx: &ExtractionContext<'_>, max_memories: usize) -> anyhow::Result<String> {
        let mut context = Context::from_serialize(ctx)?;
        context.insert("max_memories", &max_memories);
        context.insert("no_new_memories", NO_NEW_MEMORIES);
        self.engine.render(EXTRACT, &context)
    }
}

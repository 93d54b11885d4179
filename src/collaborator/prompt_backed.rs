use super::parse::{parse_extraction, parse_selection};
use super::traits::{Collaborators, ExtractionContext, RevisionContext};
use crate::config::Config;
use crate::prompt::{PromptTemplates, SYSTEM_PROMPT};
use crate::providers::Provider;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Model used by each collaborator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollaboratorModels {
    pub select: String,
    pub draft: String,
    pub revise: String,
    pub extract: String,
}

impl CollaboratorModels {
    pub fn uniform(model: &str) -> Self {
        Self {
            select: model.to_string(),
            draft: model.to_string(),
            revise: model.to_string(),
            extract: model.to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let generation = &config.generation;
        Self {
            select: config.model_for(generation.select_model.as_ref()),
            draft: config.model_for(generation.draft_model.as_ref()),
            revise: config.model_for(generation.revise_model.as_ref()),
            extract: config.model_for(generation.extract_model.as_ref()),
        }
    }
}

/// Collaborators that render a prompt and ask a chat provider.
pub struct PromptCollaborators {
    provider: Arc<dyn Provider>,
    templates: PromptTemplates,
    models: CollaboratorModels,
    temperature: f64,
    max_suggested_memories: usize,
}

impl PromptCollaborators {
    pub fn new(
        provider: Arc<dyn Provider>,
        models: CollaboratorModels,
        temperature: f64,
        max_suggested_memories: usize,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            provider,
            templates: PromptTemplates::new()?,
            models,
            temperature,
            max_suggested_memories,
        })
    }

    pub fn from_config(provider: Arc<dyn Provider>, config: &Config) -> anyhow::Result<Self> {
        Self::new(
            provider,
            CollaboratorModels::from_config(config),
            config.default_temperature,
            config.generation.max_suggested_memories,
        )
    }

    async fn ask(&self, prompt: &str, model: &str) -> anyhow::Result<String> {
        let reply = self
            .provider
            .chat_with_system(Some(SYSTEM_PROMPT), prompt, model, self.temperature)
            .await?;
        Ok(reply.trim().to_string())
    }
}

impl Collaborators for PromptCollaborators {
    fn select<'a>(
        &'a self,
        original_request: &'a str,
        memories: &'a [String],
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<String>>> + Send + 'a>> {
        Box::pin(async move {
            if memories.is_empty() {
                return Ok(Vec::new());
            }
            let prompt = self.templates.select(original_request, memories)?;
            let reply = self.ask(&prompt, &self.models.select).await?;
            parse_selection(&reply)
        })
    }

    fn draft<'a>(
        &'a self,
        original_request: &'a str,
        applicable_memories: &'a [String],
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let prompt = self.templates.draft(original_request, applicable_memories)?;
            self.ask(&prompt, &self.models.draft).await
        })
    }

    fn revise<'a>(
        &'a self,
        ctx: RevisionContext<'a>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let prompt = self.templates.revise(&ctx)?;
            self.ask(&prompt, &self.models.revise).await
        })
    }

    fn extract<'a>(
        &'a self,
        ctx: ExtractionContext<'a>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<String>>> + Send + 'a>> {
        Box::pin(async move {
            let prompt = self
                .templates
                .extract(&ctx, self.max_suggested_memories)?;
            let reply = self.ask(&prompt, &self.models.extract).await?;
            Ok(parse_extraction(&reply, self.max_suggested_memories))
        })
    }
}

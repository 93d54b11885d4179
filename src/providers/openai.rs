//! Provider for any API speaking the OpenAI `/chat/completions` format.

use super::{api_error, traits::Provider};
use anyhow::Context;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub struct OpenAiProvider {
    /// Pre-computed `"Bearer <key>"` header value.
    cached_auth_header: Option<String>,
    chat_url: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

pub fn build_provider_client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .unwrap_or_else(|_| Client::new())
}

impl OpenAiProvider {
    pub fn new(base_url: &str, api_key: Option<&str>, timeout_secs: u64) -> Self {
        let base_url = base_url.trim_end_matches('/');
        let chat_url = if base_url.ends_with("/chat/completions") {
            base_url.to_string()
        } else {
            format!("{base_url}/chat/completions")
        };

        Self {
            cached_auth_header: api_key
                .filter(|k| !k.is_empty())
                .map(|k| format!("Bearer {k}")),
            chat_url,
            client: build_provider_client(timeout_secs),
        }
    }

    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }

    fn build_request<'a>(
        system_prompt: Option<&'a str>,
        message: &'a str,
        model: &'a str,
        temperature: f64,
    ) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(sys) = system_prompt {
            messages.push(Message {
                role: "system",
                content: sys,
            });
        }
        messages.push(Message {
            role: "user",
            content: message,
        });

        ChatRequest {
            model,
            messages,
            temperature,
        }
    }

    async fn call_api(&self, request: &ChatRequest<'_>) -> anyhow::Result<ChatResponse> {
        let auth_header = self.cached_auth_header.as_ref().ok_or_else(|| {
            anyhow::anyhow!(
                "API key not set. Set QUILLCRAFT_API_KEY or OPENAI_API_KEY, or edit config.toml."
            )
        })?;

        let response = self
            .client
            .post(&self.chat_url)
            .header("Authorization", auth_header)
            .json(request)
            .send()
            .await
            .context("chat completion request failed")?;

        if !response.status().is_success() {
            return Err(api_error("OpenAI", response).await);
        }

        response
            .json()
            .await
            .context("chat completion response JSON decode failed")
    }

    fn extract_text(chat_response: ChatResponse) -> anyhow::Result<String> {
        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("No response from OpenAI"))
    }
}

impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn chat_with_system<'a>(
        &'a self,
        system_prompt: Option<&'a str>,
        message: &'a str,
        model: &'a str,
        temperature: f64,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let request = Self::build_request(system_prompt, message, model, temperature);
            tracing::debug!(model, url = %self.chat_url, "sending chat completion");
            let response = self.call_api(&request).await?;
            Self::extract_text(response)
        })
    }
}

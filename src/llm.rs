//! Text-generation client
//!
//! One chat-completion backend shared by every pipeline stage; each stage
//! supplies its own system instruction and generation settings.

use crate::error::{AskError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Per-stage completion parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.95,
            max_tokens: 4096,
        }
    }
}

impl GenerationSettings {
    /// Deterministic settings for code generation.
    pub fn deterministic() -> Self {
        Self {
            temperature: 0.0,
            ..Self::default()
        }
    }
}

/// Completion backend seam. Production talks HTTP; tests plug in stubs.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(
        &self,
        system: &str,
        turns: &[ChatMessage],
        settings: &GenerationSettings,
    ) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f64,
    top_p: f64,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

/// OpenAI-style chat-completions client with an `api-key` header.
#[derive(Clone)]
pub struct OpenAiBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiBackend {
    pub fn new(endpoint: String, api_key: String, model: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(180))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            endpoint,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    async fn complete(
        &self,
        system: &str,
        turns: &[ChatMessage],
        settings: &GenerationSettings,
    ) -> Result<String> {
        let mut messages = Vec::with_capacity(turns.len() + 1);
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: system.to_string(),
        });
        messages.extend_from_slice(turns);

        let body = CompletionRequest {
            model: &self.model,
            messages,
            temperature: settings.temperature,
            top_p: settings.top_p,
            max_tokens: settings.max_tokens,
        };

        debug!(endpoint = %self.endpoint, "sending completion request");
        let response = self
            .client
            .post(&self.endpoint)
            .header("api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AskError::Llm(format!("completion request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| AskError::Llm(format!("completion request rejected: {}", e)))?;

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| AskError::Llm(format!("failed to parse completion response: {}", e)))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AskError::Llm("no content in completion response".to_string()))?;

        Ok(content.trim().to_string())
    }
}

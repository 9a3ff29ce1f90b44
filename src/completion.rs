//! Chat-completion client.
//!
//! Sends the prompt as a single user message and returns the trimmed reply.
//! Any failure collapses to a fixed fallback text for the listener, while
//! the classified error is kept for logs and status reporting.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::CompletionConfig;
use crate::error::CompletionError;

/// Spoken in place of a reply when the request fails.
pub const FALLBACK_TEXT: &str = "Free tier limit exhausted";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionResult {
    Success(String),
    Fallback(CompletionError),
}

impl CompletionResult {
    /// Text to show and narrate.
    pub fn text(&self) -> &str {
        match self {
            Self::Success(text) => text,
            Self::Fallback(_) => FALLBACK_TEXT,
        }
    }

    pub fn error(&self) -> Option<&CompletionError> {
        match self {
            Self::Success(_) => None,
            Self::Fallback(e) => Some(e),
        }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    content: Option<String>,
}

pub struct CompletionClient {
    config: CompletionConfig,
    api_key: String,
    client: Client,
}

impl CompletionClient {
    pub fn new(config: CompletionConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;

        let api_key = config.resolve_api_key().unwrap_or_else(|| {
            warn!(
                "No API key (set {} or completion.api_key); requests will be rejected",
                config.api_key_env
            );
            String::new()
        });

        Ok(Self {
            config,
            api_key,
            client,
        })
    }

    /// Fetch a reply, substituting the fallback text on any failure.
    pub async fn complete(&self, prompt: &str) -> CompletionResult {
        match self.try_complete(prompt).await {
            Ok(text) => CompletionResult::Success(text),
            Err(e) => {
                warn!("Completion failed ({}): {e}", e.kind());
                CompletionResult::Fallback(e)
            }
        }
    }

    /// Fetch a reply, reporting why it failed.
    pub async fn try_complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let body = json!({
            "model": self.config.model,
            "messages": [{ "role": "user", "content": prompt }],
            "max_tokens": self.config.max_tokens,
        });
        debug!("Sending prompt to model '{}': {prompt}", self.config.model);

        let resp = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(classify_status(status));
        }

        let data: ChatResponse = resp
            .json()
            .await
            .map_err(|e| CompletionError::Malformed(e.to_string()))?;

        let content = data
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| CompletionError::Malformed("no choices[0].message.content".into()))?;

        let text = content.trim().to_string();
        debug!("Completion: {} chars", text.len());
        Ok(text)
    }
}

fn classify_transport(e: reqwest::Error) -> CompletionError {
    if e.is_timeout() {
        CompletionError::Timeout
    } else {
        CompletionError::Transport(e.to_string())
    }
}

fn classify_status(status: StatusCode) -> CompletionError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            CompletionError::Unauthorized(status.as_u16())
        }
        StatusCode::TOO_MANY_REQUESTS => CompletionError::RateLimited,
        other => CompletionError::Status(other.as_u16()),
    }
}

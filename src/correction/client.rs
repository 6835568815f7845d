use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::{AppError, Result};

const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// A chat-completion endpoint.
///
/// Returns the decoded JSON body of a 200 response; interpreting its shape is
/// left to the caller.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<serde_json::Value>;
}

/// HTTP client for OpenAI-compatible chat-completion servers.
pub struct ChatClient {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl ChatClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: format!(
                "{}{CHAT_COMPLETIONS_PATH}",
                config.endpoint.trim_end_matches('/')
            ),
            api_key: config.api_key.clone().filter(|key| !key.is_empty()),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ChatBackend for ChatClient {
    async fn complete(&self, request: &ChatRequest) -> Result<serde_json::Value> {
        let mut builder = self
            .client
            .post(&self.url)
            .header("content-type", "application/json")
            .json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;

        let status = response.status();
        let body = response.text().await?;
        if status.as_u16() != 200 {
            return Err(AppError::CorrectionRequestFailed {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            AppError::CorrectionMalformed(format!("response is not JSON ({e}): {body}"))
        })
    }
}

// --- Request types ---

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
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
}

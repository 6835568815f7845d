use std::sync::Arc;

use crate::config::LlmConfig;
use crate::correction::client::{ChatBackend, ChatMessage, ChatRequest};
use crate::correction::fence::strip_code_fence;
use crate::correction::prompt;
use crate::error::{AppError, Result};

/// Longest slice of a response body quoted in a malformed-response error.
const BODY_EXCERPT_CHARS: usize = 500;

/// A single-turn correction: the failing document and what to do with it.
#[derive(Debug, Clone)]
pub struct CorrectionRequest {
    pub document_text: String,
    pub instruction: String,
}

impl CorrectionRequest {
    pub fn for_document(document_text: &str) -> Self {
        Self {
            document_text: document_text.to_string(),
            instruction: prompt::correction_prompt(document_text),
        }
    }
}

/// Asks a language model for a corrected workflow.
///
/// The reply is untrusted: it is fence-stripped but never validated as YAML.
/// Review happens on the pull request.
pub struct CorrectionEngine {
    backend: Arc<dyn ChatBackend>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl CorrectionEngine {
    pub fn new(backend: Arc<dyn ChatBackend>, config: &LlmConfig) -> Self {
        Self {
            backend,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    pub async fn correct(&self, document_text: &str) -> Result<String> {
        self.submit(&CorrectionRequest::for_document(document_text))
            .await
    }

    pub async fn submit(&self, request: &CorrectionRequest) -> Result<String> {
        let chat = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::user(request.instruction.clone())],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        tracing::info!(
            model = %self.model,
            document_bytes = request.document_text.len(),
            "Requesting workflow correction"
        );

        let response = self.backend.complete(&chat).await?;

        if let Some(usage) = response.get("usage") {
            tracing::info!(
                prompt_tokens = usage.get("prompt_tokens").and_then(|v| v.as_u64()),
                completion_tokens = usage.get("completion_tokens").and_then(|v| v.as_u64()),
                "LLM usage"
            );
        }

        let reply = extract_reply(&response).ok_or_else(|| {
            AppError::CorrectionMalformed(format!(
                "missing choices[0].message.content in {}",
                excerpt(&response.to_string())
            ))
        })?;

        let corrected = strip_code_fence(reply);
        if corrected.trim().is_empty() {
            return Err(AppError::CorrectionMalformed(
                "model returned an empty correction".to_string(),
            ));
        }

        tracing::info!(corrected_bytes = corrected.len(), "Received corrected workflow");
        Ok(corrected)
    }
}

/// Text of the first choice's message, if the response has that shape.
fn extract_reply(response: &serde_json::Value) -> Option<&str> {
    response
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
}

fn excerpt(body: &str) -> String {
    if body.chars().count() <= BODY_EXCERPT_CHARS {
        body.to_string()
    } else {
        let cut: String = body.chars().take(BODY_EXCERPT_CHARS).collect();
        format!("{cut}…")
    }
}

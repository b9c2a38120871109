//! LLM client: the single point of entry for cover-letter generation.
//!
//! ARCHITECTURAL RULE: no other module talks to the model endpoint directly.
//! Generation never fails from the caller's point of view: every error
//! degrades to a deterministic fallback draft that embeds a prompt prefix.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

const MAX_TOKENS: u32 = 400;
const FALLBACK_PREFIX_CHARS: usize = 200;
const STUB_PREFIX_CHARS: usize = 300;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// Where a draft's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftOrigin {
    Model,
    Stub,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverDraft {
    pub text: String,
    pub origin: DraftOrigin,
}

impl CoverDraft {
    pub fn fallback(prompt: &str) -> Self {
        Self {
            text: format!(
                "[LLM failure] Generated fallback for prompt: {}",
                prefix(prompt, FALLBACK_PREFIX_CHARS)
            ),
            origin: DraftOrigin::Fallback,
        }
    }

    pub fn stub(prompt: &str) -> Self {
        Self {
            text: format!(
                "Optimized cover for prompt (stub): {}",
                prefix(prompt, STUB_PREFIX_CHARS)
            ),
            origin: DraftOrigin::Stub,
        }
    }
}

/// Anything that can turn a prompt into cover-letter text.
///
/// Implementations must not fail; they return a fallback draft instead.
#[async_trait]
pub trait CoverLetterGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> CoverDraft;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
    max_tokens: u32,
}

/// Client for a locally hosted model exposing `POST {"prompt", "max_tokens"}`.
///
/// Without an endpoint it produces stub drafts.
#[derive(Clone)]
pub struct LocalLlmClient {
    client: Client,
    endpoint: Option<String>,
}

impl LocalLlmClient {
    pub fn new(endpoint: Option<String>, timeout: Duration) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            endpoint: endpoint.filter(|e| !e.trim().is_empty()),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Makes a single bounded call to the endpoint.
    pub async fn call(&self, endpoint: &str, prompt: &str) -> Result<String, LlmError> {
        let response = self
            .client
            .post(endpoint)
            .json(&GenerateRequest {
                prompt,
                max_tokens: MAX_TOKENS,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response.json().await?;
        let text = extract_text(&body);
        if text.trim().is_empty() {
            return Err(LlmError::EmptyContent);
        }

        debug!(chars = text.len(), "LLM call succeeded");
        Ok(text)
    }
}

#[async_trait]
impl CoverLetterGenerator for LocalLlmClient {
    async fn generate(&self, prompt: &str) -> CoverDraft {
        let Some(endpoint) = self.endpoint.as_deref() else {
            return CoverDraft::stub(prompt);
        };

        match self.call(endpoint, prompt).await {
            Ok(text) => CoverDraft {
                text,
                origin: DraftOrigin::Model,
            },
            Err(e) => {
                warn!("LLM endpoint error: {e}");
                CoverDraft::fallback(prompt)
            }
        }
    }
}

/// Reads `text`, then `generated`, else the whole JSON document.
fn extract_text(body: &Value) -> String {
    ["text", "generated"]
        .iter()
        .find_map(|key| {
            body.get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

fn prefix(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_text_prefers_text_field() {
        let body = json!({"text": "Dear Acme", "generated": "ignored"});
        assert_eq!(extract_text(&body), "Dear Acme");
    }

    #[test]
    fn test_extract_text_falls_back_to_generated() {
        let body = json!({"generated": "Dear Globex"});
        assert_eq!(extract_text(&body), "Dear Globex");
    }

    #[test]
    fn test_extract_text_uses_raw_json_otherwise() {
        let body = json!({"choices": [1, 2]});
        assert_eq!(extract_text(&body), r#"{"choices":[1,2]}"#);
    }

    #[test]
    fn test_fallback_embeds_bounded_prompt_prefix() {
        let prompt = "x".repeat(1000);
        let draft = CoverDraft::fallback(&prompt);
        assert_eq!(draft.origin, DraftOrigin::Fallback);
        assert!(draft.text.starts_with("[LLM failure] Generated fallback for prompt: "));
        assert_eq!(draft.text.matches('x').count(), FALLBACK_PREFIX_CHARS);
    }

    #[tokio::test]
    async fn test_unconfigured_client_returns_stub() {
        let client = LocalLlmClient::new(None, Duration::from_secs(1)).unwrap();
        assert!(!client.is_configured());
        let draft = client.generate("Write a cover letter for SWE at Acme").await;
        assert_eq!(draft.origin, DraftOrigin::Stub);
        assert!(draft.text.ends_with("Write a cover letter for SWE at Acme"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_degrades_to_fallback() {
        // Port 9 (discard) on loopback is closed in test environments.
        let client = LocalLlmClient::new(
            Some("http://127.0.0.1:9/generate".to_string()),
            Duration::from_secs(2),
        )
        .unwrap();
        let draft = client.generate("prompt").await;
        assert_eq!(draft.origin, DraftOrigin::Fallback);
        assert!(draft.text.contains("prompt"));
    }
}

//! LLM client — the single point of entry for all text-generation calls.
//!
//! ARCHITECTURAL RULE: no other module may talk to the completion API
//! directly. All LLM interactions go through this module.

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("text-generation service is not configured (missing OPENAI_API_KEY)")]
    MissingApiKey,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("LLM returned empty content")]
    EmptyContent,
}

impl LlmError {
    /// True for errors that mean "the operator never configured the service",
    /// as opposed to a call that actually failed. Chat degrades differently
    /// for the two cases.
    pub fn is_configuration(&self) -> bool {
        matches!(self, LlmError::MissingApiKey)
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// One completion request: a system role, a user prompt, and sampling limits.
#[derive(Debug, Clone, Copy)]
pub struct Completion<'a> {
    pub model: &'a str,
    pub system: &'a str,
    pub prompt: &'a str,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Client for an OpenAI-compatible chat-completions endpoint.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl LlmClient {
    pub fn new(api_key: Option<String>, base_url: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Performs one completion call and returns the generated text.
    ///
    /// No automatic retries; the single fallback is a request-shape shim for
    /// models that reject `max_tokens` in favor of `max_completion_tokens`.
    pub async fn complete(&self, req: Completion<'_>) -> Result<String, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::MissingApiKey)?;

        let body = json!({
            "model": req.model,
            "messages": [
                { "role": "system", "content": req.system },
                { "role": "user", "content": req.prompt },
            ],
            "max_tokens": req.max_tokens,
            "temperature": req.temperature,
        });

        match self.send(api_key, &body).await {
            Err(LlmError::Api { message, .. }) if is_token_param_rejection(&message) => {
                warn!("API rejected max_tokens, retrying with max_completion_tokens");
                let mut body = body;
                let obj = body.as_object_mut().expect("request body is an object");
                obj.remove("max_tokens");
                obj.insert("max_completion_tokens".to_string(), json!(req.max_tokens));
                self.send(api_key, &body).await
            }
            other => other,
        }
    }

    async fn send(&self, api_key: &str, body: &serde_json::Value) -> Result<String, LlmError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorEnvelope>(&raw)
                .map(|e| e.error.message)
                .unwrap_or(raw);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatCompletionResponse = response.json().await?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or(LlmError::EmptyContent)?;

        debug!("LLM call succeeded ({} chars)", text.len());
        Ok(text)
    }
}

/// Detects the "this model does not accept max_tokens" rejection so the call
/// can be replayed once with the alternate parameter name.
fn is_token_param_rejection(message: &str) -> bool {
    let m = message.to_lowercase();
    m.contains("max_completion_tokens")
        || (m.contains("max_tokens")
            && (m.contains("unsupported") || m.contains("unrecognized") || m.contains("unknown")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_param_rejection_detected() {
        assert!(is_token_param_rejection(
            "Unsupported parameter: 'max_tokens' is not supported with this model. \
             Use 'max_completion_tokens' instead."
        ));
        assert!(is_token_param_rejection("Unrecognized request argument: max_tokens"));
    }

    #[test]
    fn test_unrelated_errors_not_treated_as_param_rejection() {
        assert!(!is_token_param_rejection("Rate limit reached for requests"));
        assert!(!is_token_param_rejection("Incorrect API key provided"));
    }

    #[tokio::test]
    async fn test_missing_api_key_is_configuration_error() {
        let client = LlmClient::new(None, "https://api.openai.com/v1".to_string());
        assert!(!client.is_configured());
        let err = client
            .complete(Completion {
                model: "gpt-4o",
                system: "You are a test.",
                prompt: "hello",
                max_tokens: 10,
                temperature: 0.0,
            })
            .await
            .unwrap_err();
        assert!(err.is_configuration());
    }
}

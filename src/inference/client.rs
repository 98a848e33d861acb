//! OpenAI-compatible inference client.
//!
//! Sends non-streaming chat completion requests to the configured provider
//! endpoint and returns the reply text. Both the chat flow and the merge
//! engine go through the same [`CompletionModel`] seam with different system
//! prompts, so tests can substitute a stub model without touching the
//! network.

use std::time::Duration;

use reqwest::Client as HttpClient;

use crate::config::ProviderConfig;

use super::errors::InferenceError;
use super::types::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage};

// ─── Constants ───────────────────────────────────────────────────────────────

/// TCP connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Total request timeout for a completion call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ─── CompletionModel ─────────────────────────────────────────────────────────

/// The model-call contract: ordered role-tagged messages in, reply text out.
///
/// `model` overrides the configured default for this one call (the UI's model
/// dropdown travels through here). Implementations must not retain the
/// messages after the call returns.
pub trait CompletionModel {
    fn complete(
        &self,
        messages: Vec<ChatMessage>,
        model: Option<&str>,
    ) -> impl std::future::Future<Output = Result<String, InferenceError>>;
}

impl<M: CompletionModel> CompletionModel for &M {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        model: Option<&str>,
    ) -> Result<String, InferenceError> {
        (**self).complete(messages, model).await
    }
}

// ─── InferenceClient ─────────────────────────────────────────────────────────

/// Client for the chat completion endpoint.
///
/// Created from [`ProviderConfig`]. Does NOT check connectivity at
/// construction — that happens on the first request.
#[derive(Clone)]
pub struct InferenceClient {
    http: HttpClient,
    base_url: String,
    api_key: Option<String>,
    default_model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl InferenceClient {
    /// Create a new inference client from the provider configuration.
    ///
    /// The API key is resolved from the environment variable the config
    /// names; a missing key is fine for local endpoints.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, InferenceError> {
        let http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| InferenceError::ConnectionFailed {
                endpoint: config.base_url.clone(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key(),
            default_model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    /// The endpoint base URL this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The model identifier used when the caller does not pick one.
    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Attempt one completion request and extract the reply text.
    async fn try_complete(
        &self,
        messages: Vec<ChatMessage>,
        model: &str,
    ) -> Result<String, InferenceError> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = ChatCompletionRequest {
            model: model.to_string(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: false,
        };

        // Log request metadata only — message bodies can be huge.
        tracing::info!(
            url = %url,
            model = %body.model,
            message_count = body.messages.len(),
            "sending chat completion request"
        );

        let mut request = self.http.post(&url).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                InferenceError::Timeout {
                    duration_secs: REQUEST_TIMEOUT.as_secs(),
                }
            } else {
                InferenceError::ConnectionFailed {
                    endpoint: url.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(InferenceError::HttpError {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let body_text = response
            .text()
            .await
            .map_err(|e| InferenceError::MalformedResponse {
                reason: format!("failed to read response body: {e}"),
            })?;

        extract_reply(&body_text, model)
    }
}

impl CompletionModel for InferenceClient {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        model: Option<&str>,
    ) -> Result<String, InferenceError> {
        let model = model.unwrap_or(&self.default_model).to_string();
        self.try_complete(messages, &model).await
    }
}

/// Parse a completion response body and pull out the first choice's text.
///
/// An endpoint that answers 200 with no choices or blank content is treated
/// as `EmptyResponse` — callers rely on "non-empty or error".
fn extract_reply(body: &str, model: &str) -> Result<String, InferenceError> {
    let response: ChatCompletionResponse =
        serde_json::from_str(body).map_err(|e| InferenceError::MalformedResponse {
            reason: format!("invalid completion JSON: {e}"),
        })?;

    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default();

    if content.trim().is_empty() {
        return Err(InferenceError::EmptyResponse {
            model: model.to_string(),
        });
    }

    Ok(content)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ProviderConfig {
        ProviderConfig {
            base_url: "http://localhost:11434/v1/".to_string(),
            api_key_env: "CODEWEAVE_TEST_KEY_UNSET".to_string(),
            model: "test-model".to_string(),
            temperature: 0.7,
            max_tokens: Some(2048),
        }
    }

    #[test]
    fn test_from_config_trims_trailing_slash() {
        let client = InferenceClient::from_config(&test_config()).unwrap();
        assert_eq!(client.base_url(), "http://localhost:11434/v1");
        assert_eq!(client.default_model(), "test-model");
    }

    #[test]
    fn test_extract_reply_happy_path() {
        let body = r#"{"choices":[{"message":{"content":"merged body"},"finish_reason":"stop"}]}"#;
        assert_eq!(extract_reply(body, "m").unwrap(), "merged body");
    }

    #[test]
    fn test_extract_reply_no_choices_is_empty_response() {
        let body = r#"{"choices":[]}"#;
        let err = extract_reply(body, "m").unwrap_err();
        assert!(matches!(err, InferenceError::EmptyResponse { .. }));
    }

    #[test]
    fn test_extract_reply_blank_content_is_empty_response() {
        let body = r#"{"choices":[{"message":{"content":"   \n"},"finish_reason":"stop"}]}"#;
        let err = extract_reply(body, "m").unwrap_err();
        assert!(matches!(err, InferenceError::EmptyResponse { .. }));
    }

    #[test]
    fn test_extract_reply_invalid_json_is_malformed() {
        let err = extract_reply("not json", "m").unwrap_err();
        assert!(matches!(err, InferenceError::MalformedResponse { .. }));
    }
}

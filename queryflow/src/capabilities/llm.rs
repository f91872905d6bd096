//! Language-model client used by the generative stages.

use crate::errors::LlmError;
use async_trait::async_trait;

/// A prompt-in, text-out language model.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Completes a single-turn prompt and returns the text of the reply.
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError>;
}

#[cfg(feature = "anthropic")]
pub use anthropic::AnthropicClient;

#[cfg(feature = "anthropic")]
mod anthropic {
    use super::LanguageModel;
    use crate::errors::LlmError;
    use async_trait::async_trait;
    use serde::Deserialize;
    use std::time::Duration;
    use tracing::debug;

    const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
    const API_VERSION: &str = "2023-06-01";
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

    /// Client for the Anthropic Messages API.
    #[derive(Clone)]
    pub struct AnthropicClient {
        http: reqwest::Client,
        api_key: String,
        model: String,
        base_url: String,
    }

    impl AnthropicClient {
        /// Creates a client for `model`.
        pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
            let api_key = api_key.into();
            if api_key.trim().is_empty() {
                return Err(LlmError::MissingApiKey);
            }

            let http = reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .map_err(|e| LlmError::Request(e.to_string()))?;

            Ok(Self {
                http,
                api_key,
                model: model.into(),
                base_url: DEFAULT_BASE_URL.to_string(),
            })
        }

        /// Points the client at a different endpoint.
        #[must_use]
        pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
            self.base_url = base_url.into().trim_end_matches('/').to_string();
            self
        }

        /// Returns the model identifier.
        #[must_use]
        pub fn model(&self) -> &str {
            &self.model
        }
    }

    impl std::fmt::Debug for AnthropicClient {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("AnthropicClient")
                .field("model", &self.model)
                .field("base_url", &self.base_url)
                .finish_non_exhaustive()
        }
    }

    #[derive(Debug, Deserialize)]
    pub(super) struct MessagesResponse {
        #[serde(default)]
        pub(super) content: Vec<ResponseBlock>,
    }

    #[derive(Debug, Deserialize)]
    pub(super) struct ResponseBlock {
        #[serde(rename = "type")]
        pub(super) kind: String,
        #[serde(default)]
        pub(super) text: String,
    }

    /// Returns the first text block of a response.
    pub(super) fn first_text(response: MessagesResponse) -> Result<String, LlmError> {
        response
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .map(|block| block.text)
            .ok_or(LlmError::EmptyResponse)
    }

    #[async_trait]
    impl LanguageModel for AnthropicClient {
        async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError> {
            let body = serde_json::json!({
                "model": self.model,
                "max_tokens": max_tokens,
                "messages": [{"role": "user", "content": prompt}],
            });

            debug!(model = %self.model, max_tokens, "Calling language model");
            let response = self
                .http
                .post(format!("{}/messages", self.base_url))
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", API_VERSION)
                .json(&body)
                .send()
                .await
                .map_err(|e| LlmError::Request(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(LlmError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            let parsed: MessagesResponse = response
                .json()
                .await
                .map_err(|e| LlmError::Request(e.to_string()))?;
            first_text(parsed)
        }
    }
}

#[cfg(all(test, feature = "anthropic"))]
mod tests {
    use super::anthropic::{first_text, MessagesResponse};
    use super::*;

    #[test]
    fn test_blank_api_key_rejected() {
        let err = AnthropicClient::new("  ", "claude-3-5-sonnet-20241022").unwrap_err();
        assert_eq!(err, LlmError::MissingApiKey);
    }

    #[test]
    fn test_client_keeps_model() {
        let client = AnthropicClient::new("sk-test", "claude-3-5-sonnet-20241022")
            .unwrap()
            .with_base_url("http://localhost:9999/v1/");
        assert_eq!(client.model(), "claude-3-5-sonnet-20241022");
        assert!(!format!("{client:?}").contains("sk-test"));
    }

    #[test]
    fn test_first_text_block() {
        let response: MessagesResponse = serde_json::from_value(serde_json::json!({
            "id": "msg_1",
            "content": [
                {"type": "tool_use", "id": "t1"},
                {"type": "text", "text": "SELECT 1"}
            ]
        }))
        .unwrap();
        assert_eq!(first_text(response).unwrap(), "SELECT 1");
    }

    #[test]
    fn test_no_text_block_is_empty_response() {
        let response: MessagesResponse =
            serde_json::from_value(serde_json::json!({"content": []})).unwrap();
        assert_eq!(first_text(response).unwrap_err(), LlmError::EmptyResponse);
    }

    #[tokio::test]
    async fn test_mock_model() {
        let mut model = MockLanguageModel::new();
        model
            .expect_complete()
            .returning(|prompt, _| Ok(format!("echo: {prompt}")));
        assert_eq!(model.complete("hi", 10).await.unwrap(), "echo: hi");
    }
}

//! Minimal OpenAI client for strict JSON-schema chat completions.
//!
//! Knows nothing about moderation; callers supply prompts and schema.
//!
//! # Example
//!
//! ```rust,ignore
//! use openai_client::{OpenAIClient, StructuredRequest};
//!
//! let client = OpenAIClient::new(api_key).with_timeout(Duration::from_secs(30))?;
//!
//! let json = client
//!     .structured_output(StructuredRequest::new("gpt-4o-mini", system, user, schema))
//!     .await?;
//! ```

pub mod error;
pub mod types;

pub use error::{OpenAIError, Result};
pub use types::*;

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Thin wrapper over the chat completions endpoint.
#[derive(Clone)]
pub struct OpenAIClient {
    http_client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAIClient {
    /// Create a new OpenAI client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Set a custom base URL (for Azure, proxies, etc.).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Bound every request by a total timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OpenAIError::Config(e.to_string()))?;
        Ok(self)
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Structured output with JSON schema.
    ///
    /// Uses OpenAI's `json_schema` response format. Returns the raw JSON text
    /// of the first choice; decoding is left to the caller.
    pub async fn structured_output(&self, request: StructuredRequest) -> Result<String> {
        let start = std::time::Instant::now();
        let body = self.send(&request).await?;
        let content = first_content(body)?;

        debug!(
            model = %request.model,
            schema = %request.response_format.json_schema.name,
            duration_ms = start.elapsed().as_millis(),
            "OpenAI structured output"
        );

        Ok(content)
    }

    async fn send(&self, request: &StructuredRequest) -> Result<CompletionBody> {
        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "OpenAI request failed");
                OpenAIError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %error_text, "OpenAI API error");
            return Err(OpenAIError::Api(format!(
                "OpenAI API error ({}): {}",
                status, error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| OpenAIError::Parse(e.to_string()))
    }
}

fn first_content(body: CompletionBody) -> Result<String> {
    let message = body
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .ok_or_else(|| OpenAIError::Api("No response from OpenAI".into()))?;

    match (message.content, message.refusal) {
        (Some(content), _) => Ok(content),
        (None, Some(refusal)) => Err(OpenAIError::Api(format!("Model refused: {}", refusal))),
        (None, None) => Err(OpenAIError::Parse("Empty message content".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builder() {
        let client = OpenAIClient::new("sk-test").with_base_url("https://custom.api.com");

        assert_eq!(client.api_key, "sk-test");
        assert_eq!(client.base_url(), "https://custom.api.com");
    }

    #[test]
    fn test_first_content_prefers_content() {
        let body: CompletionBody =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"{}"}}]}"#).unwrap();
        assert_eq!(first_content(body).unwrap(), "{}");
    }

    #[test]
    fn test_first_content_reports_refusal() {
        let body: CompletionBody = serde_json::from_str(
            r#"{"choices":[{"message":{"content":null,"refusal":"cannot help"}}]}"#,
        )
        .unwrap();
        assert!(matches!(first_content(body), Err(OpenAIError::Api(_))));
    }

    #[test]
    fn test_empty_choices_is_api_error() {
        let body: CompletionBody = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(first_content(body), Err(OpenAIError::Api(_))));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let client = OpenAIClient::new("sk-test").with_base_url("http://127.0.0.1:1");
        let request = StructuredRequest::new("gpt-4o-mini", "s", "u", serde_json::json!({}));
        let err = client.structured_output(request).await.unwrap_err();
        assert!(err.is_transient());
    }
}

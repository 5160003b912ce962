// AI implementation using OpenAI
//
// This is the infrastructure implementation of BaseAI.
// Business logic (what to prompt for) lives in domain layers.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use openai_client::{strip_code_blocks, OpenAIClient, StructuredRequest};

use super::BaseAI;

/// Per-request budget for the moderation model.
pub const DEFAULT_AI_TIMEOUT: Duration = Duration::from_secs(30);

/// OpenAI implementation of AI capabilities
#[derive(Clone)]
pub struct OpenAIModerationClient {
    client: OpenAIClient,
    model: String,
}

impl OpenAIModerationClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let client = OpenAIClient::new(api_key)
            .with_timeout(DEFAULT_AI_TIMEOUT)
            .context("Failed to build OpenAI HTTP client")?;
        Ok(Self {
            client,
            model: model.into(),
        })
    }

    /// Point at a proxy or compatible endpoint.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.client = self.client.with_base_url(url);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl BaseAI for OpenAIModerationClient {
    async fn generate_structured(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        schema: serde_json::Value,
    ) -> Result<String> {
        tracing::debug!(
            prompt_length = user_prompt.len(),
            model = %self.model,
            "Calling OpenAI for structured output"
        );

        let request = StructuredRequest::new(&self.model, system_prompt, user_prompt, schema)
            .schema_name("moderation_verdict");

        let response = self.client.structured_output(request).await.map_err(|e| {
            if e.is_transient() {
                tracing::warn!(error = %e, model = %self.model, transient = true, "OpenAI API unreachable");
            } else {
                tracing::error!(error = %e, model = %self.model, transient = false, "OpenAI API call failed");
            }
            e
        })?;

        Ok(strip_code_blocks(&response).to_string())
    }
}

/// Stand-in used when no API key is configured. Every call fails, so the
/// analyzer falls back to its safe default.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredAI;

#[async_trait]
impl BaseAI for UnconfiguredAI {
    async fn generate_structured(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
        _schema: serde_json::Value,
    ) -> Result<String> {
        Err(anyhow!("no AI provider configured"))
    }
}

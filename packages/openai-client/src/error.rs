//! Error types for OpenAI client.

use thiserror::Error;

/// Result type for OpenAI client operations.
pub type Result<T> = std::result::Result<T, OpenAIError>;

/// OpenAI client errors.
#[derive(Debug, Error)]
pub enum OpenAIError {
    /// Missing API key or invalid client settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection failure or timeout
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response or an empty choice list
    #[error("API error: {0}")]
    Api(String),

    /// Response body could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),
}

impl OpenAIError {
    /// Whether retrying the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, OpenAIError::Network(_))
    }
}

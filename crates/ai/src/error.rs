//! Error types for AI providers.

use thiserror::Error;

/// Errors returned by AI providers and response parsing.
#[derive(Debug, Error)]
pub enum AiError {
    /// The provider has no API key.
    #[error("{0} not set")]
    MissingApiKey(&'static str),

    /// The HTTP request could not be completed (connect, timeout, body read).
    #[error("AI request failed: {0}")]
    Request(String),

    /// The endpoint answered with a non-success status.
    #[error("AI API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The endpoint answered but produced no candidate text.
    #[error("AI returned an empty result: {0}")]
    EmptyResponse(String),

    /// No JSON object could be extracted from the response text.
    #[error("Failed to parse AI response: {reason}")]
    ResponseParse { reason: String },
}

/// Result alias for AI operations.
pub type AiResult<T> = Result<T, AiError>;

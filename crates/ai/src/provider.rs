//! AI Provider trait and common types.
//!
//! Defines the interface the classification pipeline talks to, plus the
//! helpers that turn a free-form model answer into a typed value.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{AiError, AiResult};

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AIRole {
    /// System message (sets context/behavior)
    System,
    /// User message (input)
    User,
}

/// A message in a conversation with an AI model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AIMessage {
    /// Role of the message sender
    pub role: AIRole,
    /// Content of the message
    pub content: String,
}

impl AIMessage {
    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: AIRole::System,
            content: content.into(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: AIRole::User,
            content: content.into(),
        }
    }
}

/// Token usage information from an AI response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of input tokens
    pub input_tokens: u32,
    /// Number of output tokens
    pub output_tokens: u32,
    /// Total tokens (input + output)
    pub total_tokens: u32,
}

/// Response from an AI model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AIResponse {
    /// Generated text content
    pub text: String,
    /// Token usage information
    pub usage: TokenUsage,
    /// Model that generated the response
    pub model: String,
    /// Provider that generated the response
    pub provider: String,
}

/// Options for text generation.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Temperature for sampling (0.0 to 1.0)
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Whether to request JSON output
    pub json_mode: bool,
}

/// Trait for AI providers.
#[async_trait]
pub trait AIProvider: Send + Sync {
    /// Get the provider name (e.g., "gemini").
    fn name(&self) -> &'static str;

    /// Check if the provider is configured (has API key).
    fn is_configured(&self) -> bool;

    /// Generate text from messages.
    async fn generate_text(
        &self,
        model: &str,
        messages: &[AIMessage],
        options: &GenerateOptions,
    ) -> AiResult<AIResponse>;
}

/// Parse a structured object out of an AI response.
///
/// This is a standalone function rather than a trait method because
/// generic methods are not dyn-compatible.
pub fn parse_ai_response<T: DeserializeOwned>(response: &AIResponse) -> AiResult<T> {
    extract_json(&response.text)
}

/// Extract and parse the JSON object embedded in free-form text.
///
/// The object spans from the first `{` to the last `}`, so prose or markdown
/// fences around it are ignored. When the span does not parse, control
/// characters and trailing commas are stripped and parsing is tried once more.
pub fn extract_json<T: DeserializeOwned>(text: &str) -> AiResult<T> {
    let span = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => &text[start..=end],
        _ => {
            return Err(AiError::ResponseParse {
                reason: format!(
                    "no JSON object found (missing braces). Response: {}",
                    preview(text)
                ),
            })
        }
    };

    match serde_json::from_str(span) {
        Ok(value) => Ok(value),
        Err(first) => {
            tracing::debug!(error = %first, "JSON parse failed, retrying after cleanup");
            let cleaned = clean_json(span);
            serde_json::from_str(&cleaned).map_err(|_| AiError::ResponseParse {
                reason: format!("{first}. Response: {}", preview(text)),
            })
        }
    }
}

static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",(\s*[}\]])").expect("trailing comma pattern is valid"));

/// Drop control characters (C0, DEL, C1) and trailing commas before `}`/`]`.
fn clean_json(raw: &str) -> String {
    let stripped: String = raw.chars().filter(|c| !c.is_control()).collect();
    TRAILING_COMMA.replace_all(&stripped, "$1").into_owned()
}

fn preview(text: &str) -> String {
    text.chars().take(200).collect()
}

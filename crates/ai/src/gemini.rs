//! Google Gemini provider implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AiError, AiResult};

use super::provider::{AIMessage, AIProvider, AIResponse, AIRole, GenerateOptions, TokenUsage};

/// Gemini API base URL
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Environment variable holding the API key
const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";

/// Default model
const DEFAULT_MODEL: &str = "gemini-3-flash-preview";

/// Default request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Gemini content block (one turn of the conversation)
#[derive(Debug, Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

/// Gemini text part
#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

/// Gemini generation parameters
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

/// Gemini API request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GenerationConfig,
}

/// Gemini response part
#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

/// Gemini candidate content
#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

/// Gemini response candidate
#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

/// Gemini usage metadata
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_field_names)]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

/// Gemini API error
#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}

/// Gemini API response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsage>,
    model_version: Option<String>,
    error: Option<GeminiError>,
}

/// Gemini API error response
#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

/// Google Gemini provider.
pub struct GeminiProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl GeminiProvider {
    /// Create a new Gemini provider with an API key.
    pub fn new(api_key: impl Into<String>) -> AiResult<Self> {
        Self::build(Some(api_key.into()), DEFAULT_TIMEOUT)
    }

    /// Create a provider whose requests are bounded by `timeout`.
    pub fn with_timeout(api_key: Option<String>, timeout: Duration) -> AiResult<Self> {
        Self::build(api_key.filter(|k| !k.is_empty()), timeout)
    }

    /// Set a custom base URL (useful for proxies and tests).
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn build(api_key: Option<String>, timeout: Duration) -> AiResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AiError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: GEMINI_API_BASE.to_string(),
        })
    }

    /// Convert messages to Gemini format.
    ///
    /// System messages are folded into the `systemInstruction` block.
    fn convert_messages(messages: &[AIMessage]) -> (Option<GeminiContent>, Vec<GeminiContent>) {
        let system: Vec<GeminiPart> = messages
            .iter()
            .filter(|m| m.role == AIRole::System)
            .map(|m| GeminiPart {
                text: m.content.clone(),
            })
            .collect();

        let contents = messages
            .iter()
            .filter(|m| m.role != AIRole::System)
            .map(|m| GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: m.content.clone(),
                }],
            })
            .collect();

        let system_instruction = if system.is_empty() {
            None
        } else {
            Some(GeminiContent {
                role: None,
                parts: system,
            })
        };

        (system_instruction, contents)
    }
}

#[async_trait]
impl AIProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate_text(
        &self,
        model: &str,
        messages: &[AIMessage],
        options: &GenerateOptions,
    ) -> AiResult<AIResponse> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(AiError::MissingApiKey(ENV_GEMINI_API_KEY))?;

        let (system_instruction, contents) = Self::convert_messages(messages);

        let request = GeminiRequest {
            contents,
            system_instruction,
            generation_config: GenerationConfig {
                temperature: options.temperature,
                max_output_tokens: options.max_tokens,
                response_mime_type: options
                    .json_mode
                    .then(|| "application/json".to_string()),
            },
        };

        let url = format!("{}/models/{model}:generateContent", self.base_url);

        tracing::debug!(model, "Sending Gemini request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| AiError::Request(format!("Gemini API request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AiError::Request(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<GeminiErrorResponse>(&body)
                .map(|r| r.error.message)
                .unwrap_or_else(|_| {
                    status
                        .canonical_reason()
                        .unwrap_or("Unknown error")
                        .to_string()
                });
            return Err(AiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let api_response: GeminiResponse = serde_json::from_str(&body).map_err(|e| {
            AiError::ResponseParse {
                reason: format!("Failed to parse Gemini response: {e}"),
            }
        })?;

        let Some(candidate) = api_response.candidates.first() else {
            let reason = api_response
                .error
                .map_or_else(|| "no candidates returned".to_string(), |e| e.message);
            return Err(AiError::EmptyResponse(reason));
        };

        let text: String = candidate
            .content
            .as_ref()
            .map(|c| c.parts.iter().filter_map(|p| p.text.as_deref()).collect())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(AiError::EmptyResponse(
                "candidate contained no text".to_string(),
            ));
        }

        let usage = api_response.usage_metadata.unwrap_or_default();

        Ok(AIResponse {
            text,
            usage: TokenUsage {
                input_tokens: usage.prompt_token_count,
                output_tokens: usage.candidates_token_count,
                total_tokens: usage.total_token_count,
            },
            model: api_response
                .model_version
                .unwrap_or_else(|| model.to_string()),
            provider: "gemini".to_string(),
        })
    }
}

/// Get the default Gemini model.
pub fn default_model() -> &'static str {
    DEFAULT_MODEL
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MODEL: &str = "gemini-test";

    async fn provider_for(server: &MockServer) -> GeminiProvider {
        GeminiProvider::new("test-key")
            .unwrap()
            .with_base_url(server.uri())
    }

    #[test]
    fn test_provider_name() {
        let provider = GeminiProvider::new("k").unwrap();
        assert_eq!(provider.name(), "gemini");
        assert!(provider.is_configured());
    }

    #[test]
    fn test_message_conversion() {
        let messages = vec![
            AIMessage::system("You are a classifier"),
            AIMessage::user("Hello"),
        ];

        let (system, contents) = GeminiProvider::convert_messages(&messages);

        assert_eq!(system.unwrap().parts[0].text, "You are a classifier");
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0].role.as_deref(), Some("user"));
        assert_eq!(contents[0].parts[0].text, "Hello");
    }

    #[tokio::test]
    async fn test_generate_text_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/models/{MODEL}:generateContent")))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(serde_json::json!({
                "generationConfig": {
                    "temperature": 0.3,
                    "maxOutputTokens": 1000,
                    "responseMimeType": "application/json"
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"content": {"parts": [{"text": "{\"category\":\"Tech\"}"}]}}],
                "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 5, "totalTokenCount": 15}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let options = GenerateOptions {
            temperature: Some(0.3),
            max_tokens: Some(1000),
            json_mode: true,
            ..Default::default()
        };
        let response = provider
            .generate_text(MODEL, &[AIMessage::user("classify")], &options)
            .await
            .unwrap();

        assert_eq!(response.text, "{\"category\":\"Tech\"}");
        assert_eq!(response.usage.total_tokens, 15);
        assert_eq!(response.provider, "gemini");
        assert_eq!(response.model, MODEL);
    }

    #[tokio::test]
    async fn test_generate_text_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"code": 400, "message": "API key not valid"}
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let err = provider
            .generate_text(MODEL, &[AIMessage::user("x")], &GenerateOptions::default())
            .await
            .unwrap_err();

        match err {
            AiError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "API key not valid");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_generate_text_empty_candidates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"candidates": []})),
            )
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let err = provider
            .generate_text(MODEL, &[AIMessage::user("x")], &GenerateOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AiError::EmptyResponse(_)));
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let provider = GeminiProvider::with_timeout(None, Duration::from_secs(1)).unwrap();
        assert!(!provider.is_configured());

        let err = provider
            .generate_text(MODEL, &[AIMessage::user("x")], &GenerateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::MissingApiKey("GEMINI_API_KEY")));
    }
}

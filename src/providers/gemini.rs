use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::errors::ProviderError;
use crate::providers::{status_error, transport_error, LlmRequest, Provider};

const NAME: &str = "Gemini";

/// Gemini client for the Generative Language `generateContent` API
#[derive(Debug)]
pub struct Gemini {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
}

/// Request body for `generateContent`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

/// One part of a content block: text or inline binary data
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inline_data", alias = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InlineData {
    #[serde(rename = "mime_type", alias = "mimeType")]
    mime_type: String,
    /// Base64 payload
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    response_mime_type: String,
}

/// Response body for `generateContent`
#[derive(Debug, Deserialize)]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

impl GeminiRequest {
    /// Build a single-turn request from a provider-neutral one
    pub fn from_request(request: LlmRequest) -> Self {
        let mut parts = Vec::new();
        if let Some(attachment) = request.attachment {
            parts.push(GeminiPart::InlineData {
                inline_data: InlineData {
                    mime_type: attachment.mime_type,
                    data: STANDARD.encode(&attachment.data),
                },
            });
        }
        parts.push(GeminiPart::Text { text: request.prompt });

        Self {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts,
            }],
            system_instruction: request.system.map(|system| GeminiContent {
                role: None,
                parts: vec![GeminiPart::Text { text: system }],
            }),
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
                response_mime_type: "application/json".to_string(),
            },
        }
    }
}

impl GeminiResponse {
    /// Concatenated text of the first candidate
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|part| match part {
                        GeminiPart::Text { text } => Some(text.as_str()),
                        GeminiPart::InlineData { .. } => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Gemini {
    /// Create a new Gemini client
    pub fn new(api_key: impl Into<String>, endpoint: impl Into<String>, model: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            model: model.into(),
        }
    }

    fn api_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        )
    }

    /// Send a generateContent request
    pub async fn generate(&self, request: &GeminiRequest) -> Result<GeminiResponse, ProviderError> {
        let response = self
            .client
            .post(self.api_url())
            .query(&[("key", self.api_key.as_str())])
            .json(request)
            .send()
            .await
            .map_err(|e| transport_error(NAME, e))?;

        if !response.status().is_success() {
            return Err(status_error(NAME, response).await);
        }

        response
            .json::<GeminiResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(format!("Failed to parse Gemini API response: {}", e)))
    }
}

#[async_trait]
impl Provider for Gemini {
    fn name(&self) -> &str {
        NAME
    }

    fn supports_attachments(&self) -> bool {
        true
    }

    async fn complete(&self, request: LlmRequest) -> Result<String, ProviderError> {
        let response = self.generate(&GeminiRequest::from_request(request)).await?;
        if let Some(reason) = response.candidates.first().and_then(|c| c.finish_reason.as_deref()) {
            if reason == "MAX_TOKENS" {
                debug!("Gemini response hit the token limit");
            }
        }
        Ok(response.text())
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        let request = GeminiRequest::from_request(LlmRequest::new("Hello").max_tokens(10));
        self.generate(&request).await.map(|_| ())
    }
}

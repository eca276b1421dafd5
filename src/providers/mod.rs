/*!
 * Language model providers.
 *
 * This module contains client implementations for the completion endpoints
 * the dialogue parser can drive:
 * - Gemini: Google Generative Language API (supports PDF attachments)
 * - Anthropic: Anthropic Messages API
 * - OpenAI: OpenAI Chat Completions API
 * - Ollama: Local LLM server
 * - Mock: scripted behaviours for tests
 *
 * Clients never retry on their own; rate-limit handling lives in
 * `llm::backoff::BackoffPolicy` so every endpoint shares one policy.
 */

use std::fmt::Debug;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::app_config::{LlmConfig, ProviderKind};
use crate::errors::ProviderError;

pub mod anthropic;
pub mod gemini;
pub mod mock;
pub mod ollama;
pub mod openai;

/// Binary payload sent alongside a prompt
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    /// MIME type, e.g. `application/pdf`
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn pdf(data: Vec<u8>) -> Self {
        Self {
            mime_type: "application/pdf".to_string(),
            data,
        }
    }
}

/// Provider-neutral completion request
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub attachment: Option<Attachment>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl LlmRequest {
    /// Create a new request with the default token budget and temperature
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            attachment: None,
            max_tokens: 8192,
            temperature: 0.1,
        }
    }

    /// Set the system instruction
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Attach a binary document
    pub fn attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    /// Set the output token budget
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Apply token budget and temperature from configuration
    pub fn with_config(self, config: &LlmConfig) -> Self {
        self.max_tokens(config.max_tokens).temperature(config.temperature)
    }
}

/// Common trait for all LLM providers
///
/// Implementations map transport and HTTP failures onto `ProviderError`,
/// using `ProviderError::from_status` so rate limits are recognisable.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Display name used in logs
    fn name(&self) -> &str;

    /// Whether `LlmRequest::attachment` is honoured
    fn supports_attachments(&self) -> bool {
        false
    }

    /// Complete a request and return the generated text
    async fn complete(&self, request: LlmRequest) -> Result<String, ProviderError>;

    /// Test the connection to the provider
    async fn test_connection(&self) -> Result<(), ProviderError>;
}

/// Reject attachments for providers that cannot take them
pub(crate) fn reject_attachment(provider: &str, request: &LlmRequest) -> Result<(), ProviderError> {
    if request.attachment.is_some() {
        return Err(ProviderError::Unsupported(format!("{} does not accept attachments", provider)));
    }
    Ok(())
}

/// Map a reqwest send failure to a provider error
pub(crate) fn transport_error(provider: &str, error: reqwest::Error) -> ProviderError {
    if error.is_timeout() || error.is_connect() {
        ProviderError::ConnectionError(format!("{}: {}", provider, error))
    } else {
        ProviderError::RequestFailed(format!("{}: {}", provider, error))
    }
}

/// Turn a non-success response into a classified error
pub(crate) async fn status_error(provider: &str, response: reqwest::Response) -> ProviderError {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to get error response text".to_string());
    log::error!("{} API error ({}): {}", provider, status, body);
    ProviderError::from_status(status, body)
}

/// Build the configured active provider
pub fn from_config(config: &LlmConfig) -> Result<Arc<dyn Provider>> {
    let model = config.get_model();
    let endpoint = config.get_endpoint();
    let timeout = config.get_timeout_secs();
    let api_key = config.get_api_key();

    if api_key.is_empty() {
        if let Some(var) = config.provider.api_key_env() {
            return Err(anyhow!(
                "No API key for {}: set it in the config file or the {} environment variable",
                config.provider.display_name(),
                var
            ));
        }
    }

    let provider: Arc<dyn Provider> = match config.provider {
        ProviderKind::Gemini => Arc::new(gemini::Gemini::new(api_key, endpoint, model, timeout)),
        ProviderKind::Anthropic => Arc::new(anthropic::Anthropic::new(api_key, endpoint, model, timeout)),
        ProviderKind::OpenAI => Arc::new(openai::OpenAI::new(api_key, endpoint, model, timeout)),
        ProviderKind::Ollama => Arc::new(ollama::Ollama::new(endpoint, model, timeout)),
    };
    Ok(provider)
}

use std::time::Duration;

use async_trait::async_trait;
use log::error;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::errors::ProviderError;
use crate::providers::{reject_attachment, status_error, transport_error, LlmRequest, Provider};

const NAME: &str = "Ollama";

/// Ollama client for interacting with a local Ollama server
#[derive(Debug)]
pub struct Ollama {
    /// Base URL of the Ollama API
    base_url: String,
    /// HTTP client for making requests
    client: Client,
    /// Model used for every request
    model: String,
}

/// Generate request for the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Model name to use for generation
    model: String,
    /// Prompt to generate from
    prompt: String,
    /// System message to guide the model
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    /// Additional model parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerationOptions>,
    /// Format to return a response in
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    /// Whether to stream the response
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

/// Generation options for the Ollama API
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Temperature for generation
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    /// Maximum number of tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// Generation response from the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Model name
    #[serde(default)]
    pub model: String,
    /// Generated text
    pub response: String,
    /// Whether the generation is complete
    #[serde(default)]
    pub done: bool,
}

impl GenerationRequest {
    /// Create a new non-streaming generation request
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            system: None,
            options: None,
            format: None,
            stream: Some(false),
        }
    }

    /// Set the system message
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.options.get_or_insert_with(GenerationOptions::default).temperature = Some(temperature);
        self
    }

    /// Set the maximum number of tokens to generate
    pub fn num_predict(mut self, num_predict: u32) -> Self {
        self.options.get_or_insert_with(GenerationOptions::default).num_predict = Some(num_predict);
        self
    }

    /// Set the response format
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}

/// Parse a generate response, falling back to JSONL when the server streamed anyway
pub fn parse_generation_body(body: &str) -> Result<GenerationResponse, ProviderError> {
    if let Ok(response) = serde_json::from_str::<GenerationResponse>(body) {
        return Ok(response);
    }

    let mut text = String::new();
    let mut model = String::new();
    let mut done = false;
    let mut parsed_any = false;
    for line in body.lines().filter(|l| !l.trim().is_empty()) {
        match serde_json::from_str::<GenerationResponse>(line) {
            Ok(part) => {
                parsed_any = true;
                text.push_str(&part.response);
                model = part.model;
                done = part.done;
            }
            Err(e) => {
                error!(
                    "Failed to parse Ollama API response line: {}. Raw (first 500 chars): {}",
                    e,
                    line.chars().take(500).collect::<String>()
                );
            }
        }
    }
    if !parsed_any {
        return Err(ProviderError::ParseError("Ollama returned no parseable JSON".to_string()));
    }
    Ok(GenerationResponse { model, response: text, done })
}

impl Ollama {
    /// Create a new Ollama client from a complete URL
    pub fn new(url: impl Into<String>, model: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            base_url: url.into().trim_end_matches('/').to_string(),
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            model: model.into(),
        }
    }

    /// Generate text from the Ollama API
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| transport_error(NAME, e))?;

        if !response.status().is_success() {
            return Err(status_error(NAME, response).await);
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::ParseError(format!("Failed to get response text from Ollama API: {}", e)))?;
        parse_generation_body(&body)
    }

    /// Server version, used as a connectivity check
    pub async fn version(&self) -> Result<String, ProviderError> {
        #[derive(Deserialize)]
        struct VersionResponse {
            version: String,
        }

        let url = format!("{}/api/version", self.base_url);
        let response = self.client.get(&url).send().await.map_err(|e| transport_error(NAME, e))?;
        if !response.status().is_success() {
            return Err(status_error(NAME, response).await);
        }
        response
            .json::<VersionResponse>()
            .await
            .map(|v| v.version)
            .map_err(|e| ProviderError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl Provider for Ollama {
    fn name(&self) -> &str {
        NAME
    }

    async fn complete(&self, request: LlmRequest) -> Result<String, ProviderError> {
        reject_attachment(NAME, &request)?;
        let mut body = GenerationRequest::new(&self.model, request.prompt)
            .temperature(request.temperature)
            .num_predict(request.max_tokens)
            .format("json");
        if let Some(system) = request.system {
            body = body.system(system);
        }
        Ok(self.generate(&body).await?.response)
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        self.version().await.map(|_| ())
    }
}

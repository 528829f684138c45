//! Ollama LLM Engine
//!
//! Implements `LLMEngine` against a local Ollama server, typically at
//! http://localhost:11434. Prompts are sent raw to `/api/generate` so the
//! speaker cue built by shared memory reaches the model untouched.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{GenerationRequest, LLMEngine, LLMError, Result};

/// Default Ollama endpoint
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Default model tag
pub const DEFAULT_MODEL: &str = "qwen3:4b-instruct-2507-q4_K_M";

/// Ollama engine configuration
#[derive(Debug, Clone)]
pub struct OllamaEngine {
    /// Base URL for Ollama API (typically http://localhost:11434)
    base_url: String,

    /// Model name to use (e.g., "qwen3:4b-instruct-2507-q4_K_M")
    model: String,

    /// Nucleus sampling cutoff
    top_p: f32,

    /// Context window size requested from the server
    num_ctx: u32,

    /// HTTP client for API requests
    client: Client,
}

impl OllamaEngine {
    /// Create a new Ollama engine
    ///
    /// # Arguments
    /// * `base_url` - Base URL for Ollama API (e.g., "http://localhost:11434")
    /// * `model` - Model name to use
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            top_p: 0.9,
            num_ctx: 4096,
            client,
        }
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = top_p;
        self
    }

    pub fn with_num_ctx(mut self, num_ctx: u32) -> Self {
        self.num_ctx = num_ctx;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, request: &GenerationRequest) -> OllamaRequest {
        OllamaRequest {
            model: self.model.clone(),
            prompt: request.prompt.clone(),
            raw: true,
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature,
                repeat_penalty: request.repeat_penalty,
                top_p: self.top_p,
                num_predict: request.max_tokens,
                num_ctx: self.num_ctx,
            },
        }
    }

    fn map_send_error(&self, e: reqwest::Error) -> LLMError {
        if e.is_timeout() {
            LLMError::Timeout
        } else if e.is_connect() {
            LLMError::ProviderUnavailable(format!(
                "Cannot connect to Ollama at {}. Is Ollama running?",
                self.base_url
            ))
        } else {
            LLMError::NetworkError(e.to_string())
        }
    }
}

#[async_trait]
impl LLMEngine for OllamaEngine {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn init(&self) -> Result<()> {
        if self.check_health().await {
            tracing::info!("Ollama reachable at {} (model {})", self.base_url, self.model);
            Ok(())
        } else {
            Err(LLMError::ProviderUnavailable(format!(
                "Cannot connect to Ollama at {}. Is Ollama running?",
                self.base_url
            )))
        }
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        tracing::debug!(
            "Ollama request: model={}, prompt_chars={}, temperature={}, max_tokens={}",
            self.model,
            request.prompt.len(),
            request.temperature,
            request.max_tokens
        );

        let body = self.build_request(request);

        let url = format!("{}/api/generate", self.base_url);
        let start = std::time::Instant::now();
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        tracing::debug!(
            "Ollama response received in {:.1}s",
            start.elapsed().as_secs_f64()
        );

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LLMError::ProviderUnavailable(format!(
                "Ollama API error ({}): {}",
                status, error_text
            )));
        }

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(format!("Failed to parse Ollama response: {}", e)))?;

        Ok(ollama_response.response.trim().to_string())
    }

    async fn check_health(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("Ollama health check failed: {}", e);
                false
            }
        }
    }
}

/// Ollama `/api/generate` request body
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    raw: bool,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    repeat_penalty: f32,
    top_p: f32,
    num_predict: u32,
    num_ctx: u32,
}

/// Ollama `/api/generate` response body
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    #[allow(dead_code)]
    #[serde(default)]
    done: bool,
}

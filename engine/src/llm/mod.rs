//! LLM Engine Abstraction Layer
//!
//! This module provides the common interface for the language model that
//! backs every interviewer. The `LLMEngine` trait is a plain
//! prompt-completion contract: one prompt string in, one completion string
//! out. Engines are assumed to be unsafe for concurrent use; the inference
//! gateway guarantees at most one call is in flight.

use async_trait::async_trait;
use sdk::EngineError;
use serde::{Deserialize, Serialize};

pub mod ollama;
pub mod scripted;

pub use ollama::OllamaEngine;
pub use scripted::ScriptedEngine;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<LLMError> for EngineError {
    fn from(e: LLMError) -> Self {
        match e {
            LLMError::ProviderUnavailable(msg) => EngineError::EngineUnavailable(msg),
            LLMError::NetworkError(msg) => EngineError::Network(msg),
            other => EngineError::LLMEngine(other.to_string()),
        }
    }
}

/// One prompt-completion request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationRequest {
    /// Full prompt text handed to the model
    pub prompt: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Repetition penalty
    pub repeat_penalty: f32,

    /// Maximum number of tokens to generate
    pub max_tokens: u32,
}

impl GenerationRequest {
    /// Create a request with neutral sampling (temperature 0.7, penalty 1.1, 256 tokens)
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: 0.7,
            repeat_penalty: 1.1,
            max_tokens: 256,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_repeat_penalty(mut self, repeat_penalty: f32) -> Self {
        self.repeat_penalty = repeat_penalty;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// LLM engine trait that all backends must implement
#[async_trait]
pub trait LLMEngine: Send + Sync {
    /// Returns the name of the engine (e.g., "ollama", "scripted")
    fn name(&self) -> &str;

    /// Prepare the engine (load the model, verify the server is reachable).
    ///
    /// Default implementation does nothing.
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    /// Generate a completion for the request's prompt.
    ///
    /// The returned text may be empty; callers treat emptiness as failure.
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// Check if the engine is currently healthy and available
    /// Default implementation returns true.
    async fn check_health(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_error_conversion() {
        let err: EngineError = LLMError::ProviderUnavailable("no server".into()).into();
        assert!(matches!(err, EngineError::EngineUnavailable(_)));

        let err: EngineError = LLMError::Timeout.into();
        assert!(matches!(err, EngineError::LLMEngine(msg) if msg == "Timeout"));
    }

    #[test]
    fn test_request_builder() {
        let request = GenerationRequest::new("Hello")
            .with_temperature(0.1)
            .with_repeat_penalty(1.0)
            .with_max_tokens(8);

        assert_eq!(request.prompt, "Hello");
        assert_eq!(request.temperature, 0.1);
        assert_eq!(request.repeat_penalty, 1.0);
        assert_eq!(request.max_tokens, 8);
    }

    #[test]
    fn test_request_serialization() {
        let request = GenerationRequest::new("Tell me about yourself.");
        let json = serde_json::to_string(&request).unwrap();
        let deserialized: GenerationRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(request, deserialized);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(LLMError::Timeout.to_string(), "Timeout");
        assert!(LLMError::ProviderUnavailable("down".into())
            .to_string()
            .contains("down"));
    }
}

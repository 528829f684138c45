//! Error types and handling
//!
//! This module provides the error types used throughout the panel engine.
//! All errors implement the `PanelErrorExt` trait which provides user-friendly
//! hints and indicates whether errors are recoverable.
//!
//! Failures inside an agent's decision or speech pipeline are never surfaced
//! through this type: they are converted to safe defaults where they happen.
//! `EngineError` covers the outer surfaces only (configuration, session
//! setup, engine initialization).

use thiserror::Error;

/// Trait for panel error extensions
///
/// This trait provides additional context for errors, including user-friendly
/// hints and recoverability information. All engine errors implement this trait.
pub trait PanelErrorExt {
    /// Returns a user-friendly hint for the error
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors can be retried or worked around. Non-recoverable
    /// errors typically require a configuration change or a restart.
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// # Error Categories
///
/// - **Configuration**: Invalid or missing configuration
/// - **LLM Engine**: Model load or reachability failures
/// - **Session**: Agent registry problems, use after shutdown
///
/// # Examples
///
/// ```
/// use sdk::errors::{EngineError, PanelErrorExt};
///
/// let error = EngineError::UnknownAgent("Sarah".to_string());
/// println!("Hint: {}", error.user_hint());
/// assert!(error.is_recoverable());
///
/// let fatal_error = EngineError::NoAgents;
/// assert!(!fatal_error.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Path canonicalization failed for {0:?}: {1}")]
    PathCanonicalization(std::path::PathBuf, String),

    // LLM engine errors
    #[error("LLM engine error: {0}")]
    LLMEngine(String),

    #[error("LLM engine unavailable: {0}")]
    EngineUnavailable(String),

    // Session errors
    #[error("No agents registered")]
    NoAgents,

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("Duplicate agent name: {0}")]
    DuplicateAgent(String),

    #[error("Invalid agent profile for {name}: {reason}")]
    InvalidProfile { name: String, reason: String },

    #[error("Session is shut down")]
    SessionClosed,

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PanelErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            // Configuration errors
            Self::Config(_) => "Check your config.toml file for errors",
            Self::PathCanonicalization(_, _) => "Invalid path specified",

            // LLM engine errors
            Self::LLMEngine(_) => "The language model failed. Check the model server logs",
            Self::EngineUnavailable(_) => {
                "Language model not reachable. Is the Ollama server running?"
            }

            // Session errors
            Self::NoAgents => "Add at least one [[agents]] entry to config.toml",
            Self::UnknownAgent(_) => "No interviewer with that name is registered",
            Self::DuplicateAgent(_) => "Interviewer names must be unique",
            Self::InvalidProfile { .. } => "Check the interviewer profile in config.toml",
            Self::SessionClosed => "The interview session has ended. Start a new one",

            // Network errors
            Self::Network(_) => "Network operation failed. Check your connection",

            // Generic IO error
            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            // Non-recoverable errors
            Self::NoAgents
            | Self::DuplicateAgent(_)
            | Self::InvalidProfile { .. }
            | Self::SessionClosed => false,

            // All other errors are potentially recoverable
            _ => true,
        }
    }
}

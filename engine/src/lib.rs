//! Panel Engine Library
//!
//! Turn-taking and dialogue orchestration for a multi-party interview
//! simulator. It is used by both the `panel` binary and integration tests.

/// Configuration management module
pub mod config;

/// Telemetry and Observability
pub mod telemetry;

/// LLM engine abstraction layer
pub mod llm;

/// Serialized access to the shared LLM engine
pub mod gateway;

/// Shared conversation memory
pub mod memory;

/// Speaking-floor arbitration
pub mod arbiter;

/// Response metadata protocol
pub mod metadata;

/// Response cleanup rules
pub mod sanitize;

/// TTS chunking
pub mod speech;

/// Message bus for dialogue events
pub mod message_bus;

/// Interviewer decision and speech pipeline
pub mod agent;

/// Interview session wiring
pub mod session;

/// Logging implementations of the collaborator traits
pub mod collaborators;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;

//! Panel SDK
//!
//! Shared library providing domain types, the error taxonomy, and the
//! collaborator traits used by the dialogue engine and its front ends.

/// Collaborator traits (speech and gesture sinks)
pub mod collaborator;

/// Error types and handling
pub mod errors;

/// Dialogue domain types
pub mod types;

// Re-export commonly used types
pub use collaborator::{GestureOutput, SpeechOutput};
pub use errors::{EngineError, PanelErrorExt};
pub use types::{
    AgentProfile, AttentionState, DialogueTurn, GenerationParams, ResponseMetadata, USER_SPEAKER,
};

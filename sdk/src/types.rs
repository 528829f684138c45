//! Dialogue domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Speaker name used for the human candidate in the shared transcript
pub const USER_SPEAKER: &str = "User";

/// A single turn in the shared conversation.
///
/// Immutable once created. The timestamp is monotonic, measured from the
/// creation (or last clear) of the memory that recorded it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DialogueTurn {
    pub speaker: String,
    pub message: String,
    pub timestamp: Duration,
}

impl DialogueTurn {
    pub fn new(speaker: impl Into<String>, message: impl Into<String>, timestamp: Duration) -> Self {
        Self {
            speaker: speaker.into(),
            message: message.into(),
            timestamp,
        }
    }

    /// Whether this turn was spoken by the human candidate
    pub fn is_user(&self) -> bool {
        self.speaker == USER_SPEAKER
    }
}

impl fmt::Display for DialogueTurn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.speaker, self.message)
    }
}

/// Sampling parameters for one interviewer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GenerationParams {
    /// Sampling temperature for full utterances
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Repeat penalty for full utterances
    #[serde(default = "default_repeat_penalty")]
    pub repeat_penalty: f32,

    /// Token budget for the yes/no decision
    #[serde(default = "default_decision_max_tokens")]
    pub decision_max_tokens: u32,

    /// Token budget for a spoken utterance
    #[serde(default = "default_utterance_max_tokens")]
    pub utterance_max_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            repeat_penalty: default_repeat_penalty(),
            decision_max_tokens: default_decision_max_tokens(),
            utterance_max_tokens: default_utterance_max_tokens(),
        }
    }
}

fn default_temperature() -> f32 {
    0.7
}

fn default_repeat_penalty() -> f32 {
    1.1
}

fn default_decision_max_tokens() -> u32 {
    8
}

fn default_utterance_max_tokens() -> u32 {
    256
}

fn default_true() -> bool {
    true
}

fn default_voice_name() -> String {
    "en_US-lessac-medium".to_string()
}

/// Non-verbal triggers every interviewer understands unless configured otherwise
pub const DEFAULT_TRIGGERS: &[&str] = &[
    "nod",
    "shake_head",
    "lean_forward",
    "lean_back",
    "smile",
    "eye_roll",
    "idle",
];

fn default_triggers() -> Vec<String> {
    DEFAULT_TRIGGERS.iter().map(|t| t.to_string()).collect()
}

/// Static description of one interviewer.
///
/// Loaded once from configuration. The only runtime-mutable part of an
/// interviewer is its voice flag, which the engine tracks separately.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentProfile {
    /// Unique interviewer name, also used as the speaker cue
    pub name: String,

    /// Job title or role on the panel
    pub role: String,

    #[serde(default)]
    pub expertise: String,

    #[serde(default)]
    pub personality: String,

    /// Explicit system prompt; when absent one is composed from the fields above
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    #[serde(flatten)]
    pub params: GenerationParams,

    /// TTS voice identifier handed to the speech collaborator
    #[serde(default = "default_voice_name")]
    pub voice_name: String,

    /// Whether spoken output is voiced at session start
    #[serde(default = "default_true")]
    pub voice_enabled: bool,

    /// Animator triggers the model may request
    #[serde(default = "default_triggers")]
    pub triggers: Vec<String>,
}

impl AgentProfile {
    /// Create a profile with default sampling parameters and triggers
    pub fn new(name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            expertise: String::new(),
            personality: String::new(),
            system_prompt: None,
            params: GenerationParams::default(),
            voice_name: default_voice_name(),
            voice_enabled: true,
            triggers: default_triggers(),
        }
    }

    pub fn with_expertise(mut self, expertise: impl Into<String>) -> Self {
        self.expertise = expertise.into();
        self
    }

    pub fn with_personality(mut self, personality: impl Into<String>) -> Self {
        self.personality = personality.into();
        self
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_voice(mut self, enabled: bool) -> Self {
        self.voice_enabled = enabled;
        self
    }

    /// The system prompt registered with shared memory for this interviewer.
    ///
    /// Returns the configured prompt verbatim if one is set.
    pub fn system_prompt_text(&self) -> String {
        if let Some(prompt) = &self.system_prompt {
            return prompt.clone();
        }

        let mut prompt = String::new();
        prompt.push_str(&format!("You are {}.\n", self.name));
        prompt.push_str(&format!("Role: {}\n", self.role));
        if !self.expertise.is_empty() {
            prompt.push_str(&format!("Expertise: {}\n", self.expertise));
        }
        if !self.personality.is_empty() {
            prompt.push_str(&format!("Personality: {}\n", self.personality));
        }

        prompt.push_str("\n=== YOUR ROLE ===\n");
        prompt.push_str(
            "You are conducting a multi-party job interview alongside other interviewers.\n",
        );
        prompt.push_str("- Ask ONE focused question at a time (under 50 words)\n");
        prompt.push_str("- Stay in character as a professional interviewer\n");
        prompt.push_str("- Evaluate answers based on YOUR expertise\n");
        prompt.push_str("- Don't repeat what your co-interviewer just asked\n");

        prompt.push_str("\n=== INTERNAL METADATA (NOT SPOKEN) ===\n");
        prompt.push_str("Your responses MUST start with metadata, then your spoken words:\n");
        prompt.push_str(
            "Format: [META]{\"animatorTrigger\":\"action\",\"isFocused\":true/false,\"isIgnoring\":false/true}[/META] Your spoken words here.\n",
        );
        if !self.triggers.is_empty() {
            prompt.push_str(&format!(
                "Available non-verbal actions: {}\n",
                self.triggers.join(", ")
            ));
        }
        prompt.push_str(
            "\nIMPORTANT: Only your spoken words after [/META] will be heard. Keep them natural and under 50 words.",
        );

        prompt
    }
}

/// Where an interviewer's attention is directed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AttentionState {
    /// Neutral listening posture
    #[default]
    Idle,

    /// Looking at the speaker attentively
    Focused,

    /// Looking away (weak or off-topic answer)
    Ignoring,
}

impl fmt::Display for AttentionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttentionState::Idle => write!(f, "idle"),
            AttentionState::Focused => write!(f, "focused"),
            AttentionState::Ignoring => write!(f, "ignoring"),
        }
    }
}

/// Non-verbal stage directions extracted from a model response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ResponseMetadata {
    /// Animator trigger name; empty means none requested
    #[serde(rename = "animatorTrigger", default)]
    pub animator_trigger: String,

    #[serde(rename = "isFocused", default)]
    pub is_focused: bool,

    #[serde(rename = "isIgnoring", default)]
    pub is_ignoring: bool,
}

impl ResponseMetadata {
    pub fn new(trigger: impl Into<String>, is_focused: bool, is_ignoring: bool) -> Self {
        Self {
            animator_trigger: trigger.into(),
            is_focused,
            is_ignoring,
        }
    }

    /// Attention classification; focus wins when both flags are set
    pub fn attention(&self) -> AttentionState {
        if self.is_focused {
            AttentionState::Focused
        } else if self.is_ignoring {
            AttentionState::Ignoring
        } else {
            AttentionState::Idle
        }
    }

    /// True when no trigger is requested and attention is neutral
    pub fn is_neutral(&self) -> bool {
        self.animator_trigger.is_empty() && self.attention() == AttentionState::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_display() {
        let turn = DialogueTurn::new("User", "Hello", Duration::from_millis(5));
        assert_eq!(turn.to_string(), "User: Hello");
        assert!(turn.is_user());
    }

    #[test]
    fn test_profile_defaults_from_toml() {
        let profile: AgentProfile = toml::from_str(
            r#"
name = "Sarah"
role = "Engineering Manager"
temperature = 0.5
"#,
        )
        .unwrap();

        assert_eq!(profile.name, "Sarah");
        assert_eq!(profile.params.temperature, 0.5);
        assert_eq!(profile.params.repeat_penalty, 1.1);
        assert_eq!(profile.params.decision_max_tokens, 8);
        assert!(profile.voice_enabled);
        assert_eq!(profile.triggers.len(), DEFAULT_TRIGGERS.len());
    }

    #[test]
    fn test_composed_system_prompt() {
        let profile = AgentProfile::new("Mark", "CTO").with_expertise("distributed systems");
        let prompt = profile.system_prompt_text();

        assert!(prompt.starts_with("You are Mark."));
        assert!(prompt.contains("Expertise: distributed systems"));
        assert!(!prompt.contains("Personality:"));
        assert!(prompt.contains("[META]"));
        assert!(prompt.contains("nod, shake_head"));
    }

    #[test]
    fn test_explicit_system_prompt_wins() {
        let mut profile = AgentProfile::new("Mark", "CTO");
        profile.system_prompt = Some("Be terse.".to_string());
        assert_eq!(profile.system_prompt_text(), "Be terse.");
    }

    #[test]
    fn test_attention_classification() {
        assert_eq!(ResponseMetadata::default().attention(), AttentionState::Idle);
        assert_eq!(
            ResponseMetadata::new("nod", false, true).attention(),
            AttentionState::Ignoring
        );
        assert_eq!(
            ResponseMetadata::new("nod", true, true).attention(),
            AttentionState::Focused
        );
        assert!(ResponseMetadata::default().is_neutral());
        assert!(!ResponseMetadata::new("smile", false, false).is_neutral());
    }
}

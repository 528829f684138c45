//! Interviewer agents
//!
//! Each interviewer reacts to a stimulus with a small pipeline: a random
//! stagger, an isolated yes/no decision, a bid for the speaking floor, and
//! (when granted) one full generation that is cleaned, split into metadata
//! and spoken text, voiced, and appended to shared memory.

pub mod pipeline;
pub mod prompt;

use std::fmt;

use sdk::{ResponseMetadata, USER_SPEAKER};
use serde::{Deserialize, Serialize};

pub use pipeline::{AgentSettings, InterviewerAgent};
pub use prompt::{parse_decision, InterviewPhase};

/// Where an interviewer is in its pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    #[default]
    Idle,
    AwaitingDecision,
    AwaitingTurn,
    Speaking,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentState::Idle => write!(f, "idle"),
            AgentState::AwaitingDecision => write!(f, "awaiting_decision"),
            AgentState::AwaitingTurn => write!(f, "awaiting_turn"),
            AgentState::Speaking => write!(f, "speaking"),
        }
    }
}

/// Something said in the interview that interviewers may react to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stimulus {
    pub speaker: String,
    pub text: String,
    pub phase: InterviewPhase,
}

impl Stimulus {
    /// A finalized candidate utterance
    pub fn from_user(text: impl Into<String>, phase: InterviewPhase) -> Self {
        Self {
            speaker: USER_SPEAKER.to_string(),
            text: text.into(),
            phase,
        }
    }
}

/// How an interviewer's pipeline ended for one stimulus
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AgentOutcome {
    /// Disabled, already speaking, self-authored stimulus, or cancelled
    Skipped,
    /// Decided not to respond
    Declined,
    /// Wanted to respond but another interviewer held the floor
    LostRace,
    Spoke {
        text: String,
        metadata: ResponseMetadata,
        /// True when the generation was unusable and the fallback line was spoken
        used_fallback: bool,
    },
}

impl AgentOutcome {
    pub fn spoke(&self) -> bool {
        matches!(self, AgentOutcome::Spoke { .. })
    }

    /// Spoken text, if this outcome produced any
    pub fn text(&self) -> Option<&str> {
        match self {
            AgentOutcome::Spoke { text, .. } => Some(text),
            _ => None,
        }
    }
}

/// Turn-taking settings, loaded from the `[turns]` config section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TurnConfig {
    /// Grants remembered by the arbiter
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Lower bound of the random delay before deciding
    #[serde(default = "default_stagger_min_ms")]
    pub stagger_min_ms: u64,

    /// Upper bound of the random delay before deciding
    #[serde(default = "default_stagger_max_ms")]
    pub stagger_max_ms: u64,

    #[serde(default = "default_decision_temperature")]
    pub decision_temperature: f32,

    #[serde(default = "default_decision_max_tokens")]
    pub decision_max_tokens: u32,
}

fn default_history_limit() -> usize {
    crate::arbiter::DEFAULT_HISTORY_LIMIT
}

fn default_stagger_min_ms() -> u64 {
    200
}

fn default_stagger_max_ms() -> u64 {
    1200
}

fn default_decision_temperature() -> f32 {
    0.1
}

fn default_decision_max_tokens() -> u32 {
    8
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            stagger_min_ms: default_stagger_min_ms(),
            stagger_max_ms: default_stagger_max_ms(),
            decision_temperature: default_decision_temperature(),
            decision_max_tokens: default_decision_max_tokens(),
        }
    }
}

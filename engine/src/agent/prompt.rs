//! Decision prompts, speech instructions and decision parsing
//!
//! The yes/no decision prompt is deliberately isolated: it carries the
//! interviewer's identity and the literal stimulus, never the shared
//! history, so a speculative decision cannot leak into what the model later
//! sees when generating a real turn.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use sdk::AgentProfile;
use serde::{Deserialize, Serialize};

/// Instruction for the opening turn of an interview
pub const INTRODUCTION_INSTRUCTION: &str =
    "Introduce yourself and welcome the candidate to the interview.";

/// Instruction used once the interview is wrapping up
pub const CONCLUSION_INSTRUCTION: &str =
    "It's time to conclude the interview. Ask a final question or give some closing remarks.";

/// Stage of the interview, which changes how interviewers are prompted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InterviewPhase {
    #[default]
    Introduction,
    Main,
    Conclusion,
}

impl fmt::Display for InterviewPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterviewPhase::Introduction => write!(f, "introduction"),
            InterviewPhase::Main => write!(f, "main"),
            InterviewPhase::Conclusion => write!(f, "conclusion"),
        }
    }
}

/// Short identity line used in decision prompts
fn identity(profile: &AgentProfile) -> String {
    match &profile.system_prompt {
        Some(prompt) => format!("You are {}. {}", profile.name, prompt.trim()),
        None => {
            let mut line = format!("You are {}, {}.", profile.name, profile.role);
            if !profile.expertise.is_empty() {
                line.push_str(&format!(" Your expertise: {}.", profile.expertise));
            }
            line
        }
    }
}

/// The isolated yes/no prompt asking whether to respond to `stimulus`
pub fn decision_prompt(profile: &AgentProfile, phase: InterviewPhase, stimulus: &str) -> String {
    match phase {
        InterviewPhase::Introduction => format!(
            "You are {}. The interview is just starting. The first speaker has just introduced themselves. The candidate said: \"{}\"\nIs it your turn to introduce yourself now? Respond YES or NO.",
            profile.name, stimulus
        ),
        InterviewPhase::Main => format!(
            "{}\n\nCandidate said: \"{}\"\nDo you have a relevant follow-up? YES or NO only.",
            identity(profile),
            stimulus
        ),
        InterviewPhase::Conclusion => format!(
            "You are {}. The interview has reached its conclusion phase. The candidate said: \"{}\"\nShould you be the one to deliver the closing remarks or ask a final question? Respond YES or NO.",
            profile.name, stimulus
        ),
    }
}

/// Instruction placed before the speaker cue when an interviewer responds
pub fn speech_instruction(phase: InterviewPhase, stimulus: &str) -> String {
    match phase {
        InterviewPhase::Introduction => INTRODUCTION_INSTRUCTION.to_string(),
        InterviewPhase::Main => format!("Ask a relevant follow-up question to: {}", stimulus),
        InterviewPhase::Conclusion => CONCLUSION_INSTRUCTION.to_string(),
    }
}

/// Interpret a raw decision completion.
///
/// Only a whole-word `yes` counts. Error markers and output that looks like
/// code or markup are treated as no.
pub fn parse_decision(raw: &str) -> bool {
    let text = raw.trim();
    if text.is_empty() {
        return false;
    }

    if text.contains("[Error") {
        tracing::warn!("Decision output is an error marker: {}", text);
        return false;
    }

    if markup_pattern().is_match(text) {
        tracing::warn!("Decision output looks like code or markup, treating as NO: {}", text);
        return false;
    }

    yes_pattern().is_match(text)
}

static YES_PATTERN: OnceLock<Regex> = OnceLock::new();
static MARKUP_PATTERN: OnceLock<Regex> = OnceLock::new();

fn yes_pattern() -> &'static Regex {
    YES_PATTERN.get_or_init(|| Regex::new(r"(?i)\byes\b").expect("Invalid yes pattern"))
}

/// Code fences, brace pairs, tags and definitions
fn markup_pattern() -> &'static Regex {
    MARKUP_PATTERN.get_or_init(|| {
        Regex::new(r"```|\{[^{}]*\}|</?[A-Za-z][^<>]*>|\b(fn|def|function|class)\s+\w+\s*[({:]|^\s*import\s")
            .expect("Invalid markup pattern")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_decision_whole_word_yes() {
        assert!(parse_decision("YES"));
        assert!(parse_decision("  yes."));
        assert!(parse_decision("Yes, I do."));
        assert!(!parse_decision("NO"));
        assert!(!parse_decision("yesterday I asked"));
        assert!(!parse_decision("eyes"));
        assert!(!parse_decision(""));
    }

    #[test]
    fn test_parse_decision_rejects_errors_and_markup() {
        assert!(!parse_decision("[Error: model not loaded] yes"));
        assert!(!parse_decision("```yes```"));
        assert!(!parse_decision("{\"answer\": \"yes\"}"));
        assert!(!parse_decision("<yes/>"));
        assert!(!parse_decision("fn yes() {}"));
        assert!(!parse_decision("def yes(): pass"));
    }

    #[test]
    fn test_parse_decision_accepts_plain_punctuation() {
        assert!(parse_decision("Yes; I have a follow-up"));
        assert!(parse_decision("Yes - about the class design."));
        assert!(parse_decision("yes (briefly)"));
        assert!(parse_decision("Yes, 2 < 3 so I should ask."));
    }

    #[test]
    fn test_main_decision_prompt_is_isolated() {
        let profile = AgentProfile::new("Sarah", "Engineering Manager");
        let prompt = decision_prompt(&profile, InterviewPhase::Main, "I like Rust.");

        assert_eq!(
            prompt,
            "You are Sarah, Engineering Manager.\n\nCandidate said: \"I like Rust.\"\nDo you have a relevant follow-up? YES or NO only."
        );
    }

    #[test]
    fn test_explicit_system_prompt_in_decision() {
        let mut profile = AgentProfile::new("Mark", "CTO");
        profile.system_prompt = Some("You care about scale.".into());
        let prompt = decision_prompt(&profile, InterviewPhase::Main, "hi");
        assert!(prompt.starts_with("You are Mark. You care about scale.\n\n"));
    }

    #[test]
    fn test_phase_wording() {
        let profile = AgentProfile::new("Mark", "CTO");
        assert!(decision_prompt(&profile, InterviewPhase::Introduction, "hi")
            .contains("introduce yourself"));
        assert!(decision_prompt(&profile, InterviewPhase::Conclusion, "hi")
            .contains("closing remarks"));

        assert_eq!(
            speech_instruction(InterviewPhase::Main, "I led a migration."),
            "Ask a relevant follow-up question to: I led a migration."
        );
        assert_eq!(
            speech_instruction(InterviewPhase::Conclusion, "x"),
            CONCLUSION_INSTRUCTION
        );
    }

    #[test]
    fn test_phase_serialization() {
        assert_eq!(
            serde_json::to_string(&InterviewPhase::Conclusion).unwrap(),
            "\"conclusion\""
        );
        assert_eq!(InterviewPhase::default(), InterviewPhase::Introduction);
    }
}

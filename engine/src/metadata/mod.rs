//! Response Metadata Protocol
//!
//! Model responses may open with a `[META]{...}[/META]` block carrying
//! non-verbal stage directions. This module separates that block from the
//! words to be spoken. The block's body is read as a JSON object when it is
//! valid JSON and by scanning for known keys when it is not; models often
//! emit almost-JSON.

use std::sync::OnceLock;

use regex::Regex;
use sdk::ResponseMetadata;
use serde_json::Value;

pub const META_OPEN: &str = "[META]";
pub const META_CLOSE: &str = "[/META]";

const TRIGGER_KEY: &str = "animatorTrigger";
const FOCUSED_KEY: &str = "isFocused";
const IGNORING_KEY: &str = "isIgnoring";

/// A model response split into stage directions and spoken text
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedResponse {
    pub metadata: ResponseMetadata,

    /// Words to speak and show, whitespace-normalized
    pub display_text: String,

    /// Whether a well-formed metadata block was found
    pub had_block: bool,
}

/// Split a response into metadata and display text.
///
/// Without an opening tag followed by a closing tag, the metadata is the
/// default and the whole response is display text.
pub fn parse_response(text: &str) -> ParsedResponse {
    let open = text.find(META_OPEN);
    let close = text.find(META_CLOSE);

    let (open, close) = match (open, close) {
        (Some(open), Some(close)) if open < close => (open, close),
        _ => {
            return ParsedResponse {
                metadata: ResponseMetadata::default(),
                display_text: normalize_whitespace(text),
                had_block: false,
            }
        }
    };

    let inner = &text[open + META_OPEN.len()..close];
    let before = &text[..open];
    let after = &text[close + META_CLOSE.len()..];

    ParsedResponse {
        metadata: parse_metadata_body(inner),
        display_text: normalize_whitespace(&format!("{} {}", before, after)),
        had_block: true,
    }
}

/// Read the body of a metadata block.
///
/// Unknown keys are ignored and missing keys keep their defaults.
pub fn parse_metadata_body(body: &str) -> ResponseMetadata {
    let body = body.trim();
    if body.is_empty() {
        return ResponseMetadata::default();
    }

    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => {
            let lookup = |key: &str| {
                map.iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(key))
                    .map(|(_, v)| v)
            };
            ResponseMetadata {
                animator_trigger: lookup(TRIGGER_KEY)
                    .and_then(Value::as_str)
                    .map(|s| s.trim().to_string())
                    .unwrap_or_default(),
                is_focused: lookup(FOCUSED_KEY).map(value_is_true).unwrap_or(false),
                is_ignoring: lookup(IGNORING_KEY).map(value_is_true).unwrap_or(false),
            }
        }
        _ => {
            tracing::debug!("Metadata body is not a JSON object, scanning keys: {}", body);
            scan_metadata(body)
        }
    }
}

fn value_is_true(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn scan_metadata(body: &str) -> ResponseMetadata {
    let patterns = scan_patterns();
    ResponseMetadata {
        animator_trigger: patterns
            .trigger
            .captures(body)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default(),
        is_focused: scan_bool(&patterns.focused, body),
        is_ignoring: scan_bool(&patterns.ignoring, body),
    }
}

/// Lenient `key: value` matchers for almost-JSON metadata bodies
struct ScanPatterns {
    trigger: Regex,
    focused: Regex,
    ignoring: Regex,
}

static SCAN_PATTERNS: OnceLock<ScanPatterns> = OnceLock::new();

fn scan_patterns() -> &'static ScanPatterns {
    SCAN_PATTERNS.get_or_init(|| ScanPatterns {
        trigger: Regex::new(&key_pattern(TRIGGER_KEY, r#"["']?([A-Za-z0-9_\-]*)"#))
            .expect("Invalid trigger pattern"),
        focused: Regex::new(&key_pattern(FOCUSED_KEY, BOOL_VALUE)).expect("Invalid focus pattern"),
        ignoring: Regex::new(&key_pattern(IGNORING_KEY, BOOL_VALUE))
            .expect("Invalid ignoring pattern"),
    })
}

const BOOL_VALUE: &str = r#"["']?(true|false)"#;

fn key_pattern(key: &str, value: &str) -> String {
    format!(r#"(?i)["']?{}["']?\s*[:=]\s*{}"#, regex::escape(key), value)
}

fn scan_bool(pattern: &Regex, body: &str) -> bool {
    pattern
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Drop a leading `Agent:` echo of the interviewer's own speaker cue
pub fn strip_speaker_prefix(text: &str, agent: &str) -> String {
    let trimmed = text.trim_start();
    let Some(head) = trimmed.get(..agent.len()) else {
        return text.trim().to_string();
    };

    if !agent.is_empty() && head.eq_ignore_ascii_case(agent) {
        let rest = trimmed[agent.len()..].trim_start();
        if let Some(rest) = rest.strip_prefix(':') {
            return rest.trim().to_string();
        }
    }
    text.trim().to_string()
}

/// Collapse runs of whitespace to single spaces and trim
pub fn normalize_whitespace(text: &str) -> String {
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    WHITESPACE
        .get_or_init(|| Regex::new(r"\s+").expect("Invalid whitespace pattern"))
        .replace_all(text.trim(), " ")
        .into_owned()
}

/// Animator triggers an interviewer is allowed to fire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerSet {
    triggers: Vec<String>,
}

impl TriggerSet {
    pub fn new(triggers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            triggers: triggers.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, trigger: &str) -> bool {
        self.triggers.iter().any(|t| t == trigger)
    }

    /// Keep a requested trigger only if it is whitelisted
    pub fn filter<'a>(&self, trigger: &'a str) -> Option<&'a str> {
        if trigger.is_empty() {
            return None;
        }
        if self.contains(trigger) {
            Some(trigger)
        } else {
            tracing::warn!("Animator trigger '{}' not in available triggers list", trigger);
            None
        }
    }

    /// Comma-separated list for prompts, or `none`
    pub fn prompt_list(&self) -> String {
        if self.triggers.is_empty() {
            "none".to_string()
        } else {
            self.triggers.join(", ")
        }
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }
}

impl Default for TriggerSet {
    fn default() -> Self {
        Self::new(sdk::types::DEFAULT_TRIGGERS.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdk::AttentionState;

    #[test]
    fn test_block_is_extracted() {
        let parsed = parse_response(
            "[META]{\"animatorTrigger\":\"nod\",\"isFocused\":true,\"isIgnoring\":false}[/META] Tell me more.",
        );

        assert!(parsed.had_block);
        assert_eq!(parsed.display_text, "Tell me more.");
        assert_eq!(parsed.metadata, ResponseMetadata::new("nod", true, false));
        assert_eq!(parsed.metadata.attention(), AttentionState::Focused);
    }

    #[test]
    fn test_missing_block_keeps_text() {
        let parsed = parse_response("  Plain   answer.\n");
        assert!(!parsed.had_block);
        assert_eq!(parsed.display_text, "Plain answer.");
        assert_eq!(parsed.metadata, ResponseMetadata::default());
    }

    #[test]
    fn test_reversed_tags_are_not_a_block() {
        let text = "Hello [/META]{\"isFocused\":true}[META] there";
        let parsed = parse_response(text);
        assert!(!parsed.had_block);
        assert_eq!(parsed.metadata, ResponseMetadata::default());
        assert_eq!(parsed.display_text, normalize_whitespace(text));
    }

    #[test]
    fn test_text_before_and_after_block_is_joined() {
        let parsed = parse_response("Well, [META]{\"animatorTrigger\":\"smile\"}[/META]that is neat.");
        assert_eq!(parsed.display_text, "Well, that is neat.");
        assert_eq!(parsed.metadata.animator_trigger, "smile");
    }

    #[test]
    fn test_lenient_scan_on_malformed_json() {
        let parsed = parse_response(
            "[META]{animatorTrigger: 'shake_head', isFocused: false, \"isIgnoring\": true,}[/META] Hmm.",
        );
        assert_eq!(parsed.metadata.animator_trigger, "shake_head");
        assert!(!parsed.metadata.is_focused);
        assert!(parsed.metadata.is_ignoring);
        assert_eq!(parsed.metadata.attention(), AttentionState::Ignoring);
    }

    #[test]
    fn test_unknown_keys_ignored_and_case_insensitive() {
        let metadata =
            parse_metadata_body(r#"{"AnimatorTrigger":"nod","mood":"happy","isfocused":"true"}"#);
        assert_eq!(metadata, ResponseMetadata::new("nod", true, false));
    }

    #[test]
    fn test_empty_block_is_default() {
        let parsed = parse_response("[META][/META] Okay.");
        assert!(parsed.had_block);
        assert_eq!(parsed.metadata, ResponseMetadata::default());
        assert_eq!(parsed.display_text, "Okay.");
    }

    #[test]
    fn test_strip_speaker_prefix() {
        assert_eq!(strip_speaker_prefix("Sarah: Hello.", "Sarah"), "Hello.");
        assert_eq!(strip_speaker_prefix("  sarah : Hello.", "Sarah"), "Hello.");
        assert_eq!(strip_speaker_prefix("Mark: Hello.", "Sarah"), "Mark: Hello.");
        assert_eq!(strip_speaker_prefix("Sarahs are great", "Sarah"), "Sarahs are great");
        assert_eq!(strip_speaker_prefix("Hi", "Sarah"), "Hi");
    }

    #[test]
    fn test_trigger_set_filters_unknown() {
        let triggers = TriggerSet::default();
        assert_eq!(triggers.filter("nod"), Some("nod"));
        assert_eq!(triggers.filter("backflip"), None);
        assert_eq!(triggers.filter(""), None);
        assert!(triggers.prompt_list().starts_with("nod, shake_head"));
        assert_eq!(TriggerSet::new(Vec::<String>::new()).prompt_list(), "none");
    }
}

//! Response cleanup rules
//!
//! Small local models leak chat-template tokens, echo their instructions
//! and repeat their own speaker cue. Cleanup is an ordered list of named
//! rewrite rules applied one after another, so each rule can be tested and
//! reasoned about on its own.

use regex::Regex;

/// One named regex rewrite
#[derive(Debug, Clone)]
pub struct RewriteRule {
    name: String,
    regex: Regex,
    replacement: String,
}

impl RewriteRule {
    pub fn new(
        name: impl Into<String>,
        pattern: &str,
        replacement: impl Into<String>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            regex: Regex::new(pattern)?,
            replacement: replacement.into(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn apply(&self, text: &str) -> String {
        self.regex
            .replace_all(text, self.replacement.as_str())
            .into_owned()
    }
}

const CHAT_TEMPLATE_TOKENS: &str = r"<\|[A-Za-z0-9_]+\|>|</?s>|\[/?INST\]";

const LEAKED_INSTRUCTIONS: &str = r"(?im)^[ \t]*===.*===[ \t]*$|^[ \t]*Candidate said:.*$|^[ \t]*Format:[ \t]*\[META\].*$|Do you have a relevant follow-up\??|YES or NO only\.?";

const YES_NO_ECHO_LINES: &str = r"(?im)^[ \t]*(yes|no)[.!]?[ \t]*$";

const COLLAPSE_WHITESPACE: &str = r"\s+";

/// Ordered rule list applied to raw model output
#[derive(Debug, Clone)]
pub struct ResponseCleaner {
    rules: Vec<RewriteRule>,
}

impl ResponseCleaner {
    /// Cleaner with an explicit rule list, applied in order
    pub fn with_rules(rules: Vec<RewriteRule>) -> Self {
        Self { rules }
    }

    /// The standard rules:
    /// `chat_template_tokens`, `leaked_instructions`, `yes_no_echo_lines`.
    pub fn standard() -> Self {
        Self::compile(&[
            ("chat_template_tokens", CHAT_TEMPLATE_TOKENS, ""),
            ("leaked_instructions", LEAKED_INSTRUCTIONS, ""),
            ("yes_no_echo_lines", YES_NO_ECHO_LINES, ""),
        ])
    }

    /// The standard rules followed by `speaker_echo_prefix` for `agent` and
    /// `collapse_whitespace`
    pub fn for_agent(agent: &str) -> Self {
        let mut cleaner = Self::standard();
        cleaner.rules.extend(speaker_echo_rule(agent));
        cleaner
            .rules
            .extend(Self::compile(&[("collapse_whitespace", COLLAPSE_WHITESPACE, " ")]).rules);
        cleaner
    }

    fn compile(specs: &[(&str, &str, &str)]) -> Self {
        let rules = specs
            .iter()
            .filter_map(|(name, pattern, replacement)| {
                match RewriteRule::new(*name, pattern, *replacement) {
                    Ok(rule) => Some(rule),
                    Err(e) => {
                        tracing::error!("Invalid cleanup rule {}: {}", name, e);
                        None
                    }
                }
            })
            .collect();

        Self { rules }
    }

    pub fn rules(&self) -> &[RewriteRule] {
        &self.rules
    }

    /// Look up a rule by name
    pub fn rule(&self, name: &str) -> Option<&RewriteRule> {
        self.rules.iter().find(|r| r.name == name)
    }

    /// Apply every rule in order and trim
    pub fn clean(&self, raw: &str) -> String {
        let text = self
            .rules
            .iter()
            .fold(raw.to_string(), |text, rule| rule.apply(&text));

        let text = text.trim().to_string();
        if text.len() != raw.trim().len() {
            tracing::debug!("Cleaned response: {:?} -> {:?}", raw, text);
        }
        text
    }
}

impl Default for ResponseCleaner {
    fn default() -> Self {
        Self::standard()
    }
}

/// Rule removing a leading `Agent:` echo
pub fn speaker_echo_rule(agent: &str) -> Option<RewriteRule> {
    if agent.trim().is_empty() {
        return None;
    }
    let pattern = format!(r"(?i)\A\s*{}\s*:\s*", regex::escape(agent.trim()));
    RewriteRule::new("speaker_echo_prefix", &pattern, "").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(rule: &str, text: &str) -> String {
        ResponseCleaner::standard()
            .rule(rule)
            .expect("rule exists")
            .apply(text)
    }

    #[test]
    fn test_standard_rule_order() {
        let names: Vec<_> = ResponseCleaner::standard()
            .rules()
            .iter()
            .map(|r| r.name().to_string())
            .collect();
        assert_eq!(
            names,
            vec!["chat_template_tokens", "leaked_instructions", "yes_no_echo_lines"]
        );
    }

    #[test]
    fn test_chat_template_tokens() {
        assert_eq!(
            apply("chat_template_tokens", "<|assistant|>Hello<|eot_id|></s>"),
            "Hello"
        );
        assert_eq!(apply("chat_template_tokens", "[INST]Hi[/INST]"), "Hi");
        assert_eq!(apply("chat_template_tokens", "a | b"), "a | b");
    }

    #[test]
    fn test_leaked_instructions() {
        let text = "=== YOUR ROLE ===\nCandidate said: \"hi\"\nWhat drew you to Rust?\nYES or NO only.";
        let cleaned = apply("leaked_instructions", text);
        assert!(!cleaned.contains("YOUR ROLE"));
        assert!(!cleaned.contains("Candidate said"));
        assert!(!cleaned.contains("YES or NO"));
        assert!(cleaned.contains("What drew you to Rust?"));

        let format_line = apply(
            "leaked_instructions",
            "Format: [META]{...}[/META] Your words\n[META]{}[/META] Hi",
        );
        assert_eq!(format_line, "\n[META]{}[/META] Hi");
    }

    #[test]
    fn test_yes_no_echo_lines() {
        assert_eq!(
            apply("yes_no_echo_lines", "YES\nWhy did you choose that design?"),
            "\nWhy did you choose that design?"
        );
        assert_eq!(
            apply("yes_no_echo_lines", "No problem, go ahead."),
            "No problem, go ahead."
        );
    }

    #[test]
    fn test_speaker_echo_prefix() {
        let rule = speaker_echo_rule("Sarah").unwrap();
        assert_eq!(rule.apply("Sarah: Good answer."), "Good answer.");
        assert_eq!(rule.apply("  SARAH :Good answer."), "Good answer.");
        assert_eq!(rule.apply("Mark: Good answer."), "Mark: Good answer.");
        assert_eq!(rule.apply("Good answer. Sarah: no"), "Good answer. Sarah: no");
        assert!(speaker_echo_rule("  ").is_none());
    }

    #[test]
    fn test_collapse_whitespace() {
        let rule = RewriteRule::new("collapse_whitespace", COLLAPSE_WHITESPACE, " ").unwrap();
        assert_eq!(rule.apply("a \n\n b\t c"), "a b c");
    }

    #[test]
    fn test_clean_full_pipeline() {
        let cleaner = ResponseCleaner::for_agent("Sarah");
        let raw = "<|assistant|>Sarah: [META]{\"animatorTrigger\":\"nod\"}[/META]  Great.\n\nHow did you test it?<|eot_id|>";

        assert_eq!(
            cleaner.clean(raw),
            "[META]{\"animatorTrigger\":\"nod\"}[/META] Great. How did you test it?"
        );
    }

    #[test]
    fn test_clean_can_empty_the_response() {
        let cleaner = ResponseCleaner::for_agent("Mark");
        assert_eq!(cleaner.clean("<|eot_id|>\nYES\n"), "");
    }

    #[test]
    fn test_agent_rules_follow_standard_rules() {
        let names: Vec<_> = ResponseCleaner::for_agent("Sarah")
            .rules()
            .iter()
            .map(|r| r.name().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "chat_template_tokens",
                "leaked_instructions",
                "yes_no_echo_lines",
                "speaker_echo_prefix",
                "collapse_whitespace"
            ]
        );

        let blank = ResponseCleaner::for_agent(" ");
        assert!(blank.rule("speaker_echo_prefix").is_none());
        assert_eq!(blank.clean("a \n b"), "a b");
    }
}

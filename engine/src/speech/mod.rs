//! TTS chunking
//!
//! Display text is handed to the speech collaborator in sentence-sized
//! chunks so synthesis can start before the whole reply is voiced. A chunk
//! ends after `.`, `!` or `?`, or after a comma once the chunk is already
//! long enough to be worth sending.

use serde::{Deserialize, Serialize};

/// Default length after which a comma also ends a chunk
pub const DEFAULT_COMMA_THRESHOLD: usize = 60;

/// Line spoken when a granted turn produced nothing usable
pub const DEFAULT_FALLBACK_LINE: &str =
    "That's interesting. Could you tell me a bit more about that?";

/// Speech settings, loaded from the `[speech]` config section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpeechConfig {
    /// Master switch for TTS across all interviewers
    #[serde(default = "default_global_voice_enabled")]
    pub global_voice_enabled: bool,

    #[serde(default = "default_fallback_line")]
    pub fallback_line: String,

    #[serde(default = "default_comma_threshold")]
    pub comma_threshold: usize,
}

fn default_global_voice_enabled() -> bool {
    true
}

fn default_fallback_line() -> String {
    DEFAULT_FALLBACK_LINE.to_string()
}

fn default_comma_threshold() -> usize {
    DEFAULT_COMMA_THRESHOLD
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            global_voice_enabled: default_global_voice_enabled(),
            fallback_line: default_fallback_line(),
            comma_threshold: default_comma_threshold(),
        }
    }
}

/// Incremental sentence splitter for TTS
#[derive(Debug, Clone)]
pub struct SentenceChunker {
    buffer: String,
    comma_threshold: usize,
}

impl SentenceChunker {
    pub fn new() -> Self {
        Self::with_comma_threshold(DEFAULT_COMMA_THRESHOLD)
    }

    pub fn with_comma_threshold(comma_threshold: usize) -> Self {
        Self {
            buffer: String::new(),
            comma_threshold,
        }
    }

    /// Feed more text, returning every chunk completed by it
    pub fn push(&mut self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();

        for ch in text.chars() {
            self.buffer.push(ch);

            let sentence_end = matches!(ch, '.' | '!' | '?');
            let long_clause = ch == ',' && self.buffer.chars().count() > self.comma_threshold;

            if sentence_end || long_clause {
                if let Some(chunk) = self.take() {
                    chunks.push(chunk);
                }
            }
        }

        chunks
    }

    /// Return whatever is left in the buffer
    pub fn flush(&mut self) -> Option<String> {
        self.take()
    }

    /// Split a complete text in one go
    pub fn split(text: &str) -> Vec<String> {
        Self::new().split_all(text)
    }

    /// Feed a complete text and flush
    pub fn split_all(mut self, text: &str) -> Vec<String> {
        let mut chunks = self.push(text);
        chunks.extend(self.flush());
        chunks
    }

    fn take(&mut self) -> Option<String> {
        let chunk = self.buffer.trim().to_string();
        self.buffer.clear();
        if chunk.is_empty() {
            None
        } else {
            Some(chunk)
        }
    }
}

impl Default for SentenceChunker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splits_on_sentence_punctuation() {
        assert_eq!(
            SentenceChunker::split("Hello there. How are you? Great!"),
            vec!["Hello there.", "How are you?", "Great!"]
        );
    }

    #[test]
    fn test_short_comma_clause_is_not_split() {
        assert_eq!(
            SentenceChunker::split("Well, that is fine."),
            vec!["Well, that is fine."]
        );
    }

    #[test]
    fn test_long_clause_splits_on_comma() {
        let text = "When you designed the caching layer for the payments service last year, what failed first?";
        let chunks = SentenceChunker::split(text);

        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].ends_with("last year,"));
        assert_eq!(chunks[1], "what failed first?");
    }

    #[test]
    fn test_remainder_is_flushed() {
        let mut chunker = SentenceChunker::new();
        assert_eq!(chunker.push("First. Second without end"), vec!["First."]);
        assert_eq!(chunker.flush().as_deref(), Some("Second without end"));
        assert_eq!(chunker.flush(), None);
    }

    #[test]
    fn test_incremental_feeding() {
        let mut chunker = SentenceChunker::new();
        assert!(chunker.push("Tell me ").is_empty());
        assert_eq!(chunker.push("more. And"), vec!["Tell me more."]);
        assert_eq!(chunker.flush().as_deref(), Some("And"));
    }

    #[test]
    fn test_custom_threshold() {
        let chunks = SentenceChunker::with_comma_threshold(5).split_all("First part, second part");
        assert_eq!(chunks, vec!["First part,", "second part"]);
    }

    #[test]
    fn test_speech_config_defaults() {
        let config: SpeechConfig = toml::from_str("global_voice_enabled = false").unwrap();
        assert!(!config.global_voice_enabled);
        assert_eq!(config.fallback_line, DEFAULT_FALLBACK_LINE);
        assert_eq!(config.comma_threshold, DEFAULT_COMMA_THRESHOLD);
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        assert!(SentenceChunker::split("   ").is_empty());
    }
}

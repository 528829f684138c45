//! Long-form conversation transcript
//!
//! Every turn is appended as a `speaker: message` line. When the body grows
//! past its character budget the oldest half is dropped, cut at a line
//! boundary so no line is ever truncated mid-way. The preamble sits outside
//! the budget and is never trimmed.

/// Default character budget for the transcript body
pub const DEFAULT_CHAR_BUDGET: usize = 8000;

#[derive(Debug, Clone)]
pub struct Transcript {
    preamble: String,
    body: String,
    char_budget: usize,
}

impl Transcript {
    pub fn new() -> Self {
        Self::with_budget(DEFAULT_CHAR_BUDGET)
    }

    pub fn with_budget(char_budget: usize) -> Self {
        Self {
            preamble: String::new(),
            body: String::new(),
            char_budget,
        }
    }

    /// Text kept ahead of the conversation body
    pub fn set_preamble(&mut self, preamble: impl Into<String>) {
        self.preamble = preamble.into();
    }

    pub fn preamble(&self) -> &str {
        &self.preamble
    }

    /// Append one line and trim if the body is over budget
    pub fn append(&mut self, speaker: &str, message: &str) {
        self.body.push_str(speaker);
        self.body.push_str(": ");
        self.body.push_str(message);
        self.body.push('\n');

        if self.body.len() > self.char_budget {
            self.trim_oldest_half();
        }
    }

    /// Preamble followed by the retained body
    pub fn full_text(&self) -> String {
        if self.preamble.is_empty() {
            self.body.clone()
        } else {
            format!("{}\n\n{}", self.preamble, self.body)
        }
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    pub fn char_budget(&self) -> usize {
        self.char_budget
    }

    /// Clear the body, keeping the preamble
    pub fn clear(&mut self) {
        self.body.clear();
    }

    fn trim_oldest_half(&mut self) {
        let mut half = self.body.len() / 2;
        while !self.body.is_char_boundary(half) {
            half += 1;
        }

        // First line boundary at or after the midpoint
        let cut = match self.body[half..].find('\n') {
            Some(offset) => half + offset + 1,
            None => self.body.len(),
        };

        let cut = if cut >= self.body.len() {
            // A single oversized trailing line is kept whole
            self.body[..self.body.len() - 1]
                .rfind('\n')
                .map(|i| i + 1)
                .unwrap_or(0)
        } else {
            cut
        };

        tracing::debug!(
            "Transcript over budget ({} > {}), dropping {} chars",
            self.body.len(),
            self.char_budget,
            cut
        );
        self.body.drain(..cut);
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

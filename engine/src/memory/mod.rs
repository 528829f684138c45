//! Shared Conversation Memory
//!
//! One memory instance per session, shared by every interviewer through an
//! `Arc`. It holds the registered system prompts, a bounded ring of recent
//! turns, a long-form transcript under a character budget, and small
//! per-interviewer fact stores. Interviewers never keep private copies of
//! the conversation: the prompt each one generates from is built here.

pub mod transcript;

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use sdk::DialogueTurn;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

pub use transcript::Transcript;

/// Memory sizing, loaded from the `[memory]` config section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryConfig {
    /// Turns kept in the short-term ring
    #[serde(default = "default_short_term_capacity")]
    pub short_term_capacity: usize,

    /// Turns of history included in each generation prompt
    #[serde(default = "default_context_turns")]
    pub context_turns: usize,

    /// Character budget of the long-form transcript
    #[serde(default = "default_char_budget")]
    pub char_budget: usize,

    /// Facts kept per interviewer
    #[serde(default = "default_fact_capacity")]
    pub fact_capacity: usize,
}

fn default_short_term_capacity() -> usize {
    10
}

fn default_context_turns() -> usize {
    6
}

fn default_char_budget() -> usize {
    transcript::DEFAULT_CHAR_BUDGET
}

fn default_fact_capacity() -> usize {
    20
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            short_term_capacity: default_short_term_capacity(),
            context_turns: default_context_turns(),
            char_budget: default_char_budget(),
            fact_capacity: default_fact_capacity(),
        }
    }
}

struct MemoryState {
    prompts: HashMap<String, String>,
    turns: VecDeque<DialogueTurn>,
    transcript: Transcript,
    facts: HashMap<String, VecDeque<String>>,
    origin: Instant,
}

/// Conversation memory shared by all interviewers of a session
pub struct SharedMemory {
    config: MemoryConfig,
    state: Mutex<MemoryState>,
}

impl SharedMemory {
    pub fn new(config: MemoryConfig) -> Self {
        let state = MemoryState {
            prompts: HashMap::new(),
            turns: VecDeque::with_capacity(config.short_term_capacity),
            transcript: Transcript::with_budget(config.char_budget),
            facts: HashMap::new(),
            origin: Instant::now(),
        };

        Self {
            config,
            state: Mutex::new(state),
        }
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Register or replace an interviewer's system prompt
    pub async fn register_agent_prompt(&self, agent: &str, prompt: impl Into<String>) {
        let mut state = self.state.lock().await;
        state.prompts.insert(agent.to_string(), prompt.into());
    }

    pub async fn agent_prompt(&self, agent: &str) -> Option<String> {
        self.state.lock().await.prompts.get(agent).cloned()
    }

    /// Session-wide text kept at the head of the long-form transcript
    pub async fn set_preamble(&self, preamble: impl Into<String>) {
        self.state.lock().await.transcript.set_preamble(preamble);
    }

    /// Append a turn to the shared log.
    ///
    /// The ring evicts its oldest turn once full; the transcript keeps
    /// every turn within its character budget.
    pub async fn add_turn(&self, speaker: &str, message: &str) -> DialogueTurn {
        let mut state = self.state.lock().await;
        let turn = DialogueTurn::new(speaker, message, state.origin.elapsed());

        if self.config.short_term_capacity > 0 {
            while state.turns.len() >= self.config.short_term_capacity {
                state.turns.pop_front();
            }
            state.turns.push_back(turn.clone());
        }
        state.transcript.append(speaker, message);

        tracing::debug!("Memory: {} ({} turns held)", turn, state.turns.len());
        turn
    }

    /// The last `n` turns, oldest first
    pub async fn recent_turns(&self, n: usize) -> Vec<DialogueTurn> {
        let state = self.state.lock().await;
        let skip = state.turns.len().saturating_sub(n);
        state.turns.iter().skip(skip).cloned().collect()
    }

    /// The last `n` turns as `speaker: message` lines, newest last
    pub async fn recent_context(&self, n: usize) -> String {
        format_turns(&self.recent_turns(n).await)
    }

    pub async fn last_turn(&self) -> Option<DialogueTurn> {
        self.state.lock().await.turns.back().cloned()
    }

    /// Remember a fact for one interviewer.
    ///
    /// Empty and duplicate facts are ignored. Once the store is full the
    /// oldest fact is forgotten.
    pub async fn add_fact(&self, agent: &str, fact: &str) {
        let fact = fact.trim();
        if fact.is_empty() || self.config.fact_capacity == 0 {
            return;
        }

        let mut state = self.state.lock().await;
        let facts = state.facts.entry(agent.to_string()).or_default();
        if facts.iter().any(|f| f == fact) {
            return;
        }
        if facts.len() >= self.config.fact_capacity {
            facts.pop_front();
        }
        facts.push_back(fact.to_string());
    }

    pub async fn fact_count(&self, agent: &str) -> usize {
        self.state
            .lock()
            .await
            .facts
            .get(agent)
            .map(|f| f.len())
            .unwrap_or(0)
    }

    pub async fn facts(&self, agent: &str) -> Vec<String> {
        self.state
            .lock()
            .await
            .facts
            .get(agent)
            .map(|f| f.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Full generation prompt for an interviewer, ending on its open speaker cue
    pub async fn build_prompt(&self, agent: &str, context_turns: usize) -> String {
        self.build_prompt_with(agent, context_turns, None).await
    }

    /// Like `build_prompt`, with an instruction line placed before the cue
    pub async fn build_prompt_with(
        &self,
        agent: &str,
        context_turns: usize,
        instruction: Option<&str>,
    ) -> String {
        let state = self.state.lock().await;

        let mut prompt = String::new();
        match state.prompts.get(agent) {
            Some(system) => {
                prompt.push_str(system);
                prompt.push_str("\n\n");
            }
            None => tracing::warn!("No system prompt registered for {}", agent),
        }

        let skip = state.turns.len().saturating_sub(context_turns);
        let recent: Vec<DialogueTurn> = state.turns.iter().skip(skip).cloned().collect();
        if !recent.is_empty() {
            prompt.push_str("Recent conversation:\n");
            prompt.push_str(&format_turns(&recent));
            prompt.push_str("\n\n");
        }

        if let Some(facts) = state.facts.get(agent).filter(|f| !f.is_empty()) {
            prompt.push_str("Things you remember:\n");
            for fact in facts {
                prompt.push_str("- ");
                prompt.push_str(fact);
                prompt.push('\n');
            }
            prompt.push('\n');
        }

        if let Some(instruction) = instruction.filter(|i| !i.trim().is_empty()) {
            prompt.push_str(instruction.trim());
            prompt.push('\n');
        }

        prompt.push_str(agent);
        prompt.push_str(": ");
        prompt
    }

    /// Preamble plus every retained transcript line
    pub async fn full_conversation(&self) -> String {
        self.state.lock().await.transcript.full_text()
    }

    /// Number of turns in the short-term ring
    pub async fn len(&self) -> usize {
        self.state.lock().await.turns.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.turns.is_empty()
    }

    /// Forget the conversation and facts; registered prompts are kept
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.turns.clear();
        state.transcript.clear();
        state.facts.clear();
        state.origin = Instant::now();
        tracing::info!("Shared memory cleared");
    }
}

impl Default for SharedMemory {
    fn default() -> Self {
        Self::new(MemoryConfig::default())
    }
}

fn format_turns(turns: &[DialogueTurn]) -> String {
    turns
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_with_capacity(capacity: usize) -> SharedMemory {
        SharedMemory::new(MemoryConfig {
            short_term_capacity: capacity,
            ..MemoryConfig::default()
        })
    }

    #[tokio::test]
    async fn test_ring_keeps_most_recent_turns_in_order() {
        let memory = memory_with_capacity(3);
        for speaker in ["A", "B", "C", "D"] {
            memory.add_turn(speaker, "x").await;
        }

        let recent = memory.recent_turns(2).await;
        assert_eq!(recent[0].speaker, "C");
        assert_eq!(recent[1].speaker, "D");
        assert_eq!(memory.len().await, 3);
    }

    #[tokio::test]
    async fn test_eviction_bound_holds() {
        let memory = memory_with_capacity(10);
        for i in 0..25 {
            memory.add_turn("User", &format!("turn {}", i)).await;
            assert!(memory.len().await <= 10);
        }
        assert_eq!(memory.recent_turns(100).await.len(), 10);
        assert_eq!(memory.last_turn().await.unwrap().message, "turn 24");
    }

    #[tokio::test]
    async fn test_recent_context_format() {
        let memory = SharedMemory::default();
        memory.add_turn("User", "Hi there").await;
        memory.add_turn("Sarah", "Welcome.").await;

        assert_eq!(memory.recent_context(5).await, "User: Hi there\nSarah: Welcome.");
        assert_eq!(memory.recent_context(1).await, "Sarah: Welcome.");
        assert_eq!(memory.recent_context(0).await, "");
    }

    #[tokio::test]
    async fn test_timestamps_are_monotonic() {
        let memory = SharedMemory::default();
        let first = memory.add_turn("User", "one").await;
        let second = memory.add_turn("User", "two").await;
        assert!(second.timestamp >= first.timestamp);
    }

    #[tokio::test]
    async fn test_facts_deduplicated_and_capped() {
        let memory = SharedMemory::new(MemoryConfig {
            fact_capacity: 2,
            ..MemoryConfig::default()
        });

        memory.add_fact("Sarah", "knows Rust").await;
        memory.add_fact("Sarah", "knows Rust").await;
        memory.add_fact("Sarah", "   ").await;
        assert_eq!(memory.fact_count("Sarah").await, 1);

        memory.add_fact("Sarah", "worked at a startup").await;
        memory.add_fact("Sarah", "prefers remote").await;
        assert_eq!(
            memory.facts("Sarah").await,
            vec!["worked at a startup", "prefers remote"]
        );
        assert_eq!(memory.fact_count("Mark").await, 0);
    }

    #[tokio::test]
    async fn test_build_prompt_layout() {
        let memory = SharedMemory::default();
        memory.register_agent_prompt("Sarah", "You are Sarah.").await;
        memory.add_turn("User", "I built a compiler.").await;
        memory.add_fact("Sarah", "candidate likes compilers").await;

        let prompt = memory
            .build_prompt_with("Sarah", 4, Some("Ask a relevant follow-up question."))
            .await;

        assert_eq!(
            prompt,
            "You are Sarah.\n\n\
             Recent conversation:\nUser: I built a compiler.\n\n\
             Things you remember:\n- candidate likes compilers\n\n\
             Ask a relevant follow-up question.\n\
             Sarah: "
        );
    }

    #[tokio::test]
    async fn test_build_prompt_without_history_ends_on_cue() {
        let memory = SharedMemory::default();
        memory.register_agent_prompt("Mark", "You are Mark.").await;
        assert_eq!(memory.build_prompt("Mark", 4).await, "You are Mark.\n\nMark: ");
    }

    #[tokio::test]
    async fn test_register_is_upsert() {
        let memory = SharedMemory::default();
        memory.register_agent_prompt("Mark", "v1").await;
        memory.register_agent_prompt("Mark", "v2").await;
        assert_eq!(memory.agent_prompt("Mark").await.as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn test_clear_keeps_prompts() {
        let memory = SharedMemory::default();
        memory.register_agent_prompt("Sarah", "You are Sarah.").await;
        memory.add_turn("User", "hello").await;
        memory.add_fact("Sarah", "fact").await;

        memory.clear().await;

        assert!(memory.is_empty().await);
        assert_eq!(memory.full_conversation().await, "");
        assert_eq!(memory.fact_count("Sarah").await, 0);
        assert!(memory.agent_prompt("Sarah").await.is_some());
    }

    #[tokio::test]
    async fn test_full_conversation_includes_preamble() {
        let memory = SharedMemory::default();
        memory.set_preamble("Panel interview").await;
        memory.add_turn("User", "hello").await;

        assert_eq!(
            memory.full_conversation().await,
            "Panel interview\n\nUser: hello\n"
        );
    }
}

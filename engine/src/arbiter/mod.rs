//! Turn Arbiter
//!
//! The single authority over the speaking floor. The floor is either free or
//! held by exactly one interviewer; a request succeeds only when it is free,
//! and only the holder can release it. The arbiter also collects each
//! interviewer's yes/no decision for the current round and, when every
//! registered interviewer has declined, flips the last decision to yes so a
//! user utterance never goes unanswered. Interviewers sitting a round out
//! (disabled, shutting down) abstain so the round can still complete.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Default number of grants remembered in the speaker history
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Who holds the speaking floor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "speaker", rename_all = "lowercase")]
pub enum TurnState {
    Free,
    Held(String),
}

impl TurnState {
    pub fn holder(&self) -> Option<&str> {
        match self {
            TurnState::Free => None,
            TurnState::Held(name) => Some(name),
        }
    }
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnState::Free => write!(f, "free"),
            TurnState::Held(name) => write!(f, "held by {}", name),
        }
    }
}

struct ArbiterState {
    turn: TurnState,
    last_speaker: Option<String>,
    total_turns: u64,
    history: VecDeque<String>,
    round: HashMap<String, bool>,
    abstained: HashSet<String>,
}

impl ArbiterState {
    fn new() -> Self {
        Self {
            turn: TurnState::Free,
            last_speaker: None,
            total_turns: 0,
            history: VecDeque::new(),
            round: HashMap::new(),
            abstained: HashSet::new(),
        }
    }
}

/// Mutual-exclusion authority over the speaking floor
pub struct TurnArbiter {
    agents: Vec<String>,
    history_limit: usize,
    state: Mutex<ArbiterState>,
}

impl TurnArbiter {
    /// Create an arbiter for an explicit set of interviewers
    pub fn new(agents: Vec<String>) -> Self {
        Self::with_history_limit(agents, DEFAULT_HISTORY_LIMIT)
    }

    pub fn with_history_limit(agents: Vec<String>, history_limit: usize) -> Self {
        tracing::debug!("Turn arbiter created for {:?}", agents);
        Self {
            agents,
            history_limit,
            state: Mutex::new(ArbiterState::new()),
        }
    }

    /// Registered interviewer names, in registration order
    pub fn agents(&self) -> &[String] {
        &self.agents
    }

    pub fn is_registered(&self, agent: &str) -> bool {
        self.agents.iter().any(|a| a == agent)
    }

    /// Take the floor if it is free.
    ///
    /// Returns false when another interviewer (or the same one) already
    /// holds it. A grant updates the speaker history and turn count.
    pub async fn request_turn(&self, agent: &str) -> bool {
        let mut state = self.state.lock().await;

        if let TurnState::Held(holder) = &state.turn {
            tracing::debug!("Turn denied to {} (held by {})", agent, holder);
            return false;
        }

        state.turn = TurnState::Held(agent.to_string());
        state.last_speaker = Some(agent.to_string());
        state.total_turns += 1;
        if self.history_limit > 0 {
            while state.history.len() >= self.history_limit {
                state.history.pop_front();
            }
            state.history.push_back(agent.to_string());
        }

        tracing::info!("Turn granted to {} (turn #{})", agent, state.total_turns);
        true
    }

    /// Give the floor back.
    ///
    /// Only the current holder can release; anything else is a stale
    /// release and is ignored.
    pub async fn release_turn(&self, agent: &str) -> bool {
        let mut state = self.state.lock().await;

        match &state.turn {
            TurnState::Held(holder) if holder == agent => {
                state.turn = TurnState::Free;
                tracing::debug!("Turn released by {}", agent);
                true
            }
            other => {
                tracing::debug!("Ignoring release from {} (floor is {})", agent, other);
                false
            }
        }
    }

    /// Record one interviewer's decision for the current round.
    ///
    /// Returns the decision to act on. When this report completes the round
    /// and every registered interviewer declined, the result is forced to
    /// true. Unregistered names are passed through unchanged.
    pub async fn record_decision(&self, agent: &str, wants_to_respond: bool) -> bool {
        if !self.is_registered(agent) {
            tracing::warn!("Decision from unregistered agent {} ignored", agent);
            return wants_to_respond;
        }

        let mut state = self.state.lock().await;
        state.abstained.remove(agent);
        state.round.insert(agent.to_string(), wants_to_respond);

        let round_complete = self.round_complete(&state);
        let all_declined = state.round.values().all(|wants| !wants);

        if !wants_to_respond && round_complete && all_declined {
            state.round.insert(agent.to_string(), true);
            tracing::info!(
                "All {} interviewers declined, forcing {} to respond",
                self.agents.len(),
                agent
            );
            return true;
        }

        wants_to_respond
    }

    /// Mark an interviewer as sitting out the current round.
    ///
    /// An abstention counts toward completing the round but is never forced
    /// to speak. Ignored once the interviewer has already decided.
    pub async fn record_abstention(&self, agent: &str) {
        if !self.is_registered(agent) {
            return;
        }

        let mut state = self.state.lock().await;
        if state.round.contains_key(agent) || !state.abstained.insert(agent.to_string()) {
            return;
        }
        tracing::debug!("{} abstains this round", agent);

        if self.round_complete(&state) && state.round.values().all(|wants| !wants) {
            tracing::warn!(
                "Round completed by {} abstaining; no decliner left to force",
                agent
            );
        }
    }

    fn round_complete(&self, state: &ArbiterState) -> bool {
        self.agents
            .iter()
            .all(|a| state.round.contains_key(a) || state.abstained.contains(a))
    }

    /// Start a new decision round after the user finishes speaking
    pub async fn on_user_turn_end(&self) {
        let mut state = self.state.lock().await;
        state.round.clear();
        state.abstained.clear();
    }

    /// Number of decisions recorded in the current round
    pub async fn decisions_this_round(&self) -> usize {
        self.state.lock().await.round.len()
    }

    pub async fn current_speaker(&self) -> Option<String> {
        self.state.lock().await.turn.holder().map(str::to_string)
    }

    pub async fn last_speaker(&self) -> Option<String> {
        self.state.lock().await.last_speaker.clone()
    }

    pub async fn is_free(&self) -> bool {
        self.state.lock().await.turn == TurnState::Free
    }

    pub async fn total_turns(&self) -> u64 {
        self.state.lock().await.total_turns
    }

    /// The last `n` granted speakers, oldest first
    pub async fn recent_speakers(&self, n: usize) -> Vec<String> {
        let state = self.state.lock().await;
        let skip = state.history.len().saturating_sub(n);
        state.history.iter().skip(skip).cloned().collect()
    }

    /// History formatted for prompts, e.g. `Recent speakers: Sarah → Mark`
    pub async fn speaker_history_line(&self) -> String {
        let state = self.state.lock().await;
        if state.history.is_empty() {
            return String::new();
        }
        let names: Vec<&str> = state.history.iter().map(String::as_str).collect();
        format!("Recent speakers: {}", names.join(" → "))
    }

    /// Whether the interviewer was granted one of the last two turns
    pub async fn has_spoken_recently(&self, agent: &str) -> bool {
        let state = self.state.lock().await;
        state.history.iter().rev().take(2).any(|s| s == agent)
    }

    /// Current floor state
    pub async fn snapshot(&self) -> TurnState {
        self.state.lock().await.turn.clone()
    }

    /// Free the floor and forget history, counters and the current round
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        *state = ArbiterState::new();
        tracing::info!("Turn arbiter cleared");
    }
}

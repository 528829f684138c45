//! Interview Session
//!
//! Explicitly wires one gateway, one shared memory, one arbiter and one
//! event bus to a set of interviewers. Nothing here is global: a session
//! owns its components and tears them down in `shutdown`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use futures::future::join_all;
use sdk::{AgentProfile, EngineError, GestureOutput, SpeechOutput, USER_SPEAKER};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::agent::pipeline::AgentContext;
use crate::agent::{AgentOutcome, AgentSettings, InterviewPhase, InterviewerAgent, Stimulus, TurnConfig};
use crate::arbiter::TurnArbiter;
use crate::config::Config;
use crate::gateway::InferenceGateway;
use crate::llm::LLMEngine;
use crate::memory::{MemoryConfig, SharedMemory};
use crate::message_bus::{DialogueEvent, MessageBus};
use crate::speech::SpeechConfig;

/// Everything a session needs besides its interviewers and engine
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub memory: MemoryConfig,
    pub turns: TurnConfig,
    pub speech: SpeechConfig,
    /// Per-generation limit; `None` waits indefinitely
    pub generation_timeout: Option<Duration>,
    /// Text kept at the head of the long-form transcript
    pub preamble: Option<String>,
}

impl SessionOptions {
    pub fn from_config(config: &Config) -> Self {
        let timeout = match config.llm.generation_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Self {
            memory: config.memory.clone(),
            turns: config.turns.clone(),
            speech: config.speech.clone(),
            generation_timeout: timeout,
            preamble: config.core.preamble.clone(),
        }
    }
}

/// Outcome of every interviewer for one user utterance
#[derive(Debug, Clone, Serialize)]
pub struct RoundReport {
    pub phase: InterviewPhase,
    /// `(agent, outcome)` in registration order
    pub outcomes: Vec<(String, AgentOutcome)>,
}

impl RoundReport {
    fn empty(phase: InterviewPhase) -> Self {
        Self {
            phase,
            outcomes: Vec::new(),
        }
    }

    /// `(agent, text)` for every interviewer that spoke
    pub fn spoken_lines(&self) -> Vec<(&str, &str)> {
        self.outcomes
            .iter()
            .filter_map(|(agent, outcome)| outcome.text().map(|t| (agent.as_str(), t)))
            .collect()
    }

    pub fn anyone_spoke(&self) -> bool {
        self.outcomes.iter().any(|(_, o)| o.spoke())
    }

    pub fn outcome_for(&self, agent: &str) -> Option<&AgentOutcome> {
        self.outcomes
            .iter()
            .find(|(name, _)| name == agent)
            .map(|(_, o)| o)
    }
}

/// One multi-party interview
pub struct InterviewSession {
    id: Uuid,
    started_at: DateTime<Local>,
    gateway: Arc<InferenceGateway>,
    memory: Arc<SharedMemory>,
    arbiter: Arc<TurnArbiter>,
    bus: Arc<MessageBus>,
    agents: Vec<Arc<InterviewerAgent>>,
    phase: Mutex<InterviewPhase>,
    global_voice: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl InterviewSession {
    /// Build a session and register every interviewer's prompt.
    ///
    /// Fails when there are no interviewers, a name is empty, or two
    /// interviewers share a name.
    pub async fn new(
        profiles: Vec<AgentProfile>,
        engine: Arc<dyn LLMEngine>,
        options: SessionOptions,
        speech: Arc<dyn SpeechOutput>,
        gestures: Arc<dyn GestureOutput>,
    ) -> Result<Self, EngineError> {
        validate_profiles(&profiles)?;

        let id = Uuid::new_v4();
        let names: Vec<String> = profiles.iter().map(|p| p.name.clone()).collect();

        let gateway = Arc::new(InferenceGateway::start_with_timeout(
            engine,
            options.generation_timeout,
        ));
        let memory = Arc::new(SharedMemory::new(options.memory.clone()));
        if let Some(preamble) = &options.preamble {
            memory.set_preamble(preamble.clone()).await;
        }
        let arbiter = Arc::new(TurnArbiter::with_history_limit(
            names.clone(),
            options.turns.history_limit,
        ));
        let bus = Arc::new(MessageBus::new());
        let global_voice = Arc::new(AtomicBool::new(options.speech.global_voice_enabled));
        let cancel = CancellationToken::new();

        let ctx = AgentContext {
            gateway: Arc::clone(&gateway),
            memory: Arc::clone(&memory),
            arbiter: Arc::clone(&arbiter),
            bus: Arc::clone(&bus),
            speech,
            gestures,
            global_voice: Arc::clone(&global_voice),
            cancel: cancel.clone(),
        };
        let settings = AgentSettings {
            turns: options.turns.clone(),
            context_turns: options.memory.context_turns,
            fallback_line: options.speech.fallback_line.clone(),
            comma_threshold: options.speech.comma_threshold,
        };

        let mut agents = Vec::with_capacity(profiles.len());
        for profile in profiles {
            let agent = InterviewerAgent::new(profile, ctx.clone(), settings.clone());
            agent.register().await;
            agents.push(Arc::new(agent));
        }

        tracing::info!(
            session = %id,
            "Interview session created with {} interviewers: {}",
            names.len(),
            names.join(", ")
        );

        Ok(Self {
            id,
            started_at: Local::now(),
            gateway,
            memory,
            arbiter,
            bus,
            agents,
            phase: Mutex::new(InterviewPhase::Introduction),
            global_voice,
            cancel,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn memory(&self) -> &Arc<SharedMemory> {
        &self.memory
    }

    pub fn arbiter(&self) -> &Arc<TurnArbiter> {
        &self.arbiter
    }

    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    pub fn gateway(&self) -> &Arc<InferenceGateway> {
        &self.gateway
    }

    pub fn agents(&self) -> &[Arc<InterviewerAgent>] {
        &self.agents
    }

    pub fn agent(&self, name: &str) -> Option<&Arc<InterviewerAgent>> {
        self.agents.iter().find(|a| a.name() == name)
    }

    pub async fn phase(&self) -> InterviewPhase {
        *self.phase.lock().await
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Open the interview: the first interviewer introduces themselves
    pub async fn start(&self) -> Result<(String, AgentOutcome), EngineError> {
        self.ensure_open()?;
        let first = self.agents.first().ok_or(EngineError::NoAgents)?;

        self.set_phase(InterviewPhase::Introduction).await;
        let outcome = first.introduce().await;
        Ok((first.name().to_string(), outcome))
    }

    /// Feed a finalized candidate utterance to every interviewer.
    ///
    /// Blank input is ignored. Interviewers run concurrently; the report
    /// lists their outcomes in registration order.
    pub async fn submit_user_utterance(&self, text: &str) -> Result<RoundReport, EngineError> {
        self.ensure_open()?;
        let phase = self.phase().await;

        let text = text.trim();
        if text.is_empty() {
            tracing::debug!("Ignoring empty user utterance");
            return Ok(RoundReport::empty(phase));
        }

        self.memory.add_turn(USER_SPEAKER, text).await;
        self.bus
            .publish(DialogueEvent::UserSpoke {
                text: text.to_string(),
            })
            .await;
        self.arbiter.on_user_turn_end().await;
        for agent in self.agents.iter().filter(|a| !a.is_enabled()) {
            self.arbiter.record_abstention(agent.name()).await;
        }

        tracing::info!(session = %self.id, %phase, "User answered: {:?}", text);

        let stimulus = Arc::new(Stimulus::from_user(text, phase));
        let handles: Vec<_> = self
            .agents
            .iter()
            .map(|agent| {
                let agent = Arc::clone(agent);
                let stimulus = Arc::clone(&stimulus);
                tokio::spawn(async move { agent.on_stimulus(&stimulus).await })
            })
            .collect();

        let results = join_all(handles).await;
        let outcomes = self
            .agents
            .iter()
            .zip(results)
            .map(|(agent, result)| {
                let outcome = result.unwrap_or_else(|e| {
                    tracing::error!("Interviewer {} task failed: {}", agent.name(), e);
                    AgentOutcome::Skipped
                });
                (agent.name().to_string(), outcome)
            })
            .collect();

        if phase == InterviewPhase::Introduction {
            self.set_phase(InterviewPhase::Main).await;
        }

        Ok(RoundReport { phase, outcomes })
    }

    /// Move to the closing phase of the interview
    pub async fn conclude(&self) {
        self.set_phase(InterviewPhase::Conclusion).await;
    }

    /// Forget the conversation and start over from the introduction
    pub async fn reset(&self) {
        self.memory.clear().await;
        self.arbiter.clear().await;
        self.set_phase(InterviewPhase::Introduction).await;
        tracing::info!(session = %self.id, "Session reset");
    }

    pub fn set_voice_enabled(&self, agent: &str, enabled: bool) -> Result<(), EngineError> {
        let agent = self
            .agent(agent)
            .ok_or_else(|| EngineError::UnknownAgent(agent.to_string()))?;
        agent.set_voice_enabled(enabled);
        Ok(())
    }

    /// Session-wide TTS switch, combined with each interviewer's own flag
    pub fn set_global_voice(&self, enabled: bool) {
        self.global_voice.store(enabled, Ordering::SeqCst);
        tracing::info!("Global voice {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn global_voice(&self) -> bool {
        self.global_voice.load(Ordering::SeqCst)
    }

    /// Cancel pending staggers and stop the gateway
    pub async fn shutdown(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        self.gateway.shutdown().await;
        tracing::info!(session = %self.id, "Interview session closed");
    }

    async fn set_phase(&self, next: InterviewPhase) {
        let changed = {
            let mut phase = self.phase.lock().await;
            let changed = *phase != next;
            *phase = next;
            changed
        };
        if changed {
            tracing::info!(session = %self.id, "Interview phase: {}", next);
            self.bus
                .publish(DialogueEvent::PhaseChanged { phase: next })
                .await;
        }
    }

    fn ensure_open(&self) -> Result<(), EngineError> {
        if self.cancel.is_cancelled() {
            Err(EngineError::SessionClosed)
        } else {
            Ok(())
        }
    }
}

fn validate_profiles(profiles: &[AgentProfile]) -> Result<(), EngineError> {
    if profiles.is_empty() {
        return Err(EngineError::NoAgents);
    }

    let mut seen = std::collections::HashSet::new();
    for profile in profiles {
        let name = profile.name.trim();
        if name.is_empty() {
            return Err(EngineError::InvalidProfile {
                name: profile.name.clone(),
                reason: "name must not be empty".to_string(),
            });
        }
        if name == USER_SPEAKER {
            return Err(EngineError::InvalidProfile {
                name: profile.name.clone(),
                reason: format!("'{}' is reserved for the candidate", USER_SPEAKER),
            });
        }
        if !seen.insert(name) {
            return Err(EngineError::DuplicateAgent(name.to_string()));
        }
    }
    Ok(())
}

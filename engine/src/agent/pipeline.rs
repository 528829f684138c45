//! Interviewer decision and speech pipeline

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::Rng;
use sdk::{AgentProfile, GestureOutput, ResponseMetadata, SpeechOutput, USER_SPEAKER};
use tokio_util::sync::CancellationToken;

use super::prompt::{self, INTRODUCTION_INSTRUCTION};
use super::{AgentOutcome, AgentState, Stimulus, TurnConfig};
use crate::arbiter::TurnArbiter;
use crate::gateway::InferenceGateway;
use crate::llm::GenerationRequest;
use crate::memory::SharedMemory;
use crate::message_bus::{DialogueEvent, MessageBus};
use crate::metadata::{self, TriggerSet};
use crate::sanitize::ResponseCleaner;
use crate::speech::{SentenceChunker, DEFAULT_COMMA_THRESHOLD, DEFAULT_FALLBACK_LINE};

/// Session components every interviewer shares
#[derive(Clone)]
pub struct AgentContext {
    pub gateway: Arc<InferenceGateway>,
    pub memory: Arc<SharedMemory>,
    pub arbiter: Arc<TurnArbiter>,
    pub bus: Arc<MessageBus>,
    pub speech: Arc<dyn SpeechOutput>,
    pub gestures: Arc<dyn GestureOutput>,
    /// Session-wide TTS switch
    pub global_voice: Arc<AtomicBool>,
    pub cancel: CancellationToken,
}

/// Per-interviewer tuning taken from the session config
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub turns: TurnConfig,
    /// Turns of shared history included in generation prompts
    pub context_turns: usize,
    pub fallback_line: String,
    pub comma_threshold: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            turns: TurnConfig::default(),
            context_turns: 6,
            fallback_line: DEFAULT_FALLBACK_LINE.to_string(),
            comma_threshold: DEFAULT_COMMA_THRESHOLD,
        }
    }
}

/// One autonomous interviewer
pub struct InterviewerAgent {
    profile: AgentProfile,
    ctx: AgentContext,
    settings: AgentSettings,
    triggers: TriggerSet,
    cleaner: ResponseCleaner,
    state: Mutex<AgentState>,
    enabled: AtomicBool,
    voice_enabled: AtomicBool,
}

impl InterviewerAgent {
    pub fn new(profile: AgentProfile, ctx: AgentContext, settings: AgentSettings) -> Self {
        let triggers = TriggerSet::new(profile.triggers.iter().cloned());
        let voice_enabled = AtomicBool::new(profile.voice_enabled);
        let cleaner = ResponseCleaner::for_agent(&profile.name);

        Self {
            profile,
            ctx,
            settings,
            triggers,
            cleaner,
            state: Mutex::new(AgentState::Idle),
            enabled: AtomicBool::new(true),
            voice_enabled,
        }
    }

    pub fn name(&self) -> &str {
        &self.profile.name
    }

    pub fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    pub fn state(&self) -> AgentState {
        *self.lock_state()
    }

    /// Register this interviewer's system prompt with shared memory
    pub async fn register(&self) {
        self.ctx
            .memory
            .register_agent_prompt(&self.profile.name, self.profile.system_prompt_text())
            .await;
    }

    /// Turn automatic responses on or off
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_voice_enabled(&self, enabled: bool) {
        self.voice_enabled.store(enabled, Ordering::SeqCst);
        tracing::info!("Voice for {} {}", self.profile.name, if enabled { "enabled" } else { "disabled" });
    }

    /// Whether output is voiced: this interviewer's flag and the session flag
    pub fn voice_active(&self) -> bool {
        self.voice_enabled.load(Ordering::SeqCst) && self.ctx.global_voice.load(Ordering::SeqCst)
    }

    /// React to something said in the interview.
    ///
    /// Never fails: every error inside the pipeline becomes a declined or
    /// fallback outcome, and a granted turn is always released.
    pub async fn on_stimulus(&self, stimulus: &Stimulus) -> AgentOutcome {
        let name = self.profile.name.as_str();

        if !self.is_enabled() {
            tracing::debug!("{} is disabled, skipping stimulus", name);
            return self.abstain().await;
        }
        if stimulus.speaker == name {
            return self.abstain().await;
        }
        if !self.begin_decision() {
            tracing::debug!("{} is already speaking, skipping stimulus", name);
            return self.abstain().await;
        }

        if !self.stagger().await {
            self.transition(AgentState::Idle);
            return self.abstain().await;
        }

        let request = GenerationRequest::new(prompt::decision_prompt(
            &self.profile,
            stimulus.phase,
            &stimulus.text,
        ))
        .with_temperature(self.settings.turns.decision_temperature)
        .with_repeat_penalty(1.0)
        .with_max_tokens(self.settings.turns.decision_max_tokens);

        let raw = self.ctx.gateway.generate(request).await;
        let wants = prompt::parse_decision(&raw);
        tracing::info!("{} decision: {} (raw {:?})", name, wants, raw);

        let decided = self.ctx.arbiter.record_decision(name, wants).await;
        self.ctx
            .bus
            .publish(DialogueEvent::DecisionRecorded {
                agent: name.to_string(),
                wants: decided,
                forced: decided && !wants,
            })
            .await;

        if !decided {
            self.transition(AgentState::Idle);
            return AgentOutcome::Declined;
        }

        self.transition(AgentState::AwaitingTurn);
        if !self.acquire_turn().await {
            self.transition(AgentState::Idle);
            return AgentOutcome::LostRace;
        }

        let instruction = prompt::speech_instruction(stimulus.phase, &stimulus.text);
        self.speak_granted(&instruction).await
    }

    /// Take the floor directly and speak on `instruction`.
    ///
    /// Returns `LostRace` when the floor is held by someone else.
    pub async fn speak(&self, instruction: &str) -> AgentOutcome {
        if self.state() == AgentState::Speaking {
            return AgentOutcome::Skipped;
        }
        if !self.acquire_turn().await {
            return AgentOutcome::LostRace;
        }
        self.speak_granted(instruction).await
    }

    /// Open the interview with a self-introduction
    pub async fn introduce(&self) -> AgentOutcome {
        tracing::info!("{} is initiating the introduction", self.profile.name);
        self.speak(INTRODUCTION_INSTRUCTION).await
    }

    /// Sit this round out without blocking the all-declined fallback
    async fn abstain(&self) -> AgentOutcome {
        self.ctx.arbiter.record_abstention(&self.profile.name).await;
        AgentOutcome::Skipped
    }

    async fn acquire_turn(&self) -> bool {
        let granted = self.ctx.arbiter.request_turn(&self.profile.name).await;
        if granted {
            self.ctx
                .bus
                .publish(DialogueEvent::TurnGranted {
                    agent: self.profile.name.clone(),
                })
                .await;
        }
        granted
    }

    /// Generate and deliver one utterance; the caller must hold the floor
    async fn speak_granted(&self, instruction: &str) -> AgentOutcome {
        let name = self.profile.name.as_str();
        let mut guard = FloorGuard::new(self);
        self.transition(AgentState::Speaking);

        let prompt = self
            .ctx
            .memory
            .build_prompt_with(name, self.settings.context_turns, Some(instruction))
            .await;
        let request = GenerationRequest::new(prompt)
            .with_temperature(self.profile.params.temperature)
            .with_repeat_penalty(self.profile.params.repeat_penalty)
            .with_max_tokens(self.profile.params.utterance_max_tokens);

        let raw = self.ctx.gateway.generate(request).await;
        let (text, metadata, used_fallback) = self.finish_utterance(&raw);

        if used_fallback {
            tracing::warn!("{} produced no usable output, using fallback line", name);
            self.ctx
                .bus
                .publish(DialogueEvent::GenerationFailed {
                    agent: name.to_string(),
                })
                .await;
        }

        self.apply_gestures(&metadata);
        if self.voice_active() {
            self.voice(&text);
        }

        self.ctx.memory.add_turn(name, &text).await;

        if self.ctx.arbiter.release_turn(name).await {
            self.ctx
                .bus
                .publish(DialogueEvent::TurnReleased {
                    agent: name.to_string(),
                })
                .await;
        }
        self.transition(AgentState::Idle);
        guard.disarm();

        self.ctx
            .bus
            .publish(DialogueEvent::AgentSpoke {
                agent: name.to_string(),
                text: text.clone(),
                metadata: metadata.clone(),
                used_fallback,
            })
            .await;

        AgentOutcome::Spoke {
            text,
            metadata,
            used_fallback,
        }
    }

    /// Clean a raw completion into display text and metadata
    fn finish_utterance(&self, raw: &str) -> (String, ResponseMetadata, bool) {
        let cleaned = self.cleaner.clean(raw);
        let parsed = metadata::parse_response(&cleaned);
        let text = metadata::strip_speaker_prefix(&parsed.display_text, &self.profile.name);

        if text.is_empty() {
            (self.settings.fallback_line.clone(), parsed.metadata, true)
        } else {
            (text, parsed.metadata, false)
        }
    }

    fn apply_gestures(&self, metadata: &ResponseMetadata) {
        let trigger = self
            .triggers
            .filter(&metadata.animator_trigger)
            .unwrap_or_default();
        let applied = catch_unwind(AssertUnwindSafe(|| {
            self.ctx.gestures.apply(
                &self.profile.name,
                trigger,
                metadata.attention(),
                Some(USER_SPEAKER),
            )
        }));
        if applied.is_err() {
            tracing::error!("Gesture output panicked for {}", self.profile.name);
        }
    }

    /// Send `text` to speech one chunk at a time
    fn voice(&self, text: &str) {
        let chunks =
            SentenceChunker::with_comma_threshold(self.settings.comma_threshold).split_all(text);
        for chunk in chunks {
            let spoken = catch_unwind(AssertUnwindSafe(|| {
                self.ctx
                    .speech
                    .speak(&self.profile.name, &self.profile.voice_name, &chunk)
            }));
            if spoken.is_err() {
                tracing::error!("Speech output panicked for {}, dropping the rest", self.profile.name);
                break;
            }
        }
    }

    /// Wait a random delay so interviewers do not all decide at once.
    ///
    /// Returns false when the session was cancelled meanwhile.
    async fn stagger(&self) -> bool {
        let delay = {
            let min = self.settings.turns.stagger_min_ms;
            let max = self.settings.turns.stagger_max_ms.max(min);
            let ms = if max > min {
                rand::thread_rng().gen_range(min..=max)
            } else {
                min
            };
            Duration::from_millis(ms)
        };

        tokio::select! {
            _ = self.ctx.cancel.cancelled() => {
                tracing::debug!("{} stagger cancelled", self.profile.name);
                false
            }
            _ = tokio::time::sleep(delay) => true,
        }
    }

    /// Idle or awaiting to AwaitingDecision, refused while speaking
    fn begin_decision(&self) -> bool {
        let mut state = self.lock_state();
        if *state == AgentState::Speaking {
            return false;
        }
        tracing::debug!("{}: {} -> {}", self.profile.name, *state, AgentState::AwaitingDecision);
        *state = AgentState::AwaitingDecision;
        true
    }

    fn transition(&self, next: AgentState) {
        let mut state = self.lock_state();
        if *state != next {
            tracing::debug!("{}: {} -> {}", self.profile.name, *state, next);
            *state = next;
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, AgentState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Releases a granted floor if a turn ends without finishing.
///
/// A panic or a dropped future between the grant and the release would
/// otherwise leave the floor held and the agent stuck in `Speaking`.
struct FloorGuard<'a> {
    agent: &'a InterviewerAgent,
    armed: bool,
}

impl<'a> FloorGuard<'a> {
    fn new(agent: &'a InterviewerAgent) -> Self {
        Self { agent, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for FloorGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let name = self.agent.profile.name.clone();
        tracing::error!("{} did not finish its turn, releasing the floor", name);
        self.agent.transition(AgentState::Idle);

        let arbiter = Arc::clone(&self.agent.ctx.arbiter);
        let bus = Arc::clone(&self.agent.ctx.bus);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if arbiter.release_turn(&name).await {
                        bus.publish(DialogueEvent::TurnReleased { agent: name }).await;
                    }
                });
            }
            Err(_) => tracing::error!("No runtime left to release the floor held by {}", name),
        }
    }
}

//! Scripted LLM Engine
//!
//! A deterministic in-process engine. Every response comes from a responder
//! closure, so tests can script decisions and utterances per prompt. The
//! engine also records what it was asked and how many calls overlapped,
//! which is how the gateway's one-at-a-time guarantee is verified.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{GenerationRequest, LLMEngine, Result};

/// Closure producing the completion for one request
pub type Responder = dyn Fn(&GenerationRequest) -> Result<String> + Send + Sync;

/// Engine whose output is fully determined by a closure
pub struct ScriptedEngine {
    responder: Box<Responder>,
    delay: Duration,
    requests: Mutex<Vec<GenerationRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedEngine {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&GenerationRequest) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Engine that answers every prompt with the same text
    pub fn fixed(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::new(move |_| Ok(text.clone()))
    }

    /// Offline stand-in for a real model.
    ///
    /// Decision prompts are answered `YES`; utterance prompts cycle through
    /// a short list of interview questions, each with a metadata block.
    pub fn interview_demo() -> Self {
        const LINES: &[&str] = &[
            "[META]{\"animatorTrigger\":\"nod\",\"isFocused\":true,\"isIgnoring\":false}[/META] Thanks for joining us today. Could you walk me through a project you are proud of?",
            "[META]{\"animatorTrigger\":\"lean_forward\",\"isFocused\":true,\"isIgnoring\":false}[/META] Interesting. What was the hardest trade-off you had to make there?",
            "[META]{\"animatorTrigger\":\"smile\",\"isFocused\":true,\"isIgnoring\":false}[/META] How did you measure whether it worked?",
            "[META]{\"animatorTrigger\":\"idle\",\"isFocused\":false,\"isIgnoring\":false}[/META] If you did it again, what would you change?",
        ];
        let counter = Arc::new(AtomicUsize::new(0));

        Self::new(move |request| {
            if request.prompt.contains("YES or NO") {
                return Ok("YES".to_string());
            }
            let index = counter.fetch_add(1, Ordering::SeqCst) % LINES.len();
            Ok(LINES[index].to_string())
        })
    }

    /// Simulated generation latency
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Every request received, in arrival order
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.lock_requests().clone()
    }

    /// Every prompt received, in arrival order
    pub fn prompts(&self) -> Vec<String> {
        self.lock_requests()
            .iter()
            .map(|r| r.prompt.clone())
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.lock_requests().len()
    }

    /// Highest number of overlapping `generate` calls observed
    pub fn max_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn lock_requests(&self) -> std::sync::MutexGuard<'_, Vec<GenerationRequest>> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl LLMEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        self.lock_requests().push(request.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let result = (self.responder)(request);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

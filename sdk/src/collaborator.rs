//! Collaborator traits
//!
//! The dialogue engine drives two side-effect sinks it does not own: a
//! text-to-speech service and an animation/gaze service. Both are fire and
//! forget from the engine's point of view. Implementations must return
//! quickly; long-running work (audio synthesis, playback) belongs on the
//! implementor's own task or thread.

use crate::types::AttentionState;
use std::sync::Arc;

/// Text-to-speech sink
pub trait SpeechOutput: Send + Sync {
    /// Queue one chunk of display text for synthesis in `voice`.
    ///
    /// Playback completion is not awaited by the engine.
    fn speak(&self, agent: &str, voice: &str, chunk: &str);
}

/// Animation and gaze sink
pub trait GestureOutput: Send + Sync {
    /// Apply a non-verbal trigger and attention state to an interviewer.
    ///
    /// `trigger` is empty when the response requested none. `gaze_target`
    /// names the participant the interviewer should look at, if any.
    fn apply(&self, agent: &str, trigger: &str, attention: AttentionState, gaze_target: Option<&str>);
}

impl<T: SpeechOutput + ?Sized> SpeechOutput for Arc<T> {
    fn speak(&self, agent: &str, voice: &str, chunk: &str) {
        (**self).speak(agent, voice, chunk)
    }
}

impl<T: GestureOutput + ?Sized> GestureOutput for Arc<T> {
    fn apply(&self, agent: &str, trigger: &str, attention: AttentionState, gaze_target: Option<&str>) {
        (**self).apply(agent, trigger, attention, gaze_target)
    }
}

//! Logging implementations of the collaborator traits
//!
//! The terminal front end has no audio or animation; these sinks report
//! what would have been voiced or animated through `tracing`.

use sdk::{AttentionState, GestureOutput, SpeechOutput};

/// Logs every TTS chunk at info level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSpeech;

impl SpeechOutput for TracingSpeech {
    fn speak(&self, agent: &str, voice: &str, chunk: &str) {
        tracing::info!(agent, voice, "TTS: {}", chunk);
    }
}

/// Discards all speech
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSpeech;

impl SpeechOutput for NullSpeech {
    fn speak(&self, _agent: &str, _voice: &str, _chunk: &str) {}
}

/// Logs triggers and attention changes at debug level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingGestures;

impl GestureOutput for TracingGestures {
    fn apply(&self, agent: &str, trigger: &str, attention: AttentionState, gaze_target: Option<&str>) {
        if !trigger.is_empty() {
            tracing::debug!(agent, "Animation trigger requested: {}", trigger);
        }
        tracing::debug!(
            agent,
            gaze = gaze_target.unwrap_or("neutral"),
            "Attention state: {}",
            attention
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_sinks_are_object_safe() {
        let speech: Vec<Arc<dyn SpeechOutput>> = vec![Arc::new(TracingSpeech), Arc::new(NullSpeech)];
        for sink in &speech {
            sink.speak("Sarah", "en_US-lessac-medium", "Hello.");
        }

        let gestures: Arc<dyn GestureOutput> = Arc::new(TracingGestures);
        gestures.apply("Sarah", "nod", AttentionState::Focused, Some("User"));
        gestures.apply("Sarah", "", AttentionState::Idle, None);
    }
}

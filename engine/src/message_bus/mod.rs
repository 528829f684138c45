//! Message Bus for dialogue events
//!
//! Interviewers, the arbiter's decisions and the session publish what
//! happens in an interview; front ends and tests subscribe. Each subscriber
//! gets a bounded channel, and subscriptions can target one event type or
//! `All`.
//!
//! Publishing never waits on a subscriber. An event that does not fit into
//! a full channel is dropped for that subscriber.

use std::collections::HashMap;
use std::sync::Arc;

use sdk::ResponseMetadata;
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};

use crate::agent::InterviewPhase;

/// Channel buffer size for bounded channels
const CHANNEL_BUFFER_SIZE: usize = 100;

/// Event types that can be published on the message bus
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum EventType {
    /// The candidate finished an utterance
    UserSpoke,
    /// An interviewer decided whether to respond
    DecisionRecorded,
    /// The arbiter granted the floor
    TurnGranted,
    /// The floor was released
    TurnReleased,
    /// An interviewer produced spoken output
    AgentSpoke,
    /// A generation came back empty
    GenerationFailed,
    /// The interview moved to another phase
    PhaseChanged,
    /// Subscribe to all event types
    All,
}

/// Events that can be published on the message bus
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DialogueEvent {
    UserSpoke {
        text: String,
    },
    DecisionRecorded {
        agent: String,
        wants: bool,
        /// True when the arbiter overrode a decline
        forced: bool,
    },
    TurnGranted {
        agent: String,
    },
    TurnReleased {
        agent: String,
    },
    AgentSpoke {
        agent: String,
        text: String,
        metadata: ResponseMetadata,
        used_fallback: bool,
    },
    GenerationFailed {
        agent: String,
    },
    PhaseChanged {
        phase: InterviewPhase,
    },
}

impl DialogueEvent {
    /// Get the event type for this event
    pub fn event_type(&self) -> EventType {
        match self {
            DialogueEvent::UserSpoke { .. } => EventType::UserSpoke,
            DialogueEvent::DecisionRecorded { .. } => EventType::DecisionRecorded,
            DialogueEvent::TurnGranted { .. } => EventType::TurnGranted,
            DialogueEvent::TurnReleased { .. } => EventType::TurnReleased,
            DialogueEvent::AgentSpoke { .. } => EventType::AgentSpoke,
            DialogueEvent::GenerationFailed { .. } => EventType::GenerationFailed,
            DialogueEvent::PhaseChanged { .. } => EventType::PhaseChanged,
        }
    }
}

/// Message bus for pub/sub of dialogue events
pub struct MessageBus {
    /// Map of event types to lists of subscribers
    channels: Arc<Mutex<HashMap<EventType, Vec<mpsc::Sender<DialogueEvent>>>>>,
}

impl MessageBus {
    /// Create a new MessageBus
    pub fn new() -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Subscribe to a specific event type, or `EventType::All`
    ///
    /// The returned channel holds at most CHANNEL_BUFFER_SIZE undelivered events.
    pub async fn subscribe(&self, event_type: EventType) -> mpsc::Receiver<DialogueEvent> {
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let mut channels = self.channels.lock().await;
        channels.entry(event_type).or_default().push(tx);
        rx
    }

    /// Publish an event to its type's subscribers and to `All` subscribers
    ///
    /// Closed subscribers are pruned.
    pub async fn publish(&self, event: DialogueEvent) {
        let mut channels = self.channels.lock().await;
        let event_type = event.event_type();

        for key in [event_type, EventType::All] {
            if let Some(subscribers) = channels.get_mut(&key) {
                subscribers.retain(|tx| match tx.try_send(event.clone()) {
                    Ok(()) => true,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        tracing::debug!("Subscriber channel full, dropping {:?}", event_type);
                        true
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => false,
                });
            }
        }
    }

    /// Number of live subscriptions across all event types
    pub async fn subscriber_count(&self) -> usize {
        self.channels.lock().await.values().map(Vec::len).sum()
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribe_and_publish() {
        let bus = MessageBus::new();
        let mut rx = bus.subscribe(EventType::TurnGranted).await;

        bus.publish(DialogueEvent::TurnGranted {
            agent: "Sarah".to_string(),
        })
        .await;

        match rx.recv().await.unwrap() {
            DialogueEvent::TurnGranted { agent } => assert_eq!(agent, "Sarah"),
            other => panic!("Wrong event received: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_all_event_type() {
        let bus = MessageBus::new();
        let mut rx_all = bus.subscribe(EventType::All).await;
        let mut rx_specific = bus.subscribe(EventType::UserSpoke).await;

        bus.publish(DialogueEvent::UserSpoke {
            text: "Hello".to_string(),
        })
        .await;

        assert!(matches!(
            rx_all.recv().await.unwrap(),
            DialogueEvent::UserSpoke { .. }
        ));
        assert!(matches!(
            rx_specific.recv().await.unwrap(),
            DialogueEvent::UserSpoke { .. }
        ));
    }

    #[tokio::test]
    async fn test_different_event_types() {
        let bus = MessageBus::new();
        let mut rx_granted = bus.subscribe(EventType::TurnGranted).await;
        let mut rx_released = bus.subscribe(EventType::TurnReleased).await;

        bus.publish(DialogueEvent::TurnGranted {
            agent: "A".to_string(),
        })
        .await;
        bus.publish(DialogueEvent::TurnReleased {
            agent: "A".to_string(),
        })
        .await;

        assert!(matches!(
            rx_granted.recv().await.unwrap(),
            DialogueEvent::TurnGranted { .. }
        ));
        assert!(matches!(
            rx_released.recv().await.unwrap(),
            DialogueEvent::TurnReleased { .. }
        ));
        assert!(rx_granted.try_recv().is_err());
        assert!(rx_released.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_full_channel_drops_instead_of_blocking() {
        let bus = MessageBus::new();
        let mut rx = bus.subscribe(EventType::GenerationFailed).await;

        for _ in 0..CHANNEL_BUFFER_SIZE + 10 {
            bus.publish(DialogueEvent::GenerationFailed {
                agent: "Mark".to_string(),
            })
            .await;
        }

        let mut count = 0;
        while rx.try_recv().is_ok() {
            count += 1;
        }
        assert_eq!(count, CHANNEL_BUFFER_SIZE);
    }

    #[tokio::test]
    async fn test_closed_subscribers_are_pruned() {
        let bus = MessageBus::new();
        let rx = bus.subscribe(EventType::All).await;
        drop(rx);

        bus.publish(DialogueEvent::UserSpoke {
            text: "hi".to_string(),
        })
        .await;

        assert_eq!(bus.subscriber_count().await, 0);
    }

    #[test]
    fn test_event_serialization() {
        let event = DialogueEvent::DecisionRecorded {
            agent: "Sarah".to_string(),
            wants: true,
            forced: true,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "decision_recorded");
        assert_eq!(json["forced"], true);
    }
}

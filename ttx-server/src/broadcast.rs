//! Broadcast gateway for real-time session updates
//!
//! Topic-keyed publish/subscribe fan-out over tokio broadcast channels.
//! Two topic kinds exist: one per exercise (facilitator panel plus every
//! participant dashboard) and one per participant (private admission and
//! reconnect notices).
//!
//! Delivery is best-effort and at-most-once per connected session; there
//! is no replay buffer. Sessions that miss events reconcile by re-fetching
//! the exercise snapshot on reconnect. The gateway routes by topic only
//! and never interprets payloads.

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use ttx_common::events::ExerciseEvent;

/// Routing key for one broadcast channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// All sessions watching one exercise
    Exercise(Uuid),
    /// Private channel for one participant
    Participant(Uuid),
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Topic::Exercise(id) => write!(f, "exercise:{id}"),
            Topic::Participant(id) => write!(f, "participant:{id}"),
        }
    }
}

/// Topic-keyed event fan-out
///
/// Channels are created lazily on first subscribe/publish and pruned once
/// a publish finds no remaining receivers. The interior lock only guards
/// the topic map; sends happen on cloned senders, so subscriber churn
/// during an active fan-out is safe.
pub struct BroadcastGateway {
    capacity: usize,
    topics: RwLock<HashMap<Topic, broadcast::Sender<ExerciseEvent>>>,
}

impl BroadcastGateway {
    /// Create a gateway whose per-topic channels buffer `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            topics: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribe to all future events on one topic.
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<ExerciseEvent> {
        let mut topics = self.topics.write().expect("topic map poisoned");
        topics
            .entry(topic)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Publish an event to one topic, returning the number of sessions it
    /// reached. Zero receivers is a normal outcome, not an error.
    pub fn publish(&self, topic: Topic, event: ExerciseEvent) -> usize {
        let sender = {
            let topics = self.topics.read().expect("topic map poisoned");
            topics.get(&topic).cloned()
        };

        let Some(sender) = sender else {
            debug!("No channel for {topic}, dropping {}", event.event_type());
            return 0;
        };

        match sender.send(event) {
            Ok(count) => count,
            Err(_) => {
                // Last receiver is gone; drop the channel so idle topics
                // do not accumulate.
                let mut topics = self.topics.write().expect("topic map poisoned");
                if let Some(current) = topics.get(&topic) {
                    if current.receiver_count() == 0 {
                        topics.remove(&topic);
                        debug!("Pruned idle topic {topic}");
                    }
                }
                0
            }
        }
    }

    /// Current number of sessions subscribed to a topic.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        let topics = self.topics.read().expect("topic map poisoned");
        topics.get(&topic).map_or(0, |s| s.receiver_count())
    }

    /// Number of live topics (test and diagnostics aid).
    pub fn topic_count(&self) -> usize {
        self.topics.read().expect("topic map poisoned").len()
    }
}

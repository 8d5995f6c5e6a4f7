//! Event types for the TTX broadcast system
//!
//! Events are published to topic-keyed broadcast channels and serialized
//! for SSE transmission. All live-session updates flow through this one
//! enum for type safety and exhaustive matching.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Inject, Magnitude, ParticipantStatus, ParticipantSummary};

/// Domain events fanned out to subscribed sessions
///
/// Delivery is best-effort, at-most-once per connected session, with no
/// replay buffer: a session disconnected at emission time reconciles by
/// re-fetching the exercise snapshot on reconnect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExerciseEvent {
    /// Facilitator released an inject; participant cursors were hard-cut
    /// to its first phase.
    InjectReleased {
        inject_number: u32,
        inject: Inject,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Submission gate for one inject opened or closed
    ResponsesToggled {
        inject_number: u32,
        responses_open: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Phase-advance gate for one inject locked or unlocked
    PhaseProgressionToggled {
        inject_number: u32,
        phase_progression_locked: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A participant's submission was scored
    ScoreUpdate {
        participant_id: Uuid,
        name: String,
        inject_number: u32,
        points_earned: i64,
        magnitude: Magnitude,
        total_score: i64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Someone joined via access code (status `waiting`, pending admission)
    ParticipantJoined {
        participant: ParticipantSummary,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Facilitator changed a participant's status (roster update)
    ParticipantStatusUpdated {
        participant_id: Uuid,
        status: ParticipantStatus,
        participant: ParticipantSummary,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Sent on the participant's private topic when admitted
    ParticipantAdmitted {
        exercise_id: Uuid,
        exercise_title: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A previously disconnected participant reconnected (exercise topic)
    ParticipantRejoined {
        participant_id: Uuid,
        name: String,
        status: ParticipantStatus,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Sent on the participant's private topic after auto-restore so its
    /// client re-fetches the exercise snapshot
    Reconnected {
        status: ParticipantStatus,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A live participant's connection dropped (exercise topic)
    ParticipantDisconnected {
        participant_id: Uuid,
        name: String,
        status: ParticipantStatus,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Facilitator reset the whole exercise; clients drop local state
    ExerciseReset {
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl ExerciseEvent {
    /// Event type as string, used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            ExerciseEvent::InjectReleased { .. } => "InjectReleased",
            ExerciseEvent::ResponsesToggled { .. } => "ResponsesToggled",
            ExerciseEvent::PhaseProgressionToggled { .. } => "PhaseProgressionToggled",
            ExerciseEvent::ScoreUpdate { .. } => "ScoreUpdate",
            ExerciseEvent::ParticipantJoined { .. } => "ParticipantJoined",
            ExerciseEvent::ParticipantStatusUpdated { .. } => "ParticipantStatusUpdated",
            ExerciseEvent::ParticipantAdmitted { .. } => "ParticipantAdmitted",
            ExerciseEvent::ParticipantRejoined { .. } => "ParticipantRejoined",
            ExerciseEvent::Reconnected { .. } => "Reconnected",
            ExerciseEvent::ParticipantDisconnected { .. } => "ParticipantDisconnected",
            ExerciseEvent::ExerciseReset { .. } => "ExerciseReset",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = ExerciseEvent::ResponsesToggled {
            inject_number: 2,
            responses_open: true,
            timestamp: chrono::Utc::now(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"ResponsesToggled\""));
        assert!(json.contains("\"inject_number\":2"));
        assert!(json.contains("\"responses_open\":true"));

        let back: ExerciseEvent = serde_json::from_str(&json).unwrap();
        match back {
            ExerciseEvent::ResponsesToggled {
                inject_number,
                responses_open,
                ..
            } => {
                assert_eq!(inject_number, 2);
                assert!(responses_open);
            }
            _ => panic!("wrong event type deserialized"),
        }
    }

    #[test]
    fn test_event_type_matches_variant() {
        let event = ExerciseEvent::ScoreUpdate {
            participant_id: Uuid::new_v4(),
            name: "blue-1".to_string(),
            inject_number: 1,
            points_earned: 10,
            magnitude: Magnitude::MostEffective,
            total_score: 10,
            timestamp: chrono::Utc::now(),
        };
        assert_eq!(event.event_type(), "ScoreUpdate");

        let event = ExerciseEvent::ExerciseReset {
            timestamp: chrono::Utc::now(),
        };
        assert_eq!(event.event_type(), "ExerciseReset");
    }
}

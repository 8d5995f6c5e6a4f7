//! Participant-side engine operations
//!
//! Joining, the participant-facing exercise snapshot, answer submission
//! with scoring, self-paced phase advancement, and the connect/disconnect
//! status transitions driven by the session registry.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use ttx_common::events::ExerciseEvent;
use ttx_common::models::{
    Answer, ExerciseStatus, Inject, Participant, ParticipantStatus, Response, SummaryPhase,
};
use ttx_common::scoring;

use crate::broadcast::Topic;
use crate::db;
use crate::error::{Error, Result};

use super::Engine;

/// Join request: access code plus self-reported identity
#[derive(Debug, Clone, Deserialize)]
pub struct JoinRequest {
    pub access_code: String,
    pub name: String,
    #[serde(default)]
    pub team: String,
}

/// Result of a successful join
#[derive(Debug, Clone, Serialize)]
pub struct JoinOutcome {
    pub participant: Participant,
    pub exercise_id: Uuid,
    pub exercise_title: String,
}

/// Participant-facing view of an exercise
///
/// Only released injects appear, and their phases are stripped of the
/// facilitator-only answer key. Used for initial load and for snapshot
/// reconciliation after a missed-events reconnect.
#[derive(Debug, Clone, Serialize)]
pub struct ExerciseSnapshot {
    pub exercise_id: Uuid,
    pub title: String,
    pub description: String,
    pub status: ExerciseStatus,
    pub injects: Vec<Inject>,
    pub summary: Vec<SummaryPhase>,
    pub participant: Participant,
}

/// Submission request for one question
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRequest {
    pub participant_id: Uuid,
    pub inject_number: u32,
    pub phase_number: u32,
    #[serde(default)]
    pub question_index: u32,
    pub answer: Answer,
}

/// Result of a scored submission
#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutcome {
    pub response: Response,
    pub total_score: i64,
}

/// Outcome of a phase-advance request
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PhaseAdvance {
    Advanced {
        current_phase: u32,
        total_phases: u32,
    },
    /// Already at the last phase of the current inject; the cursor stays
    /// put until the facilitator releases the next inject.
    AllPhasesCompleted {
        current_phase: u32,
    },
}

impl Engine {
    /// Enroll a new participant via access code.
    ///
    /// Newcomers land in the waiting room (`waiting`) until the
    /// facilitator admits them. The capacity check counts waiting and
    /// active participants; those who completed or left free their slot.
    pub async fn join_exercise(&self, request: JoinRequest) -> Result<JoinOutcome> {
        let exercise = db::exercises::load_by_access_code(&self.db, &request.access_code)
            .await?
            .ok_or_else(|| Error::NotFound("no exercise with that access code".to_string()))?;

        if !exercise.status.joinable() {
            return Err(Error::InvalidState(format!(
                "exercise is {}, not accepting participants",
                exercise.status
            )));
        }

        let lock = self.exercise_lock(exercise.id);
        let _guard = lock.lock().await;

        let occupied = db::participants::count_capacity_slots(&self.db, exercise.id).await?;
        if occupied >= exercise.max_participants as i64 {
            return Err(Error::CapacityExceeded(format!(
                "exercise is full ({} participants)",
                exercise.max_participants
            )));
        }

        let participant = Participant::new(exercise.id, request.name, request.team);
        db::participants::create(&self.db, &participant).await?;

        info!(
            "Participant {} '{}' joined exercise {}",
            participant.participant_id, participant.name, exercise.id
        );
        self.gateway.publish(
            Topic::Exercise(exercise.id),
            ExerciseEvent::ParticipantJoined {
                participant: participant.summary(),
                timestamp: Utc::now(),
            },
        );

        Ok(JoinOutcome {
            participant,
            exercise_id: exercise.id,
            exercise_title: exercise.title,
        })
    }

    /// Participant-facing snapshot of the exercise and their own state.
    pub async fn exercise_snapshot(
        &self,
        exercise_id: Uuid,
        participant_id: Uuid,
    ) -> Result<ExerciseSnapshot> {
        let participant = db::participants::load_in_exercise(&self.db, participant_id, exercise_id)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!("participant {participant_id} in exercise {exercise_id}"))
            })?;
        let exercise = self.load_exercise(exercise_id).await?;

        Ok(ExerciseSnapshot {
            exercise_id: exercise.id,
            title: exercise.title,
            description: exercise.description,
            status: exercise.status,
            injects: exercise
                .injects
                .into_iter()
                .filter(|i| i.is_active)
                .map(redact_answer_keys)
                .collect(),
            summary: exercise.summary,
            participant,
        })
    }

    /// Record and score one answer.
    ///
    /// Rejected while the inject's submission gate is closed, and for any
    /// question the participant already answered; recorded answers are
    /// immutable. An answer to a phase the exercise no longer defines is
    /// still recorded, scored as zero.
    pub async fn submit_response(&self, request: SubmitRequest) -> Result<SubmitOutcome> {
        // Resolve the exercise first so the check below runs under its lock.
        let exercise_id = self.load_participant(request.participant_id).await?.exercise_id;

        let lock = self.exercise_lock(exercise_id);
        let _guard = lock.lock().await;

        let mut participant = self.load_participant(request.participant_id).await?;
        let exercise = self.load_exercise(exercise_id).await?;

        let inject = exercise
            .inject(request.inject_number)
            .ok_or_else(|| Error::NotFound(format!("inject {}", request.inject_number)))?;
        if !inject.responses_open {
            return Err(Error::NotOpen(format!(
                "responses are closed for inject {}",
                request.inject_number
            )));
        }

        if participant
            .response(request.inject_number, request.phase_number, request.question_index)
            .is_some()
        {
            return Err(Error::DuplicateResponse(format!(
                "already answered inject {} phase {} question {}",
                request.inject_number, request.phase_number, request.question_index
            )));
        }

        let outcome = match inject
            .phases
            .iter()
            .find(|p| p.phase_number == request.phase_number)
        {
            Some(phase) => scoring::score(phase, &request.answer),
            None => {
                debug!(
                    "Answer to undefined phase {} of inject {}, scoring zero",
                    request.phase_number, request.inject_number
                );
                scoring::ScoreOutcome::default()
            }
        };

        let response = Response {
            inject_number: request.inject_number,
            phase_number: request.phase_number,
            question_index: request.question_index,
            answer: request.answer,
            points_earned: outcome.points,
            magnitude: outcome.magnitude,
            submitted_at: Utc::now(),
        };
        participant.responses.push(response.clone());
        participant.total_score += outcome.points;

        db::participants::save(&self.db, &participant).await?;

        self.gateway.publish(
            Topic::Exercise(exercise_id),
            ExerciseEvent::ScoreUpdate {
                participant_id: participant.participant_id,
                name: participant.name.clone(),
                inject_number: request.inject_number,
                points_earned: outcome.points,
                magnitude: outcome.magnitude,
                total_score: participant.total_score,
                timestamp: response.submitted_at,
            },
        );

        Ok(SubmitOutcome {
            response,
            total_score: participant.total_score,
        })
    }

    /// Advance the participant's own phase cursor within their current
    /// inject.
    ///
    /// Refused while the facilitator holds the progression lock, even at
    /// the final phase. At the final phase with the lock off, reports
    /// completion without moving.
    pub async fn advance_phase(&self, participant_id: Uuid) -> Result<PhaseAdvance> {
        let exercise_id = self.load_participant(participant_id).await?.exercise_id;

        let lock = self.exercise_lock(exercise_id);
        let _guard = lock.lock().await;

        let mut participant = self.load_participant(participant_id).await?;
        let exercise = self.load_exercise(exercise_id).await?;

        let inject = exercise
            .inject(participant.current_inject)
            .ok_or_else(|| Error::NotFound(format!("inject {}", participant.current_inject)))?;

        if inject.phase_progression_locked {
            return Err(Error::Locked(format!(
                "phase progression is locked on inject {}",
                inject.inject_number
            )));
        }

        let total_phases = inject.phases.len() as u32;
        if participant.current_phase >= total_phases {
            return Ok(PhaseAdvance::AllPhasesCompleted {
                current_phase: participant.current_phase,
            });
        }

        participant.current_phase += 1;
        db::participants::save(&self.db, &participant).await?;

        Ok(PhaseAdvance::Advanced {
            current_phase: participant.current_phase,
            total_phases,
        })
    }

    /// Session attach. Restores participants marked `left` by a dropped
    /// connection back to `active` and tells both sides.
    ///
    /// The status check runs on a copy reloaded under the exercise lock,
    /// and the write touches only the presence columns, so a submission
    /// committing around the same moment is never overwritten.
    pub async fn mark_connected(&self, participant_id: Uuid) -> Result<()> {
        let exercise_id = self.load_participant(participant_id).await?.exercise_id;

        let lock = self.exercise_lock(exercise_id);
        let _guard = lock.lock().await;

        let participant = self.load_participant(participant_id).await?;
        if participant.status == ParticipantStatus::Left {
            db::participants::set_status(&self.db, participant_id, ParticipantStatus::Active)
                .await?;

            let now = Utc::now();
            info!("Participant {participant_id} reconnected");
            self.gateway.publish(
                Topic::Exercise(exercise_id),
                ExerciseEvent::ParticipantRejoined {
                    participant_id,
                    name: participant.name,
                    status: ParticipantStatus::Active,
                    timestamp: now,
                },
            );
            self.gateway.publish(
                Topic::Participant(participant_id),
                ExerciseEvent::Reconnected {
                    status: ParticipantStatus::Active,
                    timestamp: now,
                },
            );
        } else {
            // Touch liveness only
            db::participants::touch(&self.db, participant_id).await?;
        }
        Ok(())
    }

    /// Session detach. Active participants become `left`; waiting and
    /// completed ones keep their status. Same load-under-lock and
    /// presence-only write as [`Engine::mark_connected`].
    pub async fn mark_disconnected(&self, participant_id: Uuid) -> Result<()> {
        let exercise_id = self.load_participant(participant_id).await?.exercise_id;

        let lock = self.exercise_lock(exercise_id);
        let _guard = lock.lock().await;

        let participant = self.load_participant(participant_id).await?;
        if participant.status == ParticipantStatus::Active {
            db::participants::set_status(&self.db, participant_id, ParticipantStatus::Left)
                .await?;

            debug!("Participant {participant_id} disconnected");
            self.gateway.publish(
                Topic::Exercise(exercise_id),
                ExerciseEvent::ParticipantDisconnected {
                    participant_id,
                    name: participant.name,
                    status: ParticipantStatus::Left,
                    timestamp: Utc::now(),
                },
            );
        }
        Ok(())
    }
}

/// Strip the answer key before an inject leaves the facilitator's side.
fn redact_answer_keys(mut inject: Inject) -> Inject {
    for phase in &mut inject.phases {
        phase.correct_answer.clear();
    }
    inject
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::broadcast::BroadcastGateway;
    use crate::engine::{NewExercise, NewInject};
    use ttx_common::models::{AnswerOption, Magnitude, Phase, QuestionType};

    async fn one_question_engine() -> (tempfile::TempDir, Arc<Engine>, Uuid) {
        let dir = tempfile::tempdir().unwrap();
        let pool = crate::db::init::create_pool(&dir.path().join("test.db"))
            .await
            .unwrap();
        crate::db::init::initialize_database(&pool).await.unwrap();
        let facilitator = crate::db::facilitators::create(&pool, "test", "test-token")
            .await
            .unwrap();

        let gateway = Arc::new(BroadcastGateway::new(16));
        let engine = Arc::new(Engine::new(pool, gateway));
        (dir, engine, facilitator)
    }

    fn one_question_exercise() -> NewExercise {
        NewExercise {
            title: "drill".into(),
            description: String::new(),
            max_participants: 10,
            injects: vec![NewInject {
                title: "alert".into(),
                narrative: String::new(),
                artifacts: Vec::new(),
                phases: vec![Phase {
                    phase_number: 1,
                    phase_name: "triage".into(),
                    question: "q".into(),
                    question_type: QuestionType::Single,
                    options: vec![AnswerOption {
                        id: "A".into(),
                        text: "isolate".into(),
                        points: 10,
                        magnitude: Magnitude::MostEffective,
                    }],
                    correct_answer: vec!["A".into()],
                    max_points: None,
                }],
            }],
            summary: Vec::new(),
        }
    }

    /// A reconnect racing a submission on the same participant row must
    /// not erase the submission. Holding the exercise lock lets both
    /// operations run their pre-lock loads, then queues them behind it,
    /// forcing the interleaving where a stale full-row store would lose
    /// the freshly committed response.
    #[tokio::test]
    async fn test_reconnect_preserves_concurrent_submission() {
        let (_dir, engine, facilitator) = one_question_engine().await;
        let ex = engine
            .create_exercise(facilitator, one_question_exercise())
            .await
            .unwrap();

        let joined = engine
            .join_exercise(JoinRequest {
                access_code: ex.access_code.clone(),
                name: "casey".into(),
                team: String::new(),
            })
            .await
            .unwrap();
        let pid = joined.participant.participant_id;

        engine
            .update_participant_status(facilitator, ex.id, pid, ParticipantStatus::Active)
            .await
            .unwrap();
        engine.release_inject(facilitator, ex.id, 1).await.unwrap();
        engine.mark_disconnected(pid).await.unwrap();

        let lock = engine.exercise_lock(ex.id);
        let guard = lock.lock().await;

        let submit = tokio::spawn({
            let engine = Arc::clone(&engine);
            async move {
                engine
                    .submit_response(SubmitRequest {
                        participant_id: pid,
                        inject_number: 1,
                        phase_number: 1,
                        question_index: 0,
                        answer: Answer::One("A".into()),
                    })
                    .await
            }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        let reconnect = tokio::spawn({
            let engine = Arc::clone(&engine);
            async move { engine.mark_connected(pid).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(guard);

        let outcome = submit.await.unwrap().unwrap();
        assert_eq!(outcome.total_score, 10);
        reconnect.await.unwrap().unwrap();

        let after = db::participants::load(engine.db(), pid)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.status, ParticipantStatus::Active);
        assert_eq!(after.responses.len(), 1, "reconnect wiped the recorded response");
        assert_eq!(after.total_score, 10);
    }

    #[test]
    fn test_redaction_clears_answer_key_only() {
        let inject = Inject {
            inject_number: 1,
            title: "i".into(),
            narrative: "n".into(),
            artifacts: Vec::new(),
            phases: vec![Phase {
                phase_number: 1,
                phase_name: "p".into(),
                question: "q".into(),
                question_type: QuestionType::Single,
                options: vec![AnswerOption {
                    id: "A".into(),
                    text: "alpha".into(),
                    points: 10,
                    magnitude: Magnitude::MostEffective,
                }],
                correct_answer: vec!["A".into()],
                max_points: None,
            }],
            release_time: None,
            is_active: true,
            responses_open: true,
            phase_progression_locked: false,
        };

        let redacted = redact_answer_keys(inject);
        assert!(redacted.phases[0].correct_answer.is_empty());
        assert_eq!(redacted.phases[0].options.len(), 1);
        assert_eq!(redacted.phases[0].options[0].points, 10);
    }

    #[test]
    fn test_phase_advance_serializes_tagged() {
        let advanced = PhaseAdvance::Advanced {
            current_phase: 2,
            total_phases: 3,
        };
        let json = serde_json::to_string(&advanced).unwrap();
        assert!(json.contains("\"outcome\":\"advanced\""));

        let done = PhaseAdvance::AllPhasesCompleted { current_phase: 3 };
        let json = serde_json::to_string(&done).unwrap();
        assert!(json.contains("\"outcome\":\"all_phases_completed\""));
    }
}

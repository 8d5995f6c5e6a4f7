//! Facilitator-side engine operations
//!
//! Exercise authoring, inject lifecycle control (release, gates, resets),
//! roster administration, and the live scoreboard. Every operation here
//! requires the caller to own the exercise it touches.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use ttx_common::events::ExerciseEvent;
use ttx_common::models::{
    Exercise, ExerciseStatus, Inject, Participant, ParticipantStatus, SummaryPhase,
};

use crate::broadcast::Topic;
use crate::db;
use crate::error::{Error, Result};

use super::Engine;

/// Payload for creating an exercise
#[derive(Debug, Clone, Deserialize)]
pub struct NewExercise {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_max_participants")]
    pub max_participants: u32,
    #[serde(default)]
    pub injects: Vec<NewInject>,
    #[serde(default)]
    pub summary: Vec<SummaryPhase>,
}

fn default_max_participants() -> u32 {
    50
}

/// Content of one inject as authored by the facilitator
///
/// Numbering and lifecycle flags are assigned by the engine, never taken
/// from the caller.
#[derive(Debug, Clone, Deserialize)]
pub struct NewInject {
    pub title: String,
    #[serde(default)]
    pub narrative: String,
    #[serde(default)]
    pub artifacts: Vec<ttx_common::models::Artifact>,
    #[serde(default)]
    pub phases: Vec<ttx_common::models::Phase>,
}

impl NewInject {
    fn into_inject(self, inject_number: u32) -> Inject {
        let mut phases = self.phases;
        for (index, phase) in phases.iter_mut().enumerate() {
            phase.phase_number = index as u32 + 1;
        }
        Inject {
            inject_number,
            title: self.title,
            narrative: self.narrative,
            artifacts: self.artifacts,
            phases,
            release_time: None,
            is_active: false,
            responses_open: false,
            phase_progression_locked: false,
        }
    }
}

/// Partial update for exercise metadata
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExerciseUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<ExerciseStatus>,
    pub max_participants: Option<u32>,
}

/// Leaderboard over one exercise's active participants
#[derive(Debug, Clone, Serialize)]
pub struct Scoreboard {
    pub exercise_id: Uuid,
    pub entries: Vec<ScoreboardEntry>,
    pub average_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreboardEntry {
    pub participant_id: Uuid,
    pub name: String,
    pub team: String,
    pub total_score: i64,
    pub inject_scores: Vec<InjectScore>,
}

/// Points one participant earned on one inject
#[derive(Debug, Clone, Serialize)]
pub struct InjectScore {
    pub inject_number: u32,
    pub points: i64,
}

impl Engine {
    /// Create an exercise in `draft` with a fresh access code.
    pub async fn create_exercise(
        &self,
        facilitator: Uuid,
        new: NewExercise,
    ) -> Result<Exercise> {
        let now = Utc::now();
        let exercise = Exercise {
            id: Uuid::new_v4(),
            title: new.title,
            description: new.description,
            facilitator,
            access_code: generate_access_code(),
            status: ExerciseStatus::Draft,
            max_participants: new.max_participants,
            injects: new
                .injects
                .into_iter()
                .enumerate()
                .map(|(index, inject)| inject.into_inject(index as u32 + 1))
                .collect(),
            summary: new.summary,
            created_at: now,
            updated_at: now,
        };

        db::exercises::create(&self.db, &exercise).await?;
        info!(
            "Created exercise {} '{}' with access code {}",
            exercise.id, exercise.title, exercise.access_code
        );
        Ok(exercise)
    }

    pub async fn get_exercise(&self, facilitator: Uuid, exercise_id: Uuid) -> Result<Exercise> {
        self.load_owned_exercise(exercise_id, facilitator).await
    }

    pub async fn list_exercises(
        &self,
        facilitator: Uuid,
    ) -> Result<Vec<db::exercises::ExerciseListing>> {
        db::exercises::list_by_facilitator(&self.db, facilitator).await
    }

    /// Update exercise metadata. Injects are edited through the dedicated
    /// inject operations, not here.
    pub async fn update_exercise(
        &self,
        facilitator: Uuid,
        exercise_id: Uuid,
        update: ExerciseUpdate,
    ) -> Result<Exercise> {
        let lock = self.exercise_lock(exercise_id);
        let _guard = lock.lock().await;

        let mut exercise = self.load_owned_exercise(exercise_id, facilitator).await?;
        if let Some(title) = update.title {
            exercise.title = title;
        }
        if let Some(description) = update.description {
            exercise.description = description;
        }
        if let Some(status) = update.status {
            exercise.status = status;
        }
        if let Some(max_participants) = update.max_participants {
            exercise.max_participants = max_participants;
        }

        db::exercises::save(&self.db, &exercise).await?;
        Ok(exercise)
    }

    /// Delete an exercise and everyone enrolled in it.
    pub async fn delete_exercise(&self, facilitator: Uuid, exercise_id: Uuid) -> Result<()> {
        let lock = self.exercise_lock(exercise_id);
        {
            let _guard = lock.lock().await;

            self.load_owned_exercise(exercise_id, facilitator).await?;

            let mut tx = self.db.begin().await?;
            db::participants::delete_by_exercise(&mut *tx, exercise_id).await?;
            db::exercises::delete(&mut *tx, exercise_id).await?;
            tx.commit().await?;

            info!("Deleted exercise {exercise_id}");
        }
        self.drop_exercise_lock(exercise_id);
        Ok(())
    }

    /// Append an inject at the end of the scenario.
    pub async fn add_inject(
        &self,
        facilitator: Uuid,
        exercise_id: Uuid,
        new: NewInject,
    ) -> Result<Inject> {
        let lock = self.exercise_lock(exercise_id);
        let _guard = lock.lock().await;

        let mut exercise = self.load_owned_exercise(exercise_id, facilitator).await?;
        let inject = new.into_inject(exercise.next_inject_number());
        exercise.injects.push(inject.clone());

        db::exercises::save(&self.db, &exercise).await?;
        Ok(inject)
    }

    /// Replace an inject's authored content. Lifecycle flags and numbering
    /// are preserved.
    pub async fn update_inject(
        &self,
        facilitator: Uuid,
        exercise_id: Uuid,
        inject_number: u32,
        update: NewInject,
    ) -> Result<Inject> {
        let lock = self.exercise_lock(exercise_id);
        let _guard = lock.lock().await;

        let mut exercise = self.load_owned_exercise(exercise_id, facilitator).await?;
        let inject = exercise
            .inject_mut(inject_number)
            .ok_or_else(|| Error::NotFound(format!("inject {inject_number}")))?;

        inject.title = update.title;
        inject.narrative = update.narrative;
        inject.artifacts = update.artifacts;
        inject.phases = update.phases;
        for (index, phase) in inject.phases.iter_mut().enumerate() {
            phase.phase_number = index as u32 + 1;
        }
        let inject = inject.clone();

        db::exercises::save(&self.db, &exercise).await?;
        Ok(inject)
    }

    /// Remove an inject and close the numbering gap.
    ///
    /// Refused while any recorded response references the inject, since
    /// renumbering would silently reattach those answers to a different
    /// inject.
    pub async fn delete_inject(
        &self,
        facilitator: Uuid,
        exercise_id: Uuid,
        inject_number: u32,
    ) -> Result<()> {
        let lock = self.exercise_lock(exercise_id);
        let _guard = lock.lock().await;

        let mut exercise = self.load_owned_exercise(exercise_id, facilitator).await?;
        if exercise.inject(inject_number).is_none() {
            return Err(Error::NotFound(format!("inject {inject_number}")));
        }

        let participants = db::participants::list_by_exercise(&self.db, exercise_id, None).await?;
        let referenced = participants
            .iter()
            .any(|p| p.responses.iter().any(|r| r.inject_number == inject_number));
        if referenced {
            return Err(Error::Conflict(format!(
                "inject {inject_number} has recorded responses; reset it first"
            )));
        }

        exercise.injects.retain(|i| i.inject_number != inject_number);
        exercise.renumber_injects();

        db::exercises::save(&self.db, &exercise).await?;
        Ok(())
    }

    /// Release an inject to the floor.
    ///
    /// Marks it active with responses open, and hard-cuts every active
    /// participant's cursor to its first phase regardless of where they
    /// were. Participants mid-way through an earlier inject lose their
    /// place; their recorded responses are untouched.
    pub async fn release_inject(
        &self,
        facilitator: Uuid,
        exercise_id: Uuid,
        inject_number: u32,
    ) -> Result<Inject> {
        let lock = self.exercise_lock(exercise_id);
        let _guard = lock.lock().await;

        let mut exercise = self.load_owned_exercise(exercise_id, facilitator).await?;
        let inject = exercise
            .inject_mut(inject_number)
            .ok_or_else(|| Error::NotFound(format!("inject {inject_number}")))?;

        if inject.is_active {
            return Err(Error::Conflict(format!(
                "inject {inject_number} is already released"
            )));
        }

        let now = Utc::now();
        inject.is_active = true;
        inject.responses_open = true;
        inject.release_time = Some(now);
        let released = inject.clone();

        let mut tx = self.db.begin().await?;
        db::exercises::save(&mut *tx, &exercise).await?;
        let moved = db::participants::advance_cursors(&mut *tx, exercise_id, inject_number).await?;
        tx.commit().await?;

        info!(
            "Released inject {inject_number} of exercise {exercise_id}, moved {moved} participants"
        );
        self.gateway.publish(
            Topic::Exercise(exercise_id),
            ExerciseEvent::InjectReleased {
                inject_number,
                inject: released.clone(),
                timestamp: now,
            },
        );
        Ok(released)
    }

    /// Set the submission gate on one inject.
    ///
    /// Idempotent: setting the current value is allowed and still
    /// broadcasts, so facilitator UIs can force a refresh.
    pub async fn toggle_responses(
        &self,
        facilitator: Uuid,
        exercise_id: Uuid,
        inject_number: u32,
        desired: bool,
    ) -> Result<bool> {
        let lock = self.exercise_lock(exercise_id);
        let _guard = lock.lock().await;

        let mut exercise = self.load_owned_exercise(exercise_id, facilitator).await?;
        let inject = exercise
            .inject_mut(inject_number)
            .ok_or_else(|| Error::NotFound(format!("inject {inject_number}")))?;

        inject.responses_open = desired;

        db::exercises::save(&self.db, &exercise).await?;
        self.gateway.publish(
            Topic::Exercise(exercise_id),
            ExerciseEvent::ResponsesToggled {
                inject_number,
                responses_open: desired,
                timestamp: Utc::now(),
            },
        );
        Ok(desired)
    }

    /// Set the phase-advance gate on one inject. Idempotent, same
    /// always-broadcast behavior as the submission gate.
    pub async fn toggle_phase_lock(
        &self,
        facilitator: Uuid,
        exercise_id: Uuid,
        inject_number: u32,
        desired: bool,
    ) -> Result<bool> {
        let lock = self.exercise_lock(exercise_id);
        let _guard = lock.lock().await;

        let mut exercise = self.load_owned_exercise(exercise_id, facilitator).await?;
        let inject = exercise
            .inject_mut(inject_number)
            .ok_or_else(|| Error::NotFound(format!("inject {inject_number}")))?;

        inject.phase_progression_locked = desired;

        db::exercises::save(&self.db, &exercise).await?;
        self.gateway.publish(
            Topic::Exercise(exercise_id),
            ExerciseEvent::PhaseProgressionToggled {
                inject_number,
                phase_progression_locked: desired,
                timestamp: Utc::now(),
            },
        );
        Ok(desired)
    }

    /// Rewind the whole exercise to its pre-release state.
    ///
    /// Clears every inject's lifecycle flags and wipes all participant
    /// progress and scores. Participants stay enrolled with their current
    /// status.
    pub async fn reset_exercise(&self, facilitator: Uuid, exercise_id: Uuid) -> Result<()> {
        let lock = self.exercise_lock(exercise_id);
        let _guard = lock.lock().await;

        let mut exercise = self.load_owned_exercise(exercise_id, facilitator).await?;
        for inject in &mut exercise.injects {
            inject.reset_state();
        }

        let mut tx = self.db.begin().await?;
        db::exercises::save(&mut *tx, &exercise).await?;
        db::participants::reset_all(&mut *tx, exercise_id).await?;
        tx.commit().await?;

        info!("Reset exercise {exercise_id}");
        self.gateway.publish(
            Topic::Exercise(exercise_id),
            ExerciseEvent::ExerciseReset {
                timestamp: Utc::now(),
            },
        );
        Ok(())
    }

    /// Rewind one inject: clear its lifecycle flags and strip every
    /// participant's responses to it, recomputing their totals from what
    /// remains. Responses to other injects are untouched.
    pub async fn reset_inject(
        &self,
        facilitator: Uuid,
        exercise_id: Uuid,
        inject_number: u32,
    ) -> Result<()> {
        let lock = self.exercise_lock(exercise_id);
        let _guard = lock.lock().await;

        let mut exercise = self.load_owned_exercise(exercise_id, facilitator).await?;
        let inject = exercise
            .inject_mut(inject_number)
            .ok_or_else(|| Error::NotFound(format!("inject {inject_number}")))?;
        inject.reset_state();

        let mut participants =
            db::participants::list_by_exercise(&self.db, exercise_id, None).await?;

        let mut tx = self.db.begin().await?;
        db::exercises::save(&mut *tx, &exercise).await?;
        for participant in &mut participants {
            let before = participant.responses.len();
            participant
                .responses
                .retain(|r| r.inject_number != inject_number);
            if participant.responses.len() != before {
                participant.recompute_total_score();
                db::participants::save(&mut *tx, participant).await?;
            }
        }
        tx.commit().await?;

        info!("Reset inject {inject_number} of exercise {exercise_id}");
        Ok(())
    }

    /// Change a participant's roster status.
    ///
    /// Admitting from the waiting room (`waiting` to `active`) also points
    /// their cursor at the first inject and notifies them on their private
    /// topic. The roster update goes to the exercise topic either way.
    pub async fn update_participant_status(
        &self,
        facilitator: Uuid,
        exercise_id: Uuid,
        participant_id: Uuid,
        status: ParticipantStatus,
    ) -> Result<Participant> {
        let lock = self.exercise_lock(exercise_id);
        let _guard = lock.lock().await;

        let exercise = self.load_owned_exercise(exercise_id, facilitator).await?;
        let mut participant = db::participants::load_in_exercise(
            &self.db,
            participant_id,
            exercise_id,
        )
        .await?
        .ok_or_else(|| Error::NotFound(format!("participant {participant_id}")))?;

        // Any transition into `active` counts as (re)admission: the whole
        // cursor pair restarts at the first phase of the first inject so a
        // readmitted participant never resumes at a phase index belonging
        // to a different inject, and the participant is told directly.
        let admitted =
            participant.status != ParticipantStatus::Active && status == ParticipantStatus::Active;
        participant.status = status;
        if admitted {
            participant.current_inject = 1;
            participant.current_phase = 1;
        }

        db::participants::save(&self.db, &participant).await?;

        let now = Utc::now();
        if admitted {
            self.gateway.publish(
                Topic::Participant(participant_id),
                ExerciseEvent::ParticipantAdmitted {
                    exercise_id,
                    exercise_title: exercise.title.clone(),
                    timestamp: now,
                },
            );
        }
        self.gateway.publish(
            Topic::Exercise(exercise_id),
            ExerciseEvent::ParticipantStatusUpdated {
                participant_id,
                status,
                participant: participant.summary(),
                timestamp: now,
            },
        );
        Ok(participant)
    }

    /// Remove a participant from the roster entirely, responses included.
    /// Clients learn of the removal on their next roster fetch.
    pub async fn remove_participant(
        &self,
        facilitator: Uuid,
        exercise_id: Uuid,
        participant_id: Uuid,
    ) -> Result<()> {
        let lock = self.exercise_lock(exercise_id);
        let _guard = lock.lock().await;

        self.load_owned_exercise(exercise_id, facilitator).await?;
        db::participants::load_in_exercise(&self.db, participant_id, exercise_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("participant {participant_id}")))?;

        db::participants::delete(&self.db, participant_id).await?;
        info!("Removed participant {participant_id} from exercise {exercise_id}");
        Ok(())
    }

    pub async fn list_participants(
        &self,
        facilitator: Uuid,
        exercise_id: Uuid,
        status: Option<ParticipantStatus>,
    ) -> Result<Vec<Participant>> {
        self.load_owned_exercise(exercise_id, facilitator).await?;
        db::participants::list_by_exercise(&self.db, exercise_id, status).await
    }

    /// Leaderboard over the active participants, highest total first.
    pub async fn scores(&self, facilitator: Uuid, exercise_id: Uuid) -> Result<Scoreboard> {
        self.load_owned_exercise(exercise_id, facilitator).await?;

        let participants = db::participants::list_by_exercise(
            &self.db,
            exercise_id,
            Some(ParticipantStatus::Active),
        )
        .await?;

        let mut entries: Vec<ScoreboardEntry> = participants
            .iter()
            .map(|p| ScoreboardEntry {
                participant_id: p.participant_id,
                name: p.name.clone(),
                team: p.team.clone(),
                total_score: p.total_score,
                inject_scores: inject_breakdown(p),
            })
            .collect();
        entries.sort_by(|a, b| b.total_score.cmp(&a.total_score));

        let average_score = if entries.is_empty() {
            0.0
        } else {
            entries.iter().map(|e| e.total_score as f64).sum::<f64>() / entries.len() as f64
        };

        Ok(Scoreboard {
            exercise_id,
            entries,
            average_score,
        })
    }

    /// Replace the post-exercise summary deck.
    pub async fn update_summary(
        &self,
        facilitator: Uuid,
        exercise_id: Uuid,
        summary: Vec<SummaryPhase>,
    ) -> Result<Vec<SummaryPhase>> {
        let lock = self.exercise_lock(exercise_id);
        let _guard = lock.lock().await;

        let mut exercise = self.load_owned_exercise(exercise_id, facilitator).await?;
        exercise.summary = summary;
        db::exercises::save(&self.db, &exercise).await?;
        Ok(exercise.summary)
    }
}

/// First segment of a v4 uuid, uppercased. Eight hex characters is short
/// enough to read aloud in a briefing while staying unique in practice;
/// the column's UNIQUE constraint backstops collisions.
fn generate_access_code() -> String {
    let id = Uuid::new_v4().to_string();
    id.split('-')
        .next()
        .unwrap_or(&id)
        .to_uppercase()
}

fn inject_breakdown(participant: &Participant) -> Vec<InjectScore> {
    let mut by_inject: Vec<InjectScore> = Vec::new();
    for response in &participant.responses {
        match by_inject
            .iter_mut()
            .find(|s| s.inject_number == response.inject_number)
        {
            Some(entry) => entry.points += response.points_earned,
            None => by_inject.push(InjectScore {
                inject_number: response.inject_number,
                points: response.points_earned,
            }),
        }
    }
    by_inject.sort_by_key(|s| s.inject_number);
    by_inject
}

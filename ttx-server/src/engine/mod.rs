//! Exercise progression engine
//!
//! All state transitions on exercises and participants go through here.
//! Each public operation validates against current persisted state,
//! applies the transition inside a transaction, and publishes the
//! resulting events through the broadcast gateway after commit.
//!
//! Mutations touching one exercise are serialized by a per-exercise
//! async mutex, so check-then-act sequences (capacity checks, duplicate
//! detection, release cursor cuts) cannot interleave. Publishing happens
//! while the lock is still held, which keeps the event order on a topic
//! identical to the commit order. Reads for display (snapshots, rosters,
//! scoreboards) skip the lock and see the last committed state.

mod facilitator;
mod participant;

pub use facilitator::{
    ExerciseUpdate, InjectScore, NewExercise, NewInject, Scoreboard, ScoreboardEntry,
};
pub use participant::{
    ExerciseSnapshot, JoinOutcome, JoinRequest, PhaseAdvance, SubmitOutcome, SubmitRequest,
};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use ttx_common::models::{Exercise, Participant};

use crate::broadcast::BroadcastGateway;
use crate::db;
use crate::error::{Error, Result};

/// Per-exercise async locks, created on first use
///
/// The outer std mutex only guards the map itself and is never held
/// across an await point.
struct ExerciseLocks {
    inner: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl ExerciseLocks {
    fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    fn for_exercise(&self, exercise_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().expect("lock map poisoned");
        map.entry(exercise_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    fn discard(&self, exercise_id: Uuid) {
        let mut map = self.inner.lock().expect("lock map poisoned");
        map.remove(&exercise_id);
    }
}

/// State transition engine shared by the API and session layers
pub struct Engine {
    db: Pool<Sqlite>,
    gateway: Arc<BroadcastGateway>,
    locks: ExerciseLocks,
}

impl Engine {
    pub fn new(db: Pool<Sqlite>, gateway: Arc<BroadcastGateway>) -> Self {
        Self {
            db,
            gateway,
            locks: ExerciseLocks::new(),
        }
    }

    pub fn db(&self) -> &Pool<Sqlite> {
        &self.db
    }

    pub fn gateway(&self) -> &Arc<BroadcastGateway> {
        &self.gateway
    }

    /// Load an exercise or report it missing.
    pub(crate) async fn load_exercise(&self, exercise_id: Uuid) -> Result<Exercise> {
        db::exercises::load(&self.db, exercise_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("exercise {exercise_id}")))
    }

    /// Load an exercise and verify the caller owns it.
    pub(crate) async fn load_owned_exercise(
        &self,
        exercise_id: Uuid,
        facilitator: Uuid,
    ) -> Result<Exercise> {
        let exercise = self.load_exercise(exercise_id).await?;
        if exercise.facilitator != facilitator {
            return Err(Error::NotAuthorized(format!(
                "exercise {exercise_id} belongs to another facilitator"
            )));
        }
        Ok(exercise)
    }

    /// Load a participant or report it missing.
    pub(crate) async fn load_participant(&self, participant_id: Uuid) -> Result<Participant> {
        db::participants::load(&self.db, participant_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("participant {participant_id}")))
    }

    pub(crate) fn exercise_lock(&self, exercise_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        self.locks.for_exercise(exercise_id)
    }

    pub(crate) fn drop_exercise_lock(&self, exercise_id: Uuid) {
        self.locks.discard(exercise_id);
    }
}

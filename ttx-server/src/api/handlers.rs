//! HTTP API request handlers
//!
//! Each handler decodes its request, delegates to one engine operation,
//! and encodes the result. Error mapping to HTTP status codes happens in
//! `Error::into_response`.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use ttx_common::models::{
    Exercise, Inject, Participant, ParticipantStatus, SummaryPhase,
};

use crate::db;
use crate::engine::{
    ExerciseSnapshot, ExerciseUpdate, JoinOutcome, JoinRequest, NewExercise, NewInject,
    PhaseAdvance, Scoreboard, SubmitOutcome, SubmitRequest,
};
use crate::error::{Error, Result};

use super::{AppContext, FacilitatorAuth};

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

// ============================================================================
// Facilitator: exercise authoring
// ============================================================================

/// POST /api/exercises
pub async fn create_exercise(
    State(ctx): State<AppContext>,
    FacilitatorAuth(facilitator): FacilitatorAuth,
    Json(body): Json<NewExercise>,
) -> Result<Json<Exercise>> {
    Ok(Json(ctx.engine.create_exercise(facilitator, body).await?))
}

/// GET /api/exercises/my
pub async fn list_exercises(
    State(ctx): State<AppContext>,
    FacilitatorAuth(facilitator): FacilitatorAuth,
) -> Result<Json<Vec<db::exercises::ExerciseListing>>> {
    Ok(Json(ctx.engine.list_exercises(facilitator).await?))
}

/// GET /api/exercises/:exercise_id
pub async fn get_exercise(
    State(ctx): State<AppContext>,
    FacilitatorAuth(facilitator): FacilitatorAuth,
    Path(exercise_id): Path<Uuid>,
) -> Result<Json<Exercise>> {
    Ok(Json(ctx.engine.get_exercise(facilitator, exercise_id).await?))
}

/// PUT /api/exercises/:exercise_id
pub async fn update_exercise(
    State(ctx): State<AppContext>,
    FacilitatorAuth(facilitator): FacilitatorAuth,
    Path(exercise_id): Path<Uuid>,
    Json(body): Json<ExerciseUpdate>,
) -> Result<Json<Exercise>> {
    Ok(Json(
        ctx.engine.update_exercise(facilitator, exercise_id, body).await?,
    ))
}

/// DELETE /api/exercises/:exercise_id
pub async fn delete_exercise(
    State(ctx): State<AppContext>,
    FacilitatorAuth(facilitator): FacilitatorAuth,
    Path(exercise_id): Path<Uuid>,
) -> Result<Json<Value>> {
    ctx.engine.delete_exercise(facilitator, exercise_id).await?;
    Ok(Json(json!({ "deleted": exercise_id })))
}

/// POST /api/exercises/:exercise_id/injects
pub async fn add_inject(
    State(ctx): State<AppContext>,
    FacilitatorAuth(facilitator): FacilitatorAuth,
    Path(exercise_id): Path<Uuid>,
    Json(body): Json<NewInject>,
) -> Result<Json<Inject>> {
    Ok(Json(
        ctx.engine.add_inject(facilitator, exercise_id, body).await?,
    ))
}

/// PUT /api/exercises/:exercise_id/injects/:inject_number
pub async fn update_inject(
    State(ctx): State<AppContext>,
    FacilitatorAuth(facilitator): FacilitatorAuth,
    Path((exercise_id, inject_number)): Path<(Uuid, u32)>,
    Json(body): Json<NewInject>,
) -> Result<Json<Inject>> {
    Ok(Json(
        ctx.engine
            .update_inject(facilitator, exercise_id, inject_number, body)
            .await?,
    ))
}

/// DELETE /api/exercises/:exercise_id/injects/:inject_number
pub async fn delete_inject(
    State(ctx): State<AppContext>,
    FacilitatorAuth(facilitator): FacilitatorAuth,
    Path((exercise_id, inject_number)): Path<(Uuid, u32)>,
) -> Result<Json<Value>> {
    ctx.engine
        .delete_inject(facilitator, exercise_id, inject_number)
        .await?;
    Ok(Json(json!({ "deleted_inject": inject_number })))
}

/// GET /api/exercises/:exercise_id/summary
pub async fn get_summary(
    State(ctx): State<AppContext>,
    FacilitatorAuth(facilitator): FacilitatorAuth,
    Path(exercise_id): Path<Uuid>,
) -> Result<Json<Vec<SummaryPhase>>> {
    let exercise = ctx.engine.get_exercise(facilitator, exercise_id).await?;
    Ok(Json(exercise.summary))
}

/// PUT /api/exercises/:exercise_id/summary
pub async fn update_summary(
    State(ctx): State<AppContext>,
    FacilitatorAuth(facilitator): FacilitatorAuth,
    Path(exercise_id): Path<Uuid>,
    Json(body): Json<Vec<SummaryPhase>>,
) -> Result<Json<Vec<SummaryPhase>>> {
    Ok(Json(
        ctx.engine.update_summary(facilitator, exercise_id, body).await?,
    ))
}

// ============================================================================
// Facilitator: live exercise control
// ============================================================================

/// Body carrying the target inject for a control action
#[derive(Debug, Deserialize)]
pub struct InjectTarget {
    pub inject_number: u32,
}

/// POST /api/exercises/:exercise_id/release-inject
pub async fn release_inject(
    State(ctx): State<AppContext>,
    FacilitatorAuth(facilitator): FacilitatorAuth,
    Path(exercise_id): Path<Uuid>,
    Json(body): Json<InjectTarget>,
) -> Result<Json<Inject>> {
    Ok(Json(
        ctx.engine
            .release_inject(facilitator, exercise_id, body.inject_number)
            .await?,
    ))
}

/// Body for the submission gate
#[derive(Debug, Deserialize)]
pub struct ToggleResponsesBody {
    pub inject_number: u32,
    pub responses_open: bool,
}

/// POST /api/exercises/:exercise_id/toggle-responses
pub async fn toggle_responses(
    State(ctx): State<AppContext>,
    FacilitatorAuth(facilitator): FacilitatorAuth,
    Path(exercise_id): Path<Uuid>,
    Json(body): Json<ToggleResponsesBody>,
) -> Result<Json<Value>> {
    let responses_open = ctx
        .engine
        .toggle_responses(facilitator, exercise_id, body.inject_number, body.responses_open)
        .await?;
    Ok(Json(json!({
        "inject_number": body.inject_number,
        "responses_open": responses_open,
    })))
}

/// Body for the phase-advance gate
#[derive(Debug, Deserialize)]
pub struct TogglePhaseLockBody {
    pub inject_number: u32,
    pub phase_progression_locked: bool,
}

/// POST /api/exercises/:exercise_id/toggle-phase-lock
pub async fn toggle_phase_lock(
    State(ctx): State<AppContext>,
    FacilitatorAuth(facilitator): FacilitatorAuth,
    Path(exercise_id): Path<Uuid>,
    Json(body): Json<TogglePhaseLockBody>,
) -> Result<Json<Value>> {
    let locked = ctx
        .engine
        .toggle_phase_lock(
            facilitator,
            exercise_id,
            body.inject_number,
            body.phase_progression_locked,
        )
        .await?;
    Ok(Json(json!({
        "inject_number": body.inject_number,
        "phase_progression_locked": locked,
    })))
}

/// POST /api/exercises/:exercise_id/reset
pub async fn reset_exercise(
    State(ctx): State<AppContext>,
    FacilitatorAuth(facilitator): FacilitatorAuth,
    Path(exercise_id): Path<Uuid>,
) -> Result<Json<Value>> {
    ctx.engine.reset_exercise(facilitator, exercise_id).await?;
    Ok(Json(json!({ "reset": exercise_id })))
}

/// POST /api/exercises/:exercise_id/reset-inject
pub async fn reset_inject(
    State(ctx): State<AppContext>,
    FacilitatorAuth(facilitator): FacilitatorAuth,
    Path(exercise_id): Path<Uuid>,
    Json(body): Json<InjectTarget>,
) -> Result<Json<Value>> {
    ctx.engine
        .reset_inject(facilitator, exercise_id, body.inject_number)
        .await?;
    Ok(Json(json!({ "reset_inject": body.inject_number })))
}

/// Optional roster filter
#[derive(Debug, Deserialize)]
pub struct RosterQuery {
    pub status: Option<ParticipantStatus>,
}

/// GET /api/exercises/:exercise_id/participants
pub async fn list_participants(
    State(ctx): State<AppContext>,
    FacilitatorAuth(facilitator): FacilitatorAuth,
    Path(exercise_id): Path<Uuid>,
    Query(query): Query<RosterQuery>,
) -> Result<Json<Vec<Participant>>> {
    Ok(Json(
        ctx.engine
            .list_participants(facilitator, exercise_id, query.status)
            .await?,
    ))
}

/// GET /api/exercises/:exercise_id/scores
pub async fn scores(
    State(ctx): State<AppContext>,
    FacilitatorAuth(facilitator): FacilitatorAuth,
    Path(exercise_id): Path<Uuid>,
) -> Result<Json<Scoreboard>> {
    Ok(Json(ctx.engine.scores(facilitator, exercise_id).await?))
}

/// Body for a roster status change
#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: ParticipantStatus,
}

/// PUT /api/participants/:participant_id/status
pub async fn update_participant_status(
    State(ctx): State<AppContext>,
    FacilitatorAuth(facilitator): FacilitatorAuth,
    Path(participant_id): Path<Uuid>,
    Json(body): Json<StatusUpdate>,
) -> Result<Json<Participant>> {
    let participant = db::participants::load(&ctx.db, participant_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("participant {participant_id}")))?;

    Ok(Json(
        ctx.engine
            .update_participant_status(
                facilitator,
                participant.exercise_id,
                participant_id,
                body.status,
            )
            .await?,
    ))
}

/// DELETE /api/participants/:participant_id
pub async fn remove_participant(
    State(ctx): State<AppContext>,
    FacilitatorAuth(facilitator): FacilitatorAuth,
    Path(participant_id): Path<Uuid>,
) -> Result<Json<Value>> {
    let participant = db::participants::load(&ctx.db, participant_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("participant {participant_id}")))?;

    ctx.engine
        .remove_participant(facilitator, participant.exercise_id, participant_id)
        .await?;
    Ok(Json(json!({ "removed": participant_id })))
}

// ============================================================================
// Participant endpoints
// ============================================================================

/// POST /api/participants/join
pub async fn join_exercise(
    State(ctx): State<AppContext>,
    Json(body): Json<JoinRequest>,
) -> Result<Json<JoinOutcome>> {
    Ok(Json(ctx.engine.join_exercise(body).await?))
}

/// GET /api/participants/:participant_id/snapshot
pub async fn exercise_snapshot(
    State(ctx): State<AppContext>,
    Path(participant_id): Path<Uuid>,
) -> Result<Json<ExerciseSnapshot>> {
    let participant = db::participants::load(&ctx.db, participant_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("participant {participant_id}")))?;

    Ok(Json(
        ctx.engine
            .exercise_snapshot(participant.exercise_id, participant_id)
            .await?,
    ))
}

/// POST /api/participants/submit-response
pub async fn submit_response(
    State(ctx): State<AppContext>,
    Json(body): Json<SubmitRequest>,
) -> Result<Json<SubmitOutcome>> {
    Ok(Json(ctx.engine.submit_response(body).await?))
}

/// Body identifying the participant advancing their own cursor
#[derive(Debug, Deserialize)]
pub struct NextPhaseRequest {
    pub participant_id: Uuid,
}

/// POST /api/participants/next-phase
pub async fn next_phase(
    State(ctx): State<AppContext>,
    Json(body): Json<NextPhaseRequest>,
) -> Result<Json<PhaseAdvance>> {
    Ok(Json(ctx.engine.advance_phase(body.participant_id).await?))
}

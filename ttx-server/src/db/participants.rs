//! Participant queries
//!
//! Response history is a JSON column owned by the participant row. Cursor
//! resets that touch many participants at once (inject release, exercise
//! reset) are single UPDATE statements so concurrent submissions cannot
//! observe a half-applied release.

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite, SqliteExecutor};
use uuid::Uuid;

use crate::db::exercises::parse_uuid;
use crate::error::{Error, Result};
use ttx_common::models::{Participant, ParticipantStatus};

fn participant_from_row(row: &SqliteRow) -> Result<Participant> {
    let id: String = row.get("participant_id");
    let exercise: String = row.get("exercise");
    let status: String = row.get("status");
    let responses: String = row.get("responses");

    Ok(Participant {
        participant_id: parse_uuid(&id)?,
        name: row.get("name"),
        team: row.get("team"),
        exercise_id: parse_uuid(&exercise)?,
        status: ParticipantStatus::parse(&status)
            .ok_or_else(|| Error::Internal(format!("unknown participant status '{status}'")))?,
        current_inject: row.get::<i64, _>("current_inject") as u32,
        current_phase: row.get::<i64, _>("current_phase") as u32,
        responses: serde_json::from_str(&responses)
            .map_err(|e| Error::Internal(format!("corrupt responses column: {e}")))?,
        total_score: row.get("total_score"),
        joined_at: row.get("joined_at"),
        last_activity: row.get("last_activity"),
    })
}

/// Insert a newly joined participant.
pub async fn create(exec: impl SqliteExecutor<'_>, participant: &Participant) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO participants
            (participant_id, name, team, exercise, status, current_inject,
             current_phase, responses, total_score, joined_at, last_activity)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(participant.participant_id.to_string())
    .bind(&participant.name)
    .bind(&participant.team)
    .bind(participant.exercise_id.to_string())
    .bind(participant.status.as_str())
    .bind(participant.current_inject as i64)
    .bind(participant.current_phase as i64)
    .bind(serde_json::to_string(&participant.responses).map_err(internal)?)
    .bind(participant.total_score)
    .bind(participant.joined_at)
    .bind(participant.last_activity)
    .execute(exec)
    .await?;

    Ok(())
}

/// Persist the whole participant row, stamping `last_activity`.
pub async fn save(exec: impl SqliteExecutor<'_>, participant: &Participant) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE participants
        SET name = ?, team = ?, status = ?, current_inject = ?,
            current_phase = ?, responses = ?, total_score = ?, last_activity = ?
        WHERE participant_id = ?
        "#,
    )
    .bind(&participant.name)
    .bind(&participant.team)
    .bind(participant.status.as_str())
    .bind(participant.current_inject as i64)
    .bind(participant.current_phase as i64)
    .bind(serde_json::to_string(&participant.responses).map_err(internal)?)
    .bind(participant.total_score)
    .bind(Utc::now())
    .bind(participant.participant_id.to_string())
    .execute(exec)
    .await?;

    Ok(())
}

/// Flip presence without rewriting the rest of the row.
///
/// Presence transitions own only these columns; a full-row save here
/// could erase a response committed between the caller's load and its
/// store.
pub async fn set_status(
    exec: impl SqliteExecutor<'_>,
    participant_id: Uuid,
    status: ParticipantStatus,
) -> Result<()> {
    sqlx::query("UPDATE participants SET status = ?, last_activity = ? WHERE participant_id = ?")
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(participant_id.to_string())
        .execute(exec)
        .await?;

    Ok(())
}

/// Stamp `last_activity` only.
pub async fn touch(exec: impl SqliteExecutor<'_>, participant_id: Uuid) -> Result<()> {
    sqlx::query("UPDATE participants SET last_activity = ? WHERE participant_id = ?")
        .bind(Utc::now())
        .bind(participant_id.to_string())
        .execute(exec)
        .await?;

    Ok(())
}

/// Load by durable participant identity.
pub async fn load(db: &Pool<Sqlite>, participant_id: Uuid) -> Result<Option<Participant>> {
    let row = sqlx::query("SELECT * FROM participants WHERE participant_id = ?")
        .bind(participant_id.to_string())
        .fetch_optional(db)
        .await?;

    row.as_ref().map(participant_from_row).transpose()
}

/// Load a participant scoped to one exercise.
pub async fn load_in_exercise(
    db: &Pool<Sqlite>,
    participant_id: Uuid,
    exercise_id: Uuid,
) -> Result<Option<Participant>> {
    let row = sqlx::query("SELECT * FROM participants WHERE participant_id = ? AND exercise = ?")
        .bind(participant_id.to_string())
        .bind(exercise_id.to_string())
        .fetch_optional(db)
        .await?;

    row.as_ref().map(participant_from_row).transpose()
}

/// All participants of an exercise, optionally filtered by status,
/// newest joiners first.
pub async fn list_by_exercise(
    db: &Pool<Sqlite>,
    exercise_id: Uuid,
    status: Option<ParticipantStatus>,
) -> Result<Vec<Participant>> {
    let rows = match status {
        Some(status) => {
            sqlx::query(
                "SELECT * FROM participants WHERE exercise = ? AND status = ? \
                 ORDER BY joined_at DESC",
            )
            .bind(exercise_id.to_string())
            .bind(status.as_str())
            .fetch_all(db)
            .await?
        }
        None => {
            sqlx::query("SELECT * FROM participants WHERE exercise = ? ORDER BY joined_at DESC")
                .bind(exercise_id.to_string())
                .fetch_all(db)
                .await?
        }
    };

    rows.iter().map(participant_from_row).collect()
}

/// Count of participants holding a capacity slot (`waiting` or `active`).
pub async fn count_capacity_slots(db: &Pool<Sqlite>, exercise_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM participants WHERE exercise = ? AND status IN ('waiting', 'active')",
    )
    .bind(exercise_id.to_string())
    .fetch_one(db)
    .await?;

    Ok(count)
}

/// Hard-cut every `active` participant's cursor to the released inject's
/// first phase. One conditional UPDATE, atomic with respect to readers.
pub async fn advance_cursors(
    exec: impl SqliteExecutor<'_>,
    exercise_id: Uuid,
    inject_number: u32,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE participants
        SET current_inject = ?, current_phase = 1, last_activity = ?
        WHERE exercise = ? AND status = 'active'
        "#,
    )
    .bind(inject_number as i64)
    .bind(Utc::now())
    .bind(exercise_id.to_string())
    .execute(exec)
    .await?;

    Ok(result.rows_affected())
}

/// Clear every participant of an exercise back to the pre-start state.
pub async fn reset_all(exec: impl SqliteExecutor<'_>, exercise_id: Uuid) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE participants
        SET responses = '[]', total_score = 0, current_inject = 1,
            current_phase = 1, last_activity = ?
        WHERE exercise = ?
        "#,
    )
    .bind(Utc::now())
    .bind(exercise_id.to_string())
    .execute(exec)
    .await?;

    Ok(())
}

/// Remove one participant (explicit facilitator delete).
pub async fn delete(exec: impl SqliteExecutor<'_>, participant_id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM participants WHERE participant_id = ?")
        .bind(participant_id.to_string())
        .execute(exec)
        .await?;

    Ok(())
}

/// Cascade delete for an exercise teardown.
pub async fn delete_by_exercise(exec: impl SqliteExecutor<'_>, exercise_id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM participants WHERE exercise = ?")
        .bind(exercise_id.to_string())
        .execute(exec)
        .await?;

    Ok(())
}

fn internal(e: serde_json::Error) -> Error {
    Error::Internal(format!("serialize participant: {e}"))
}

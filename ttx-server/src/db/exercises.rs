//! Exercise queries
//!
//! Injects and summary phases travel with their exercise row as JSON
//! columns; reads rehydrate the full aggregate, writes persist it whole.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite, SqliteExecutor};
use uuid::Uuid;

use crate::error::{Error, Result};
use ttx_common::models::{Exercise, ExerciseStatus};

/// Compact listing row for a facilitator's dashboard
#[derive(Debug, Clone, Serialize)]
pub struct ExerciseListing {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: ExerciseStatus,
    pub access_code: String,
    pub created_at: DateTime<Utc>,
}

fn exercise_from_row(row: &SqliteRow) -> Result<Exercise> {
    let id: String = row.get("guid");
    let facilitator: String = row.get("facilitator");
    let status: String = row.get("status");
    let injects: String = row.get("injects");
    let summary: String = row.get("summary");

    Ok(Exercise {
        id: parse_uuid(&id)?,
        title: row.get("title"),
        description: row.get("description"),
        facilitator: parse_uuid(&facilitator)?,
        access_code: row.get("access_code"),
        status: ExerciseStatus::parse(&status)
            .ok_or_else(|| Error::Internal(format!("unknown exercise status '{status}'")))?,
        max_participants: row.get::<i64, _>("max_participants") as u32,
        injects: serde_json::from_str(&injects)
            .map_err(|e| Error::Internal(format!("corrupt injects column: {e}")))?,
        summary: serde_json::from_str(&summary)
            .map_err(|e| Error::Internal(format!("corrupt summary column: {e}")))?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Internal(format!("invalid uuid '{s}': {e}")))
}

/// Insert a new exercise.
pub async fn create(exec: impl SqliteExecutor<'_>, exercise: &Exercise) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO exercises
            (guid, title, description, facilitator, access_code, status,
             max_participants, injects, summary, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(exercise.id.to_string())
    .bind(&exercise.title)
    .bind(&exercise.description)
    .bind(exercise.facilitator.to_string())
    .bind(&exercise.access_code)
    .bind(exercise.status.as_str())
    .bind(exercise.max_participants as i64)
    .bind(serde_json::to_string(&exercise.injects).map_err(internal)?)
    .bind(serde_json::to_string(&exercise.summary).map_err(internal)?)
    .bind(exercise.created_at)
    .bind(exercise.updated_at)
    .execute(exec)
    .await?;

    Ok(())
}

/// Persist the whole aggregate, stamping `updated_at`.
pub async fn save(exec: impl SqliteExecutor<'_>, exercise: &Exercise) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE exercises
        SET title = ?, description = ?, status = ?, max_participants = ?,
            injects = ?, summary = ?, updated_at = ?
        WHERE guid = ?
        "#,
    )
    .bind(&exercise.title)
    .bind(&exercise.description)
    .bind(exercise.status.as_str())
    .bind(exercise.max_participants as i64)
    .bind(serde_json::to_string(&exercise.injects).map_err(internal)?)
    .bind(serde_json::to_string(&exercise.summary).map_err(internal)?)
    .bind(Utc::now())
    .bind(exercise.id.to_string())
    .execute(exec)
    .await?;

    Ok(())
}

/// Load one exercise by id.
pub async fn load(db: &Pool<Sqlite>, id: Uuid) -> Result<Option<Exercise>> {
    let row = sqlx::query("SELECT * FROM exercises WHERE guid = ?")
        .bind(id.to_string())
        .fetch_optional(db)
        .await?;

    row.as_ref().map(exercise_from_row).transpose()
}

/// Resolve a human-typed access code (stored uppercased).
pub async fn load_by_access_code(db: &Pool<Sqlite>, code: &str) -> Result<Option<Exercise>> {
    let row = sqlx::query("SELECT * FROM exercises WHERE access_code = ?")
        .bind(code.to_uppercase())
        .fetch_optional(db)
        .await?;

    row.as_ref().map(exercise_from_row).transpose()
}

/// All exercises owned by one facilitator, newest first.
pub async fn list_by_facilitator(
    db: &Pool<Sqlite>,
    facilitator: Uuid,
) -> Result<Vec<ExerciseListing>> {
    let rows = sqlx::query(
        r#"
        SELECT guid, title, description, status, access_code, created_at
        FROM exercises
        WHERE facilitator = ?
        ORDER BY created_at DESC
        "#,
    )
    .bind(facilitator.to_string())
    .fetch_all(db)
    .await?;

    rows.iter()
        .map(|row| {
            let id: String = row.get("guid");
            let status: String = row.get("status");
            Ok(ExerciseListing {
                id: parse_uuid(&id)?,
                title: row.get("title"),
                description: row.get("description"),
                status: ExerciseStatus::parse(&status).ok_or_else(|| {
                    Error::Internal(format!("unknown exercise status '{status}'"))
                })?,
                access_code: row.get("access_code"),
                created_at: row.get("created_at"),
            })
        })
        .collect()
}

/// Delete one exercise row (participant cascade handled by the caller
/// inside the same transaction).
pub async fn delete(exec: impl SqliteExecutor<'_>, id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM exercises WHERE guid = ?")
        .bind(id.to_string())
        .execute(exec)
        .await?;

    Ok(())
}

fn internal(e: serde_json::Error) -> Error {
    Error::Internal(format!("serialize exercise: {e}"))
}

//! Database initialization
//!
//! Creates the connection pool and the required tables if missing, and
//! seeds a first facilitator identity on an empty install so the control
//! API is reachable out of the box.

use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

/// Open (or create) the SQLite database file and return a pool.
pub async fn create_pool(path: &Path) -> Result<Pool<Sqlite>> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    info!("Database opened at {}", path.display());
    Ok(pool)
}

/// Create all required tables and indexes.
pub async fn initialize_database(pool: &Pool<Sqlite>) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS exercises (
            guid TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            facilitator TEXT NOT NULL,
            access_code TEXT NOT NULL UNIQUE,
            status TEXT NOT NULL DEFAULT 'draft',
            max_participants INTEGER NOT NULL DEFAULT 50,
            injects TEXT NOT NULL DEFAULT '[]',
            summary TEXT NOT NULL DEFAULT '[]',
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS participants (
            participant_id TEXT PRIMARY KEY,
            name TEXT NOT NULL DEFAULT 'Anonymous',
            team TEXT NOT NULL DEFAULT 'Individual',
            exercise TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'waiting',
            current_inject INTEGER NOT NULL DEFAULT 1,
            current_phase INTEGER NOT NULL DEFAULT 1,
            responses TEXT NOT NULL DEFAULT '[]',
            total_score INTEGER NOT NULL DEFAULT 0,
            joined_at TIMESTAMP NOT NULL,
            last_activity TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_participants_exercise ON participants(exercise)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS facilitators (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            token TEXT NOT NULL UNIQUE,
            created_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Seed one facilitator identity when the table is empty.
///
/// The generated token is logged once; operators are expected to replace
/// it with real identities for production use.
pub async fn seed_default_facilitator(pool: &Pool<Sqlite>) -> Result<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM facilitators")
        .fetch_one(pool)
        .await?;

    if count == 0 {
        let token = Uuid::new_v4().to_string();
        let id = super::facilitators::create(pool, "default", &token).await?;
        warn!(
            "No facilitators found - seeded '{}' with token {}",
            id, token
        );
    }

    Ok(())
}

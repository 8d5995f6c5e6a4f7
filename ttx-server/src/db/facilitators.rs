//! Facilitator identity queries
//!
//! Thin token table backing the authorization collaborator: the API edge
//! resolves a bearer token to a facilitator id, and the engine compares
//! that id against exercise ownership. Credential management itself is
//! out of scope.

use chrono::Utc;
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::error::Result;

/// Resolve an opaque token to a facilitator id.
pub async fn lookup_token(db: &Pool<Sqlite>, token: &str) -> Result<Option<Uuid>> {
    let guid: Option<String> =
        sqlx::query_scalar("SELECT guid FROM facilitators WHERE token = ?")
            .bind(token)
            .fetch_optional(db)
            .await?;

    guid.map(|g| super::exercises::parse_uuid(&g)).transpose()
}

/// Register a facilitator identity with its bearer token.
pub async fn create(db: &Pool<Sqlite>, name: &str, token: &str) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO facilitators (guid, name, token, created_at) VALUES (?, ?, ?, ?)")
        .bind(id.to_string())
        .bind(name)
        .bind(token)
        .bind(Utc::now())
        .execute(db)
        .await?;

    Ok(id)
}

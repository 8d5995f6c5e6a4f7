//! HTTP API surface
//!
//! Axum router exposing the facilitator control endpoints, the participant
//! endpoints, and the SSE event stream. Handlers stay thin: decode the
//! request, call one engine operation, encode the result. All state
//! transition rules live in the engine.

pub mod handlers;
pub mod sse;

use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::routing::{delete, get, post, put};
use axum::Router;
use sqlx::{Pool, Sqlite};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::broadcast::BroadcastGateway;
use crate::db;
use crate::engine::Engine;
use crate::error::Error;
use crate::registry::SessionRegistry;

/// Shared application context passed to all handlers
///
/// AppContext implements Clone, which gives us `FromRef<AppContext>` for
/// free via Axum's blanket implementation, so custom extractors can
/// access state.
#[derive(Clone)]
pub struct AppContext {
    pub engine: Arc<Engine>,
    pub gateway: Arc<BroadcastGateway>,
    pub registry: Arc<SessionRegistry>,
    pub db: Pool<Sqlite>,
}

/// Authenticated facilitator id, resolved from the `X-Facilitator-Token`
/// header against the facilitators table.
pub struct FacilitatorAuth(pub Uuid);

#[async_trait]
impl FromRequestParts<AppContext> for FacilitatorAuth {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("x-facilitator-token")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| Error::NotAuthorized("missing facilitator token".to_string()))?;

        let facilitator = db::facilitators::lookup_token(&ctx.db, token)
            .await?
            .ok_or_else(|| Error::NotAuthorized("unknown facilitator token".to_string()))?;

        Ok(FacilitatorAuth(facilitator))
    }
}

/// Build the application router
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(handlers::health))
        // Facilitator: exercise authoring
        .route("/api/exercises", post(handlers::create_exercise))
        .route("/api/exercises/my", get(handlers::list_exercises))
        .route(
            "/api/exercises/:exercise_id",
            get(handlers::get_exercise)
                .put(handlers::update_exercise)
                .delete(handlers::delete_exercise),
        )
        .route(
            "/api/exercises/:exercise_id/injects",
            post(handlers::add_inject),
        )
        .route(
            "/api/exercises/:exercise_id/injects/:inject_number",
            put(handlers::update_inject).delete(handlers::delete_inject),
        )
        .route(
            "/api/exercises/:exercise_id/summary",
            get(handlers::get_summary).put(handlers::update_summary),
        )
        // Facilitator: live exercise control
        .route(
            "/api/exercises/:exercise_id/release-inject",
            post(handlers::release_inject),
        )
        .route(
            "/api/exercises/:exercise_id/toggle-responses",
            post(handlers::toggle_responses),
        )
        .route(
            "/api/exercises/:exercise_id/toggle-phase-lock",
            post(handlers::toggle_phase_lock),
        )
        .route("/api/exercises/:exercise_id/reset", post(handlers::reset_exercise))
        .route(
            "/api/exercises/:exercise_id/reset-inject",
            post(handlers::reset_inject),
        )
        .route(
            "/api/exercises/:exercise_id/participants",
            get(handlers::list_participants),
        )
        .route("/api/exercises/:exercise_id/scores", get(handlers::scores))
        .route(
            "/api/participants/:participant_id",
            delete(handlers::remove_participant),
        )
        .route(
            "/api/participants/:participant_id/status",
            put(handlers::update_participant_status),
        )
        // Participant endpoints
        .route("/api/participants/join", post(handlers::join_exercise))
        .route(
            "/api/participants/:participant_id/snapshot",
            get(handlers::exercise_snapshot),
        )
        .route(
            "/api/participants/submit-response",
            post(handlers::submit_response),
        )
        .route("/api/participants/next-phase", post(handlers::next_phase))
        // SSE event stream
        .route("/api/events", get(sse::event_stream))
        // Attach application context
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        // Enable CORS for browser clients on other origins
        .layer(CorsLayer::permissive())
}

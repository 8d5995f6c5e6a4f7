//! Server-Sent Events endpoint
//!
//! Streams exercise events to connected clients. A session subscribes to
//! an exercise topic, a participant topic, or both; the two streams are
//! merged into one SSE connection. Participant sessions are registered in
//! the session registry so presence flips on attach and detach.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{select_all, Stream, StreamExt};
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::broadcast::Topic;
use crate::error::{Error, Result};
use crate::registry::SessionRegistry;

use super::AppContext;

/// Topics requested for one event stream
#[derive(Debug, Deserialize)]
pub struct StreamParams {
    pub exercise: Option<Uuid>,
    pub participant: Option<Uuid>,
}

/// Detach notifier tied to the stream's lifetime
///
/// The SSE stream owns this guard; when the client disconnects axum drops
/// the stream, and the guard reports the session to the registry from a
/// spawned task (Drop cannot await).
struct SessionGuard {
    registry: Arc<SessionRegistry>,
    session_id: Uuid,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let registry = self.registry.clone();
        let session_id = self.session_id;
        tokio::spawn(async move {
            registry.unbind(session_id).await;
        });
    }
}

/// GET /api/events - SSE event stream
pub async fn event_stream(
    State(ctx): State<AppContext>,
    Query(params): Query<StreamParams>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let mut topics = Vec::new();
    if let Some(exercise_id) = params.exercise {
        topics.push(Topic::Exercise(exercise_id));
    }
    if let Some(participant_id) = params.participant {
        topics.push(Topic::Participant(participant_id));
    }
    if topics.is_empty() {
        return Err(Error::InvalidState(
            "event stream needs an exercise or participant parameter".to_string(),
        ));
    }

    // Subscribe before registering presence so the session cannot miss
    // its own Reconnected event.
    let receivers: Vec<_> = topics
        .iter()
        .map(|&topic| BroadcastStream::new(ctx.gateway.subscribe(topic)))
        .collect();

    let guard = match params.participant {
        Some(participant_id) => {
            let session_id = ctx.registry.bind(participant_id).await?;
            Some(SessionGuard {
                registry: ctx.registry.clone(),
                session_id,
            })
        }
        None => None,
    };

    debug!("SSE client connected for {} topic(s)", topics.len());

    let stream = async_stream::stream! {
        let _guard = guard;
        let mut events = select_all(receivers);
        while let Some(result) = events.next().await {
            match result {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => {
                        yield Ok(Event::default().event(event.event_type()).data(json));
                    }
                    Err(e) => warn!("Failed to serialize event: {e}"),
                },
                Err(e) => {
                    // Subscriber fell behind the channel buffer; the
                    // client reconciles from a snapshot on reconnect.
                    warn!("SSE stream lagged: {e}");
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    ))
}

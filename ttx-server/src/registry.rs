//! Session registry
//!
//! Tracks which live event stream belongs to which participant and drives
//! the presence transitions on attach and detach. A participant can hold
//! several concurrent sessions (two browser tabs); the participant only
//! turns `left` when the last one goes away.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::engine::Engine;
use crate::error::Result;

/// Live session bookkeeping over the engine's presence transitions
pub struct SessionRegistry {
    engine: Arc<Engine>,
    sessions: Mutex<HashMap<Uuid, Uuid>>,
}

impl SessionRegistry {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Register a new session for a participant. Returns the session id
    /// the stream hands back on disconnect.
    pub async fn bind(&self, participant_id: Uuid) -> Result<Uuid> {
        let session_id = Uuid::new_v4();
        let first = {
            let mut sessions = self.sessions.lock().await;
            let first = !sessions.values().any(|p| *p == participant_id);
            sessions.insert(session_id, participant_id);
            first
        };

        if first {
            self.engine.mark_connected(participant_id).await?;
        }
        debug!("Session {session_id} bound to participant {participant_id}");
        Ok(session_id)
    }

    /// Drop a session. When it was the participant's last one, the engine
    /// records the disconnect.
    pub async fn unbind(&self, session_id: Uuid) {
        let last_of = {
            let mut sessions = self.sessions.lock().await;
            let Some(participant_id) = sessions.remove(&session_id) else {
                return;
            };
            if sessions.values().any(|p| *p == participant_id) {
                None
            } else {
                Some(participant_id)
            }
        };

        if let Some(participant_id) = last_of {
            if let Err(e) = self.engine.mark_disconnected(participant_id).await {
                warn!("Failed to record disconnect for participant {participant_id}: {e}");
            }
        }
    }

    /// Number of live sessions (diagnostics).
    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

//! Session updater helper for link maintenance.
//!
//! This module provides `SessionUpdater` which abstracts the
//! "find → update → save" pattern used when one session's change has to be
//! mirrored on a related session (parent/child links).

use std::sync::Arc;

use cadence_core::error::{CadenceError, Result};
use cadence_core::session::{Session, SessionRepository};

/// How often a link update is re-applied after losing a revision race.
const MAX_CONFLICT_RETRIES: usize = 3;

/// Helper struct for updating sessions with a common pattern.
///
/// `SessionUpdater` encapsulates:
/// 1. Loading a session from storage
/// 2. Applying updates
/// 3. Updating the timestamp
/// 4. Writing back with a revision check, reloading and re-applying on conflict
///
/// Only use it for idempotent edits. The step cycle in
/// [`OrchestrationService`](crate::OrchestrationService) must not retry:
/// there the second writer has to fail.
pub struct SessionUpdater {
    repository: Arc<dyn SessionRepository>,
}

impl SessionUpdater {
    pub fn new(repository: Arc<dyn SessionRepository>) -> Self {
        Self { repository }
    }

    /// Loads a session or fails with `NotFound`.
    pub async fn load(&self, session_id: &str) -> Result<Session> {
        self.repository
            .find_by_id(session_id)
            .await?
            .ok_or_else(|| CadenceError::not_found("Session", session_id))
    }

    /// Applies `updater` to the stored session and writes it back.
    ///
    /// `updater` returns whether it changed anything; an unchanged session is
    /// not written.
    pub async fn update<F>(&self, session_id: &str, mut updater: F) -> Result<Session>
    where
        F: FnMut(&mut Session) -> Result<bool>,
    {
        tracing::debug!("[SessionUpdater] update() called for session_id: {}", session_id);

        let mut attempt = 0;
        loop {
            let mut session = self.load(session_id).await?;
            if !updater(&mut session)? {
                return Ok(session);
            }
            session.touch();

            match self.repository.update(&session).await {
                Ok(stored) => {
                    tracing::debug!(
                        "[SessionUpdater] Session saved: id={}, revision={}",
                        stored.id,
                        stored.revision
                    );
                    return Ok(stored);
                }
                Err(e) if e.is_conflict() && attempt < MAX_CONFLICT_RETRIES => {
                    attempt += 1;
                    tracing::debug!(
                        "[SessionUpdater] Conflict on {}, retrying ({}/{})",
                        session_id,
                        attempt,
                        MAX_CONFLICT_RETRIES
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }
}

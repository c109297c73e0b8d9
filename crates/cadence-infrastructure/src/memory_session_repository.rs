//! In-memory SessionRepository, used by tests and ephemeral CLI runs.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use cadence_core::error::{CadenceError, Result};
use cadence_core::session::{Session, SessionRepository};

/// Keeps sessions in a map guarded by one lock. The revision check and the
/// write happen under the same write guard.
#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn find_by_id(&self, session_id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn insert(&self, session: &Session) -> Result<Session> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.id) {
            return Err(CadenceError::data_access(format!(
                "Session '{}' already exists",
                session.id
            )));
        }
        let mut stored = session.clone();
        stored.revision = 1;
        sessions.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn update(&self, session: &Session) -> Result<Session> {
        let mut sessions = self.sessions.write().await;
        let current = sessions
            .get_mut(&session.id)
            .ok_or_else(|| CadenceError::not_found("Session", &session.id))?;
        if current.revision != session.revision {
            return Err(CadenceError::Conflict {
                session_id: session.id.clone(),
                expected: session.revision,
                actual: current.revision,
            });
        }
        let mut stored = session.clone();
        stored.revision = current.revision + 1;
        *current = stored.clone();
        Ok(stored)
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        self.sessions.write().await.remove(session_id);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Session>> {
        let mut sessions: Vec<Session> = self.sessions.read().await.values().cloned().collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::session::SubjectRefs;
    use cadence_core::workflow::WorkflowType;

    #[tokio::test]
    async fn test_revision_checked_update() {
        let repo = InMemorySessionRepository::new();
        let session = Session::new("t", WorkflowType::ContextReview, SubjectRefs::component("p", "c"));

        let stored = repo.insert(&session).await.unwrap();
        let updated = repo.update(&stored).await.unwrap();
        assert_eq!(updated.revision, 2);

        let err = repo.update(&stored).await.unwrap_err();
        assert!(err.is_conflict());
    }
}

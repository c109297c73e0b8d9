//! Session repository trait.
//!
//! Defines the interface for session persistence operations.

use super::model::Session;
use crate::error::Result;
use async_trait::async_trait;

/// An abstract repository for managing session persistence.
///
/// The durable store is the single synchronization point for the engine:
/// writes are revision-checked so that two callers advancing the same
/// session cannot both succeed.
///
/// # Implementation Notes
///
/// Implementations must:
/// - Compare the stored revision with `session.revision` inside one
///   atomic read-modify-write and reject mismatches with
///   `CadenceError::Conflict`
/// - Increment the revision on every successful write
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Finds a session by its ID.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Session))`: Session found
    /// - `Ok(None)`: Session not found
    /// - `Err(_)`: Error occurred during retrieval
    async fn find_by_id(&self, session_id: &str) -> Result<Option<Session>>;

    /// Stores a brand new session.
    ///
    /// Returns the stored copy (with its first revision). Fails if a session
    /// with the same ID already exists.
    async fn insert(&self, session: &Session) -> Result<Session>;

    /// Replaces a stored session if nobody else wrote it since it was loaded.
    ///
    /// # Returns
    ///
    /// - `Ok(Session)`: The stored copy with its new revision
    /// - `Err(CadenceError::Conflict)`: The stored revision differs from `session.revision`
    /// - `Err(CadenceError::NotFound)`: The session does not exist
    async fn update(&self, session: &Session) -> Result<Session>;

    /// Deletes a session from storage.
    ///
    /// Succeeds if the session didn't exist.
    async fn delete(&self, session_id: &str) -> Result<()>;

    /// Lists all stored sessions.
    async fn list_all(&self) -> Result<Vec<Session>>;

    /// Lists sessions owned by a tenant, oldest first.
    async fn list_by_tenant(&self, tenant_id: &str) -> Result<Vec<Session>> {
        let mut sessions: Vec<Session> = self
            .list_all()
            .await?
            .into_iter()
            .filter(|s| s.tenant_id == tenant_id)
            .collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(sessions)
    }
}

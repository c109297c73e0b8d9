use serde::{Deserialize, Serialize};

use super::model::Session;

/// What happened to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEventKind {
    Created,
    Updated,
    Deleted,
}

/// "Session changed" notification payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub event: SessionEventKind,
    pub session: Session,
}

impl SessionEvent {
    pub fn created(session: Session) -> Self {
        Self {
            event: SessionEventKind::Created,
            session,
        }
    }

    pub fn updated(session: Session) -> Self {
        Self {
            event: SessionEventKind::Updated,
            session,
        }
    }

    pub fn deleted(session: Session) -> Self {
        Self {
            event: SessionEventKind::Deleted,
            session,
        }
    }
}

/// Publish side of the session notification bus.
///
/// Events are keyed by tenant so subscribers only observe their own sessions.
/// Publishing is fire-and-forget: a bus with no subscribers drops the event.
pub trait SessionEventPublisher: Send + Sync {
    fn publish(&self, tenant_id: &str, event: SessionEvent);
}

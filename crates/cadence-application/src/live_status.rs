//! Ephemeral progress side channel for commands still executing.
//!
//! Entries are keyed by interaction id, held in memory only and removed
//! when the interaction's result is submitted. Nothing in the engine reads
//! them back; they exist for observers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, broadcast};

const UPDATE_CAPACITY: usize = 128;

/// Latest progress report for one in-flight interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveStatus {
    pub interaction_id: String,
    pub session_id: String,
    /// Short phase description, e.g. "compiling" or "running tests"
    pub message: String,
    /// Timestamp of the report (ISO 8601 format)
    pub reported_at: String,
}

/// Change notification emitted by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveStatusUpdate {
    Reported(LiveStatus),
    Cleared { interaction_id: String },
}

pub struct LiveStatusRegistry {
    entries: RwLock<HashMap<String, LiveStatus>>,
    updates: broadcast::Sender<LiveStatusUpdate>,
}

impl Default for LiveStatusRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveStatusRegistry {
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);
        Self {
            entries: RwLock::new(HashMap::new()),
            updates,
        }
    }

    /// Records `message` as the current phase of `interaction_id`, replacing
    /// any previous report.
    pub async fn report(
        &self,
        session_id: impl Into<String>,
        interaction_id: impl Into<String>,
        message: impl Into<String>,
    ) -> LiveStatus {
        let status = LiveStatus {
            interaction_id: interaction_id.into(),
            session_id: session_id.into(),
            message: message.into(),
            reported_at: chrono::Utc::now().to_rfc3339(),
        };
        self.entries
            .write()
            .await
            .insert(status.interaction_id.clone(), status.clone());
        let _ = self.updates.send(LiveStatusUpdate::Reported(status.clone()));
        status
    }

    pub async fn get(&self, interaction_id: &str) -> Option<LiveStatus> {
        self.entries.read().await.get(interaction_id).cloned()
    }

    /// Reports for every in-flight interaction of a session.
    pub async fn for_session(&self, session_id: &str) -> Vec<LiveStatus> {
        self.entries
            .read()
            .await
            .values()
            .filter(|status| status.session_id == session_id)
            .cloned()
            .collect()
    }

    /// Drops the entry for `interaction_id`. Returns whether one existed.
    pub async fn clear(&self, interaction_id: &str) -> bool {
        let removed = self.entries.write().await.remove(interaction_id).is_some();
        if removed {
            let _ = self.updates.send(LiveStatusUpdate::Cleared {
                interaction_id: interaction_id.to_string(),
            });
        }
        removed
    }

    /// Drops every entry of a session.
    pub async fn clear_session(&self, session_id: &str) {
        let cleared: Vec<String> = {
            let mut entries = self.entries.write().await;
            let ids: Vec<String> = entries
                .values()
                .filter(|status| status.session_id == session_id)
                .map(|status| status.interaction_id.clone())
                .collect();
            for id in &ids {
                entries.remove(id);
            }
            ids
        };
        for interaction_id in cleared {
            let _ = self.updates.send(LiveStatusUpdate::Cleared { interaction_id });
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveStatusUpdate> {
        self.updates.subscribe()
    }
}

//! Session domain model.
//!
//! This module contains the core Session entity that represents one
//! persisted workflow run in the application's domain layer.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::state::StateMap;
use crate::interaction::Interaction;
use crate::step::StepId;
use crate::workflow::WorkflowType;

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionStatus {
    /// Still accepting commands.
    Active,
    /// The terminal step succeeded.
    Complete,
    /// Failed manually or by exhausting a retry loop.
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Complete | SessionStatus::Failed)
    }
}

/// References to the business entities a session works on.
///
/// These identifiers are opaque to the engine; steps only use them to name
/// branches, files and child sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubjectRefs {
    /// Project the session belongs to
    pub project_id: String,
    /// Component (or context) the session works on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_id: Option<String>,
    /// Human-readable name of the component, used for paths and branches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Components a context-level session fans out to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub component_ids: Vec<String>,
}

impl SubjectRefs {
    /// Subject naming a single component.
    pub fn component(project_id: impl Into<String>, component_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            component_id: Some(component_id.into()),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_component_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.component_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// The most specific label available: name, then component id, then project id.
    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .or(self.component_id.as_deref())
            .unwrap_or(&self.project_id)
    }

    /// Filesystem and branch friendly form of [`label`](Self::label).
    pub fn slug(&self) -> String {
        let mut slug = String::with_capacity(self.label().len());
        let mut last_sep = true;
        for ch in self.label().chars() {
            if ch.is_ascii_alphanumeric() {
                // CamelCase boundaries become separators
                if ch.is_ascii_uppercase() && !last_sep && !slug.is_empty() {
                    slug.push('_');
                }
                slug.push(ch.to_ascii_lowercase());
                last_sep = false;
            } else if !last_sep {
                slug.push('_');
                last_sep = true;
            }
        }
        while slug.ends_with('_') {
            slug.pop();
        }
        if slug.is_empty() {
            "session".to_string()
        } else {
            slug
        }
    }
}

/// Persisted state-machine instance for one workflow run.
///
/// A session is mutated only through the orchestration façade. Its
/// interactions are append-only and every interaction except possibly the
/// last one is completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier (UUID format)
    pub id: String,
    /// Tenant that owns the session
    pub tenant_id: String,
    /// Selects the orchestrator and step set
    pub workflow_type: WorkflowType,
    pub status: SessionStatus,
    /// Accumulated values steps pass forward to later steps
    #[serde(default)]
    pub state: StateMap,
    /// Ordered command/result history
    #[serde(default)]
    pub interactions: Vec<Interaction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_session_id: Option<String>,
    #[serde(default)]
    pub child_session_ids: Vec<String>,
    pub subject: SubjectRefs,
    /// Timestamp when the session was created (ISO 8601 format)
    pub created_at: String,
    /// Timestamp when the session was last updated (ISO 8601 format)
    pub updated_at: String,
    /// Incremented by the repository on every successful write
    #[serde(default)]
    pub revision: u64,
}

impl Session {
    /// Creates a new active session with no history.
    pub fn new(tenant_id: impl Into<String>, workflow_type: WorkflowType, subject: SubjectRefs) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            workflow_type,
            status: SessionStatus::Active,
            state: StateMap::new(),
            interactions: Vec::new(),
            parent_session_id: None,
            child_session_ids: Vec::new(),
            subject,
            created_at: now.clone(),
            updated_at: now,
            revision: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn last_interaction(&self) -> Option<&Interaction> {
        self.interactions.last()
    }

    /// The most recent interaction that carries a result.
    pub fn last_completed_interaction(&self) -> Option<&Interaction> {
        self.interactions.iter().rev().find(|i| i.is_completed())
    }

    /// The outstanding interaction awaiting a result, if any.
    pub fn pending_interaction(&self) -> Option<&Interaction> {
        self.interactions.last().filter(|i| i.is_pending())
    }

    pub fn find_interaction(&self, interaction_id: &str) -> Option<&Interaction> {
        self.interactions.iter().find(|i| i.id == interaction_id)
    }

    pub fn find_interaction_mut(&mut self, interaction_id: &str) -> Option<&mut Interaction> {
        self.interactions.iter_mut().find(|i| i.id == interaction_id)
    }

    /// Step ids in the order they were issued.
    pub fn step_history(&self) -> Vec<StepId> {
        self.interactions.iter().map(|i| i.step_id).collect()
    }

    /// How many times `step` has been issued in this session.
    pub fn attempts(&self, step: StepId) -> u32 {
        self.interactions.iter().filter(|i| i.step_id == step).count() as u32
    }

    /// Order value for the next appended interaction.
    pub fn next_inserted_order(&self) -> u64 {
        self.interactions
            .last()
            .map(|i| i.inserted_order + 1)
            .unwrap_or(0)
    }

    /// Reads a string value from the state map.
    pub fn state_str(&self, key: &str) -> Option<&str> {
        self.state.get(key).and_then(Value::as_str)
    }

    /// Records a child link. Returns `false` if the child was already linked.
    pub fn add_child(&mut self, child_id: impl Into<String>) -> bool {
        let child_id = child_id.into();
        if self.child_session_ids.contains(&child_id) {
            return false;
        }
        self.child_session_ids.push(child_id);
        true
    }

    /// Drops a child link. Returns `false` if the child was not linked.
    pub fn remove_child(&mut self, child_id: &str) -> bool {
        let before = self.child_session_ids.len();
        self.child_session_ids.retain(|id| id != child_id);
        before != self.child_session_ids.len()
    }

    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}

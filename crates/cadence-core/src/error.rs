//! Error types for the Cadence engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::step::StepId;

/// Domain transition errors returned by an orchestrator.
///
/// These are ordinary values: the caller decides how to surface them
/// (typically as "this session cannot proceed").
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum TransitionError {
    /// The workflow's terminal step has already succeeded.
    #[error("session is complete")]
    SessionComplete,

    /// A known step reported a status that has no transition.
    #[error("no transition for step '{step}' with status '{status}'")]
    InvalidState { step: StepId, status: String },

    /// The last interaction refers to a step outside this workflow.
    #[error("step '{step}' does not belong to workflow '{workflow}'")]
    InvalidInteraction { step: StepId, workflow: String },
}

/// Failures raised by a step while building a command or reading a result.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepError {
    /// Session state the step depends on has not been written yet.
    #[error("step '{step}' requires session state '{key}'")]
    MissingState { step: StepId, key: String },

    /// The session has no child sessions to aggregate.
    #[error("step '{step}' requires at least one child session")]
    MissingChildren { step: StepId },

    /// A child session has not produced the value the parent aggregates.
    #[error("child session '{child_id}' has no '{key}' in its state")]
    MissingChildState { child_id: String, key: String },

    /// The session subject lacks a reference the step needs.
    #[error("step '{step}' requires subject reference '{field}'")]
    MissingSubject { step: StepId, field: String },

    /// The command attached to the interaction is not shaped as the step expects.
    #[error("malformed command for step '{step}': {message}")]
    MalformedCommand { step: StepId, message: String },
}

/// A shared error type for the Cadence workspace.
#[derive(Error, Debug, Clone)]
pub enum CadenceError {
    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// The orchestrator refused to advance the session
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// A step could not produce a command or interpret a result
    #[error(transparent)]
    Step(#[from] StepError),

    /// Another writer advanced the session first
    #[error("Session '{session_id}' was modified concurrently (expected revision {expected}, found {actual})")]
    Conflict {
        session_id: String,
        expected: u64,
        actual: u64,
    },

    /// A command is still awaiting its result
    #[error("Session '{session_id}' already has pending interaction '{interaction_id}'")]
    PendingInteraction {
        session_id: String,
        interaction_id: String,
    },

    /// The interaction does not exist in the session
    #[error("Interaction '{interaction_id}' does not belong to session '{session_id}'")]
    InteractionNotFound {
        session_id: String,
        interaction_id: String,
    },

    /// The interaction already carries a result
    #[error("Interaction '{interaction_id}' has already been completed")]
    InteractionAlreadyCompleted { interaction_id: String },

    /// The interaction is not the session's pending slot
    #[error("Interaction '{interaction_id}' is not the pending interaction of session '{session_id}'")]
    InteractionNotPending {
        session_id: String,
        interaction_id: String,
    },

    /// A retry loop hit the configured attempt cap
    #[error("Step '{step}' reached the maximum of {max_attempts} attempts")]
    RetryLimitExceeded { step: StepId, max_attempts: u32 },

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization { format: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data access error (repository/storage layer)
    #[error("Data access error: {0}")]
    DataAccess(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CadenceError {
    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates a DataAccess error
    pub fn data_access(message: impl Into<String>) -> Self {
        Self::DataAccess(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a concurrent modification error
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Check if the session refused to advance because it is finished
    pub fn is_session_complete(&self) -> bool {
        matches!(self, Self::Transition(TransitionError::SessionComplete))
    }
}

impl From<std::io::Error> for CadenceError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for CadenceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for CadenceError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for CadenceError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, CadenceError>`.
pub type Result<T> = std::result::Result<T, CadenceError>;

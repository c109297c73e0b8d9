//! Data Transfer Objects (DTOs) for persistence.
//!
//! These DTOs are the on-disk schema of a session file. They are private to
//! the infrastructure layer so the domain model can evolve independently of
//! the storage format.
//!
//! TOML has no null, so the free-form JSON parts of a session (state map,
//! command payloads, metadata, result data) are stored as JSON strings.
//!
//! ### Session Version History
//! - **1.0.0**: Initial schema

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use cadence_core::command::{Command, CommandPayload, CommandResult, ExecutionMode, ResultStatus};
use cadence_core::error::CadenceError;
use cadence_core::interaction::Interaction;
use cadence_core::session::{Session, SessionStatus, StateMap, SubjectRefs};
use cadence_core::step::StepId;
use cadence_core::workflow::WorkflowType;

/// Current schema version of [`SessionDTO`].
pub const SESSION_SCHEMA_VERSION: &str = "1.0.0";

/// Persisted form of a session.
///
/// Scalar fields come first so the serialized document keeps plain keys
/// ahead of its tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDTO {
    pub schema_version: String,
    pub id: String,
    pub tenant_id: String,
    pub workflow_type: WorkflowType,
    pub status: SessionStatus,
    pub revision: u64,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_session_id: Option<String>,
    #[serde(default)]
    pub child_session_ids: Vec<String>,
    /// JSON object
    #[serde(default = "empty_object")]
    pub state: String,
    pub subject: SubjectRefs,
    #[serde(default)]
    pub interactions: Vec<InteractionDTO>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionDTO {
    pub id: String,
    pub step_id: StepId,
    pub inserted_order: u64,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    pub command: CommandDTO,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultDTO>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandDTO {
    pub execution_mode: ExecutionMode,
    /// `text` or `structured`
    pub payload_kind: String,
    /// Raw text, or a JSON object for structured payloads
    pub payload: String,
    /// JSON object
    #[serde(default = "empty_object")]
    pub metadata: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultDTO {
    pub status: ResultStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// JSON object
    #[serde(default = "empty_object")]
    pub data: String,
}

fn empty_object() -> String {
    "{}".to_string()
}

fn to_json(map: &Map<String, Value>) -> Result<String, CadenceError> {
    Ok(serde_json::to_string(map)?)
}

fn from_json(field: &str, raw: &str) -> Result<Map<String, Value>, CadenceError> {
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        other => Err(CadenceError::Serialization {
            format: "JSON".to_string(),
            message: format!("'{}' must be a JSON object, found {}", field, other),
        }),
    }
}

impl TryFrom<&Session> for SessionDTO {
    type Error = CadenceError;

    fn try_from(session: &Session) -> Result<Self, Self::Error> {
        Ok(Self {
            schema_version: SESSION_SCHEMA_VERSION.to_string(),
            id: session.id.clone(),
            tenant_id: session.tenant_id.clone(),
            workflow_type: session.workflow_type,
            status: session.status,
            revision: session.revision,
            created_at: session.created_at.clone(),
            updated_at: session.updated_at.clone(),
            parent_session_id: session.parent_session_id.clone(),
            child_session_ids: session.child_session_ids.clone(),
            state: to_json(&session.state)?,
            subject: session.subject.clone(),
            interactions: session
                .interactions
                .iter()
                .map(InteractionDTO::try_from)
                .collect::<Result<_, _>>()?,
        })
    }
}

impl TryFrom<&Interaction> for InteractionDTO {
    type Error = CadenceError;

    fn try_from(interaction: &Interaction) -> Result<Self, Self::Error> {
        let command = &interaction.command;
        let (payload_kind, payload) = match &command.payload {
            CommandPayload::Text(text) => ("text", text.clone()),
            CommandPayload::Structured(map) => ("structured", to_json(map)?),
        };
        let result = interaction
            .result
            .as_ref()
            .map(|result| -> Result<ResultDTO, CadenceError> {
                Ok(ResultDTO {
                    status: result.status,
                    error_message: result.error_message.clone(),
                    data: to_json(&result.data)?,
                })
            })
            .transpose()?;

        Ok(Self {
            id: interaction.id.clone(),
            step_id: interaction.step_id,
            inserted_order: interaction.inserted_order,
            created_at: interaction.created_at.clone(),
            completed_at: interaction.completed_at.clone(),
            command: CommandDTO {
                execution_mode: command.execution_mode,
                payload_kind: payload_kind.to_string(),
                payload,
                metadata: to_json(&command.metadata)?,
            },
            result,
        })
    }
}

impl InteractionDTO {
    fn into_domain(self, session_id: &str) -> Result<Interaction, CadenceError> {
        let payload = match self.command.payload_kind.as_str() {
            "text" => CommandPayload::Text(self.command.payload),
            "structured" => CommandPayload::Structured(from_json("command.payload", &self.command.payload)?),
            other => {
                return Err(CadenceError::Serialization {
                    format: "TOML".to_string(),
                    message: format!("unknown payload kind '{}' in interaction {}", other, self.id),
                });
            }
        };
        let result = self
            .result
            .map(|dto| -> Result<CommandResult, CadenceError> {
                Ok(CommandResult {
                    status: dto.status,
                    data: from_json("result.data", &dto.data)?,
                    error_message: dto.error_message,
                })
            })
            .transpose()?;

        Ok(Interaction {
            id: self.id,
            session_id: session_id.to_string(),
            step_id: self.step_id,
            command: Command {
                step_id: self.step_id,
                payload,
                metadata: from_json("command.metadata", &self.command.metadata)?,
                execution_mode: self.command.execution_mode,
            },
            result,
            inserted_order: self.inserted_order,
            created_at: self.created_at,
            completed_at: self.completed_at,
        })
    }
}

impl SessionDTO {
    /// Converts the stored form back into the domain model.
    pub fn into_domain(self) -> Result<Session, CadenceError> {
        if self.schema_version != SESSION_SCHEMA_VERSION {
            return Err(CadenceError::Serialization {
                format: "TOML".to_string(),
                message: format!(
                    "unsupported session schema version '{}' (expected '{}')",
                    self.schema_version, SESSION_SCHEMA_VERSION
                ),
            });
        }

        let state: StateMap = from_json("state", &self.state)?;
        let interactions = self
            .interactions
            .into_iter()
            .map(|dto| dto.into_domain(&self.id))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Session {
            id: self.id,
            tenant_id: self.tenant_id,
            workflow_type: self.workflow_type,
            status: self.status,
            state,
            interactions,
            parent_session_id: self.parent_session_id,
            child_session_ids: self.child_session_ids,
            subject: self.subject,
            created_at: self.created_at,
            updated_at: self.updated_at,
            revision: self.revision,
        })
    }
}

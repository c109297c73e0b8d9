//! Command and result value types.
//!
//! A [`Command`] describes what an external driver should run next; a
//! [`CommandResult`] describes what happened when it did. Both are immutable
//! once attached to an interaction.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::step::StepId;

/// How the external environment should execute a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExecutionMode {
    /// Run the payload as an opaque command line.
    Shell,
    /// Hand the payload to a coding agent as a structured call.
    Agent,
}

/// Body of a command: plain text or a structured instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CommandPayload {
    Text(String),
    Structured(Map<String, Value>),
}

impl CommandPayload {
    /// Returns the text body, if this is a text payload.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CommandPayload::Text(text) => Some(text),
            CommandPayload::Structured(_) => None,
        }
    }

    /// Returns the structured body, if this is a structured payload.
    pub fn as_structured(&self) -> Option<&Map<String, Value>> {
        match self {
            CommandPayload::Text(_) => None,
            CommandPayload::Structured(map) => Some(map),
        }
    }
}

/// What to run next for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// The step that produced this command
    pub step_id: StepId,
    /// The instruction itself
    pub payload: CommandPayload,
    /// Free-form hints for the driver (paths, branch names, options)
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Subprocess vs. agent invocation
    pub execution_mode: ExecutionMode,
}

impl Command {
    /// Creates a shell command line.
    pub fn shell(step_id: StepId, command_line: impl Into<String>) -> Self {
        Self {
            step_id,
            payload: CommandPayload::Text(command_line.into()),
            metadata: Map::new(),
            execution_mode: ExecutionMode::Shell,
        }
    }

    /// Creates an agent prompt.
    pub fn agent(step_id: StepId, prompt: impl Into<String>) -> Self {
        Self {
            step_id,
            payload: CommandPayload::Text(prompt.into()),
            metadata: Map::new(),
            execution_mode: ExecutionMode::Agent,
        }
    }

    /// Creates an agent call with a structured instruction.
    pub fn structured(step_id: StepId, instruction: Map<String, Value>) -> Self {
        Self {
            step_id,
            payload: CommandPayload::Structured(instruction),
            metadata: Map::new(),
            execution_mode: ExecutionMode::Agent,
        }
    }

    /// Adds a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Reads a string metadata entry.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }
}

/// Outcome status reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResultStatus {
    Ok,
    Error,
}

/// What happened when a command was executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub status: ResultStatus,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl CommandResult {
    /// A successful result with no data.
    pub fn ok() -> Self {
        Self {
            status: ResultStatus::Ok,
            data: Map::new(),
            error_message: None,
        }
    }

    /// A failed result carrying a message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ResultStatus::Error,
            data: Map::new(),
            error_message: Some(message.into()),
        }
    }

    /// Adds a data entry.
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == ResultStatus::Ok
    }

    /// Reads a string data entry.
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    /// Best human-readable description of a failure.
    ///
    /// Falls back to `data.output` and finally to a generic message.
    pub fn failure_text(&self) -> String {
        self.error_message
            .clone()
            .or_else(|| self.data_str("output").map(str::to_string))
            .unwrap_or_else(|| "command failed without an error message".to_string())
    }

    /// Rewrites this result as a failure, keeping its data.
    pub fn into_error(mut self, message: impl Into<String>) -> Self {
        self.status = ResultStatus::Error;
        self.error_message = Some(message.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_payload_serializes_with_kind_tag() {
        let command = Command::shell(StepId::RunTests, "cargo test");
        let json = serde_json::to_value(&command).unwrap();
        assert_eq!(json["payload"]["kind"], "text");
        assert_eq!(json["payload"]["value"], "cargo test");
        assert_eq!(json["execution_mode"], "shell");
        assert_eq!(json["step_id"], "run_tests");
    }

    #[test]
    fn failure_text_prefers_error_message() {
        let result = CommandResult::error("boom").with_data("output", "stack trace");
        assert_eq!(result.failure_text(), "boom");

        let mut result = CommandResult::ok().with_data("output", "stack trace");
        result.status = ResultStatus::Error;
        assert_eq!(result.failure_text(), "stack trace");
    }

    #[test]
    fn result_deserializes_without_optional_fields() {
        let result: CommandResult = serde_json::from_str(r#"{"status":"ok"}"#).unwrap();
        assert!(result.is_ok());
        assert!(result.data.is_empty());
        assert!(result.error_message.is_none());
    }
}

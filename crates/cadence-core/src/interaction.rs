//! Interaction: one command/result pair within a session.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::command::{Command, CommandResult, ResultStatus};
use crate::step::StepId;

/// One step's command and (once completed) its result.
///
/// An interaction is created pending and completed exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    /// Unique interaction identifier (UUID format)
    pub id: String,
    /// Owning session
    pub session_id: String,
    /// The step that produced the command
    pub step_id: StepId,
    pub command: Command,
    /// Absent while the command is still executing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<CommandResult>,
    /// Position within the session, starting at 0
    pub inserted_order: u64,
    /// Timestamp when the command was issued (ISO 8601 format)
    pub created_at: String,
    /// Timestamp when the result was attached (ISO 8601 format)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

impl Interaction {
    /// Creates a pending interaction for `command`.
    pub fn pending(session_id: impl Into<String>, command: Command, inserted_order: u64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            step_id: command.step_id,
            command,
            result: None,
            inserted_order,
            created_at: chrono::Utc::now().to_rfc3339(),
            completed_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.result.is_none()
    }

    pub fn is_completed(&self) -> bool {
        self.result.is_some()
    }

    /// Status of the attached result, if any.
    pub fn status(&self) -> Option<ResultStatus> {
        self.result.as_ref().map(|result| result.status)
    }

    /// Attaches the result. Returns `false` if one was already attached.
    pub fn complete(&mut self, result: CommandResult) -> bool {
        if self.result.is_some() {
            return false;
        }
        self.result = Some(result);
        self.completed_at = Some(chrono::Utc::now().to_rfc3339());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completes_only_once() {
        let command = Command::agent(StepId::GenerateTests, "write tests");
        let mut interaction = Interaction::pending("session-1", command, 0);
        assert!(interaction.is_pending());
        assert_eq!(interaction.step_id, StepId::GenerateTests);

        assert!(interaction.complete(CommandResult::ok()));
        assert!(interaction.is_completed());
        assert!(interaction.completed_at.is_some());

        assert!(!interaction.complete(CommandResult::error("late")));
        assert_eq!(interaction.status(), Some(ResultStatus::Ok));
    }
}

use serde_json::Value;

use super::keys;
use crate::command::CommandResult;
use crate::error::{CadenceError, Result};
use crate::session::{Session, SessionStatus, StateMap, merge_state};

/// What a step derived from a result.
///
/// `result` is the annotated result that gets attached to the interaction;
/// a step may downgrade an `ok` it cannot accept to an `error`.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub state_updates: StateMap,
    pub status: Option<SessionStatus>,
    /// Replace the state map instead of overlaying it
    pub reset_state: bool,
    pub result: CommandResult,
}

impl StepOutcome {
    /// Outcome with no state changes.
    pub fn new(result: CommandResult) -> Self {
        Self {
            state_updates: StateMap::new(),
            status: None,
            reset_state: false,
            result,
        }
    }

    /// Default bookkeeping: record failures under `error`, clear it on success.
    pub fn recording(result: CommandResult) -> Self {
        let mut outcome = Self::new(result);
        if outcome.result.is_ok() {
            outcome.state_updates.insert(keys::ERROR.to_string(), Value::Null);
        } else {
            let text = outcome.result.failure_text();
            outcome.state_updates.insert(keys::ERROR.to_string(), Value::String(text));
        }
        outcome
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.state_updates.insert(key.into(), value.into());
        self
    }

    /// Schedules removal of `key`.
    pub fn remove(mut self, key: impl Into<String>) -> Self {
        self.state_updates.insert(key.into(), Value::Null);
        self
    }

    pub fn with_status(mut self, status: SessionStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn reset(mut self) -> Self {
        self.reset_state = true;
        self
    }

    /// Downgrades the result to an error and records why.
    pub fn reject(mut self, message: impl Into<String>) -> Self {
        let message = message.into();
        self.result = self.result.into_error(message.clone());
        self.state_updates
            .insert(keys::ERROR.to_string(), Value::String(message));
        self
    }

    /// Attaches the result to the pending interaction and applies the state
    /// and status changes to `session`.
    ///
    /// A terminal status is never overwritten.
    pub fn apply(self, session: &mut Session, interaction_id: &str) -> Result<()> {
        let session_id = session.id.clone();
        let interaction = session.find_interaction_mut(interaction_id).ok_or_else(|| {
            CadenceError::InteractionNotFound {
                session_id: session_id.clone(),
                interaction_id: interaction_id.to_string(),
            }
        })?;
        if !interaction.complete(self.result) {
            return Err(CadenceError::InteractionAlreadyCompleted {
                interaction_id: interaction_id.to_string(),
            });
        }

        if self.reset_state {
            session.state = StateMap::new();
        }
        merge_state(&mut session.state, self.state_updates);

        if let Some(status) = self.status {
            if !session.status.is_terminal() {
                session.status = status;
            }
        }
        session.touch();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::interaction::Interaction;
    use crate::session::SubjectRefs;
    use crate::step::StepId;
    use crate::workflow::WorkflowType;

    fn pending_session() -> (Session, String) {
        let mut session = Session::new("t", WorkflowType::ComponentTesting, SubjectRefs::component("p", "c"));
        session.state.insert("branch_name".into(), "test-c".into());
        let interaction = Interaction::pending(&session.id, Command::shell(StepId::Finalize, "git commit"), 0);
        let id = interaction.id.clone();
        session.interactions.push(interaction);
        (session, id)
    }

    #[test]
    fn apply_attaches_result_and_merges_state() {
        let (mut session, id) = pending_session();
        StepOutcome::recording(CommandResult::ok())
            .set("committed_at", "now")
            .with_status(SessionStatus::Complete)
            .apply(&mut session, &id)
            .unwrap();

        assert_eq!(session.status, SessionStatus::Complete);
        assert_eq!(session.state_str("branch_name"), Some("test-c"));
        assert_eq!(session.state_str("committed_at"), Some("now"));
        assert!(session.interactions[0].is_completed());
    }

    #[test]
    fn apply_twice_is_rejected() {
        let (mut session, id) = pending_session();
        StepOutcome::new(CommandResult::ok()).apply(&mut session, &id).unwrap();
        let err = StepOutcome::new(CommandResult::ok())
            .apply(&mut session, &id)
            .unwrap_err();
        assert!(matches!(err, CadenceError::InteractionAlreadyCompleted { .. }));
    }

    #[test]
    fn reset_replaces_state() {
        let (mut session, id) = pending_session();
        StepOutcome::new(CommandResult::ok())
            .reset()
            .set("started_at", "t1")
            .apply(&mut session, &id)
            .unwrap();
        assert_eq!(session.state.len(), 1);
        assert_eq!(session.state_str("started_at"), Some("t1"));
    }

    #[test]
    fn reject_downgrades_the_result() {
        let outcome = StepOutcome::recording(CommandResult::ok()).reject("children still running");
        assert!(!outcome.result.is_ok());
        assert_eq!(outcome.state_updates["error"], "children still running");
    }

    #[test]
    fn terminal_status_is_sticky() {
        let (mut session, id) = pending_session();
        session.status = SessionStatus::Failed;
        StepOutcome::new(CommandResult::ok())
            .with_status(SessionStatus::Complete)
            .apply(&mut session, &id)
            .unwrap();
        assert_eq!(session.status, SessionStatus::Failed);
    }
}

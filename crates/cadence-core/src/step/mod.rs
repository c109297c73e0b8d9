//! Step contract and the concrete steps shared by every workflow.
//!
//! A step turns the current session into a [`Command`] and interprets the
//! [`CommandResult`] the driver reports back into session-state updates.
//! Steps are stateless: everything they need arrives through
//! [`StepContext`].

mod coding;
mod design;
mod finalize;
mod initialize;
pub mod keys;
mod outcome;
mod review;
mod spawn;
mod testing;

pub use coding::{GenerateImplementation, GenerateTests};
pub use design::{DesignKind, GenerateDesign, ReviseDesign, ValidateDesign};
pub use finalize::{AggregateFinalize, Finalize};
pub use initialize::Initialize;
pub use outcome::StepOutcome;
pub use review::ExecuteReview;
pub use spawn::{SpawnComponentSessions, current_children};
pub use testing::{FixTestFailures, RunTests};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::command::{Command, CommandResult};
use crate::error::StepError;
use crate::interaction::Interaction;
use crate::session::{Scope, Session};

/// Closed set of step identifiers across all workflows.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StepId {
    Initialize,
    GenerateComponentDesign,
    GenerateContextDesign,
    ValidateDesign,
    ReviseDesign,
    GenerateImplementation,
    GenerateTests,
    RunTests,
    FixTestFailures,
    SpawnComponentSessions,
    ExecuteReview,
    Finalize,
}

/// Caller-supplied knobs for command generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepOptions {
    /// Agent the driver should hand agent-mode commands to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    /// Command line used by test-running steps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_command: Option<String>,
    /// Copied verbatim into command metadata under `options`
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl StepOptions {
    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    pub fn with_test_command(mut self, command: impl Into<String>) -> Self {
        self.test_command = Some(command.into());
        self
    }

    /// Fills unset fields from `defaults`.
    pub fn or(mut self, defaults: &StepOptions) -> Self {
        if self.agent.is_none() {
            self.agent = defaults.agent.clone();
        }
        if self.test_command.is_none() {
            self.test_command = defaults.test_command.clone();
        }
        for (key, value) in &defaults.extra {
            self.extra.entry(key.clone()).or_insert_with(|| value.clone());
        }
        self
    }
}

/// Everything a step may read.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub scope: &'a Scope,
    pub session: &'a Session,
    /// Snapshots of the session's child sessions, in link order
    pub children: &'a [Session],
    pub options: &'a StepOptions,
}

impl<'a> StepContext<'a> {
    pub fn new(scope: &'a Scope, session: &'a Session, children: &'a [Session], options: &'a StepOptions) -> Self {
        Self {
            scope,
            session,
            children,
            options,
        }
    }

    /// Reads a required string from the session state.
    pub fn require_state(&self, step: StepId, key: &str) -> Result<&'a str, StepError> {
        self.session.state_str(key).ok_or_else(|| StepError::MissingState {
            step,
            key: key.to_string(),
        })
    }

    /// Stamps the common metadata every command carries.
    pub(crate) fn decorate(&self, mut command: Command) -> Command {
        command
            .metadata
            .insert("session_id".to_string(), Value::String(self.session.id.clone()));
        command.metadata.insert(
            "workflow_type".to_string(),
            Value::String(self.session.workflow_type.to_string()),
        );
        if let Some(component_id) = &self.session.subject.component_id {
            command
                .metadata
                .insert("component_id".to_string(), Value::String(component_id.clone()));
        }
        if let Some(agent) = &self.options.agent {
            command
                .metadata
                .insert("agent".to_string(), Value::String(agent.clone()));
        }
        if !self.options.extra.is_empty() {
            command
                .metadata
                .insert("options".to_string(), Value::Object(self.options.extra.clone()));
        }
        command
    }
}

/// Per-step logic: produce a command, interpret its result.
///
/// `get_command` must be a pure function of the context. `handle_result`
/// never fails because the command failed: an error result is captured
/// into session state. Only malformed commands are reported as errors.
pub trait Step: Send + Sync {
    fn id(&self) -> StepId;

    fn get_command(&self, ctx: &StepContext<'_>) -> Result<Command, StepError>;

    fn handle_result(
        &self,
        ctx: &StepContext<'_>,
        interaction: &Interaction,
        result: CommandResult,
    ) -> Result<StepOutcome, StepError>;
}

/// Quotes a value for inclusion in a POSIX shell command line.
pub(crate) fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-' | ':' | '='));
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

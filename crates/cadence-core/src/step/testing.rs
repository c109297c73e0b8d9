use serde_json::Value;

use super::{Step, StepContext, StepId, StepOutcome, keys};
use crate::command::{Command, CommandResult};
use crate::error::StepError;
use crate::interaction::Interaction;

/// Used when neither the caller nor the configuration names a test command.
pub const DEFAULT_TEST_COMMAND: &str = "cargo test";

/// Runs the project's test command.
///
/// Success clears `test_failures` and stamps `tests_passed_at`; failure
/// stores the failure output as `test_failures` for [`FixTestFailures`].
#[derive(Debug, Clone, Copy)]
pub struct RunTests;

impl Step for RunTests {
    fn id(&self) -> StepId {
        StepId::RunTests
    }

    fn get_command(&self, ctx: &StepContext<'_>) -> Result<Command, StepError> {
        let command_line = ctx
            .options
            .test_command
            .clone()
            .unwrap_or_else(|| DEFAULT_TEST_COMMAND.to_string());
        let mut command = Command::shell(self.id(), command_line);
        for key in [keys::OUTPUT_PATH, keys::IMPLEMENTATION_PATH] {
            if let Some(path) = ctx.session.state_str(key) {
                command = command.with_metadata(key, path);
            }
        }
        Ok(ctx.decorate(command))
    }

    fn handle_result(
        &self,
        _ctx: &StepContext<'_>,
        _interaction: &Interaction,
        result: CommandResult,
    ) -> Result<StepOutcome, StepError> {
        if result.is_ok() {
            return Ok(StepOutcome::recording(result)
                .remove(keys::TEST_FAILURES)
                .set(keys::TESTS_PASSED_AT, chrono::Utc::now().to_rfc3339()));
        }
        let failures = result.failure_text();
        Ok(StepOutcome::recording(result).set(keys::TEST_FAILURES, failures))
    }
}

/// Asks the agent to fix the failures the last test run reported.
#[derive(Debug, Clone, Copy)]
pub struct FixTestFailures;

impl Step for FixTestFailures {
    fn id(&self) -> StepId {
        StepId::FixTestFailures
    }

    fn get_command(&self, ctx: &StepContext<'_>) -> Result<Command, StepError> {
        let failures = ctx.require_state(self.id(), keys::TEST_FAILURES)?;
        let mut prompt = format!("The test run failed:\n\n{failures}\n\n");
        match (
            ctx.session.state_str(keys::OUTPUT_PATH),
            ctx.session.state_str(keys::IMPLEMENTATION_PATH),
        ) {
            (Some(tests), None) => prompt.push_str(&format!(
                "Fix the tests in `{tests}`. Do not change the code under test."
            )),
            (_, Some(implementation)) => prompt.push_str(&format!(
                "Fix `{implementation}` so the tests pass. Do not weaken the tests."
            )),
            (None, None) => prompt.push_str("Fix the code so the tests pass."),
        }
        Ok(ctx.decorate(Command::agent(self.id(), prompt)))
    }

    fn handle_result(
        &self,
        ctx: &StepContext<'_>,
        _interaction: &Interaction,
        result: CommandResult,
    ) -> Result<StepOutcome, StepError> {
        let attempts = ctx
            .session
            .state
            .get(keys::FIX_ATTEMPTS)
            .and_then(Value::as_u64)
            .unwrap_or(0);
        Ok(StepOutcome::recording(result).set(keys::FIX_ATTEMPTS, attempts + 1))
    }
}

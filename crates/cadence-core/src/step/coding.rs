use super::design::{design_path, written_path};
use super::{Step, StepContext, StepId, StepOutcome, keys};
use crate::command::{Command, CommandResult};
use crate::error::StepError;
use crate::interaction::Interaction;

/// Asks the agent to implement the component from its design.
/// Writes `implementation_path`.
#[derive(Debug, Clone, Copy)]
pub struct GenerateImplementation;

impl Step for GenerateImplementation {
    fn id(&self) -> StepId {
        StepId::GenerateImplementation
    }

    fn get_command(&self, ctx: &StepContext<'_>) -> Result<Command, StepError> {
        let path = format!("src/{}.rs", ctx.session.subject.slug());
        let design = design_path(ctx);
        let prompt = format!(
            "Implement `{}` in `{}` following the design document at `{}`.\nKeep the public API exactly as designed and make the existing tests pass.",
            ctx.session.subject.label(),
            path,
            design
        );
        Ok(ctx.decorate(
            Command::agent(self.id(), prompt)
                .with_metadata(keys::IMPLEMENTATION_PATH, path)
                .with_metadata(keys::DESIGN_PATH, design),
        ))
    }

    fn handle_result(
        &self,
        _ctx: &StepContext<'_>,
        interaction: &Interaction,
        result: CommandResult,
    ) -> Result<StepOutcome, StepError> {
        if !result.is_ok() {
            return Ok(StepOutcome::recording(result));
        }
        let path = written_path(self.id(), interaction, &result, keys::IMPLEMENTATION_PATH)?;
        Ok(StepOutcome::recording(result).set(keys::IMPLEMENTATION_PATH, path))
    }
}

/// Asks the agent to write tests for the component. Writes `output_path`.
#[derive(Debug, Clone, Copy)]
pub struct GenerateTests;

impl Step for GenerateTests {
    fn id(&self) -> StepId {
        StepId::GenerateTests
    }

    fn get_command(&self, ctx: &StepContext<'_>) -> Result<Command, StepError> {
        let path = format!("tests/{}_test.rs", ctx.session.subject.slug());
        let design = design_path(ctx);
        let prompt = format!(
            "Write tests for `{}` in `{}`.\nDerive the test cases from the design document at `{}`; cover every public function and its error cases.",
            ctx.session.subject.label(),
            path,
            design
        );
        Ok(ctx.decorate(
            Command::agent(self.id(), prompt)
                .with_metadata(keys::OUTPUT_PATH, path)
                .with_metadata(keys::DESIGN_PATH, design),
        ))
    }

    fn handle_result(
        &self,
        _ctx: &StepContext<'_>,
        interaction: &Interaction,
        result: CommandResult,
    ) -> Result<StepOutcome, StepError> {
        if !result.is_ok() {
            return Ok(StepOutcome::recording(result));
        }
        let path = written_path(self.id(), interaction, &result, keys::OUTPUT_PATH)?;
        Ok(StepOutcome::recording(result).set(keys::OUTPUT_PATH, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::test_support::{run, session};
    use crate::workflow::WorkflowType;

    #[test]
    fn generate_tests_writes_output_path() {
        let session = session(WorkflowType::ComponentTesting);
        let outcome = run(&GenerateTests, &session, &[], CommandResult::ok());
        assert_eq!(outcome.state_updates["output_path"], "tests/accounts_user_repo_test.rs");
        assert!(outcome.state_updates["error"].is_null());
    }

    #[test]
    fn generate_implementation_failure_keeps_state_untouched() {
        let session = session(WorkflowType::ComponentCoding);
        let outcome = run(&GenerateImplementation, &session, &[], CommandResult::error("agent crashed"));
        assert!(!outcome.state_updates.contains_key("implementation_path"));
        assert_eq!(outcome.state_updates["error"], "agent crashed");
    }
}

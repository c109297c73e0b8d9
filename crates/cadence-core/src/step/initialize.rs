use serde_json::Value;

use super::{Step, StepContext, StepId, StepOutcome, keys, shell_quote};
use crate::command::{Command, CommandResult};
use crate::error::StepError;
use crate::interaction::Interaction;

/// Prepares a working branch for the session.
///
/// Writes `branch_name` and `started_at` on success.
#[derive(Debug, Clone, Copy)]
pub struct Initialize {
    /// Prefix identifying the kind of work on the branch (e.g. `design`, `test`)
    pub branch_prefix: &'static str,
}

impl Initialize {
    pub fn branch_name(&self, ctx: &StepContext<'_>) -> String {
        format!(
            "{}-{}",
            self.branch_prefix,
            ctx.session.subject.slug().replace('_', "-")
        )
    }
}

impl Step for Initialize {
    fn id(&self) -> StepId {
        StepId::Initialize
    }

    fn get_command(&self, ctx: &StepContext<'_>) -> Result<Command, StepError> {
        let branch = self.branch_name(ctx);
        let quoted = shell_quote(&branch);
        let command_line =
            format!("git fetch --quiet origin && (git switch {quoted} 2>/dev/null || git switch -c {quoted})");
        Ok(ctx.decorate(
            Command::shell(StepId::Initialize, command_line)
                .with_metadata(keys::BRANCH_NAME, branch),
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

        let branch = result
            .data_str(keys::BRANCH_NAME)
            .or_else(|| interaction.command.metadata_str(keys::BRANCH_NAME))
            .map(str::to_string)
            .ok_or_else(|| StepError::MalformedCommand {
                step: StepId::Initialize,
                message: format!("missing '{}' metadata", keys::BRANCH_NAME),
            })?;

        Ok(StepOutcome::recording(result)
            .set(keys::BRANCH_NAME, Value::String(branch))
            .set(keys::STARTED_AT, chrono::Utc::now().to_rfc3339()))
    }
}

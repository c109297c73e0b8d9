use super::design::{design_path, written_path};
use super::{Step, StepContext, StepId, StepOutcome, keys};
use crate::command::{Command, CommandResult};
use crate::error::StepError;
use crate::interaction::Interaction;

/// Asks the agent to review a context's design against its components.
/// Writes `review_path`.
#[derive(Debug, Clone, Copy)]
pub struct ExecuteReview;

impl Step for ExecuteReview {
    fn id(&self) -> StepId {
        StepId::ExecuteReview
    }

    fn get_command(&self, ctx: &StepContext<'_>) -> Result<Command, StepError> {
        let subject = &ctx.session.subject;
        let review_path = format!("docs/review/{}.md", subject.slug());
        let design = ctx
            .session
            .state_str(keys::DESIGN_PATH)
            .map(str::to_string)
            .unwrap_or_else(|| design_path(ctx));

        let mut prompt = format!(
            "Review the design of `{}` at `{}` for consistency, missing responsibilities and dependency cycles.",
            subject.label(),
            design
        );
        if !subject.component_ids.is_empty() {
            prompt.push_str(&format!(
                "\nCheck each component design as well: {}.",
                subject.component_ids.join(", ")
            ));
        }
        prompt.push_str(&format!("\nWrite your findings to `{review_path}`."));

        Ok(ctx.decorate(
            Command::agent(self.id(), prompt)
                .with_metadata(keys::REVIEW_PATH, review_path)
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
        let path = written_path(self.id(), interaction, &result, keys::REVIEW_PATH)?;
        Ok(StepOutcome::recording(result).set(keys::REVIEW_PATH, path))
    }
}

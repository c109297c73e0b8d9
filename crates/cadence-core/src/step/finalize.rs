use serde_json::{Value, json};

use super::spawn::current_children;
use super::{Step, StepContext, StepId, StepOutcome, keys, shell_quote};
use crate::command::{Command, CommandResult};
use crate::error::StepError;
use crate::interaction::Interaction;
use crate::session::{Session, SessionStatus};
use crate::workflow::WorkflowType;

/// Builds the commit command line for a set of files.
fn commit_command(files: &[String], message: &str, branch: Option<&str>) -> String {
    let files = files
        .iter()
        .map(|file| shell_quote(file))
        .collect::<Vec<_>>()
        .join(" ");
    let mut line = format!("git add {files} && git commit -m {}", shell_quote(message));
    if let Some(branch) = branch {
        line.push_str(&format!(" && git push -u origin {}", shell_quote(branch)));
    }
    line
}

/// Artifacts recorded in the command, as planned by `get_command`.
fn planned_artifacts(step: StepId, interaction: &Interaction) -> Result<Value, StepError> {
    interaction
        .command
        .metadata
        .get(keys::ARTIFACTS)
        .filter(|value| value.is_array())
        .cloned()
        .ok_or_else(|| StepError::MalformedCommand {
            step,
            message: format!("missing '{}' metadata", keys::ARTIFACTS),
        })
}

fn finish(step: StepId, interaction: &Interaction, result: CommandResult) -> Result<StepOutcome, StepError> {
    if !result.is_ok() {
        return Ok(StepOutcome::recording(result));
    }
    let artifacts = planned_artifacts(step, interaction)?;
    Ok(StepOutcome::recording(result)
        .set(keys::ARTIFACTS, artifacts)
        .set(keys::COMMITTED_AT, chrono::Utc::now().to_rfc3339())
        .with_status(SessionStatus::Complete))
}

/// Commits the files the session produced. Terminal step of component and
/// single-document workflows.
#[derive(Debug, Clone, Copy)]
pub struct Finalize {
    /// State keys holding paths to commit, in commit order
    pub artifact_keys: &'static [&'static str],
    pub commit_prefix: &'static str,
}

impl Step for Finalize {
    fn id(&self) -> StepId {
        StepId::Finalize
    }

    fn get_command(&self, ctx: &StepContext<'_>) -> Result<Command, StepError> {
        let artifacts: Vec<String> = self
            .artifact_keys
            .iter()
            .filter_map(|key| ctx.session.state_str(key))
            .map(str::to_string)
            .collect();
        if artifacts.is_empty() {
            return Err(StepError::MissingState {
                step: self.id(),
                key: self.artifact_keys.first().copied().unwrap_or(keys::ARTIFACTS).to_string(),
            });
        }

        let message = format!("{}: {}", self.commit_prefix, ctx.session.subject.label());
        let branch = ctx.session.state_str(keys::BRANCH_NAME);
        Ok(ctx.decorate(
            Command::shell(self.id(), commit_command(&artifacts, &message, branch))
                .with_metadata(keys::ARTIFACTS, json!(artifacts)),
        ))
    }

    fn handle_result(
        &self,
        _ctx: &StepContext<'_>,
        interaction: &Interaction,
        result: CommandResult,
    ) -> Result<StepOutcome, StepError> {
        finish(self.id(), interaction, result)
    }
}

/// Commits the files produced by the child sessions in one go.
///
/// Only the newest complete child of `child_workflow` per component takes
/// part, the same set the spawn step accepted. Reads `child_key` from each
/// of them; fails if there is none or if one has not produced the value.
#[derive(Debug, Clone, Copy)]
pub struct AggregateFinalize {
    pub child_workflow: WorkflowType,
    pub child_key: &'static str,
    pub commit_prefix: &'static str,
}

impl Step for AggregateFinalize {
    fn id(&self) -> StepId {
        StepId::Finalize
    }

    fn get_command(&self, ctx: &StepContext<'_>) -> Result<Command, StepError> {
        let children: Vec<&Session> = current_children(ctx.children, self.child_workflow)
            .into_iter()
            .filter(|child| child.status == SessionStatus::Complete)
            .collect();
        if children.is_empty() {
            return Err(StepError::MissingChildren { step: self.id() });
        }

        let artifacts = children
            .iter()
            .map(|child| {
                child
                    .state_str(self.child_key)
                    .map(str::to_string)
                    .ok_or_else(|| StepError::MissingChildState {
                        child_id: child.id.clone(),
                        key: self.child_key.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let message = format!(
            "{}: {} ({} components)",
            self.commit_prefix,
            ctx.session.subject.label(),
            artifacts.len()
        );
        let branch = ctx.session.state_str(keys::BRANCH_NAME);
        let child_ids: Vec<&str> = children.iter().map(|child| child.id.as_str()).collect();
        Ok(ctx.decorate(
            Command::shell(self.id(), commit_command(&artifacts, &message, branch))
                .with_metadata(keys::ARTIFACTS, json!(artifacts))
                .with_metadata("child_session_ids", json!(child_ids)),
        ))
    }

    fn handle_result(
        &self,
        _ctx: &StepContext<'_>,
        interaction: &Interaction,
        result: CommandResult,
    ) -> Result<StepOutcome, StepError> {
        finish(self.id(), interaction, result)
    }
}

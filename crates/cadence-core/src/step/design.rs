use serde_json::{Map, Value, json};

use super::{Step, StepContext, StepId, StepOutcome, keys};
use crate::command::{Command, CommandResult};
use crate::error::StepError;
use crate::interaction::Interaction;

/// Sections every design document must contain.
const COMPONENT_SECTIONS: &[&str] = &["Purpose", "Public API", "Dependencies", "Execution Flow"];
const CONTEXT_SECTIONS: &[&str] = &["Purpose", "Entities", "Components", "Dependencies"];

/// Whether a design describes a single component or a whole context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesignKind {
    Component,
    Context,
}

impl DesignKind {
    fn step_id(self) -> StepId {
        match self {
            DesignKind::Component => StepId::GenerateComponentDesign,
            DesignKind::Context => StepId::GenerateContextDesign,
        }
    }

    fn sections(self) -> &'static [&'static str] {
        match self {
            DesignKind::Component => COMPONENT_SECTIONS,
            DesignKind::Context => CONTEXT_SECTIONS,
        }
    }

    fn noun(self) -> &'static str {
        match self {
            DesignKind::Component => "component",
            DesignKind::Context => "context",
        }
    }
}

/// Default location of a subject's design document.
pub(crate) fn design_path(ctx: &StepContext<'_>) -> String {
    format!("docs/design/{}.md", ctx.session.subject.slug())
}

/// Asks the agent to write a design document. Writes `design_path`.
#[derive(Debug, Clone, Copy)]
pub struct GenerateDesign {
    pub kind: DesignKind,
}

impl Step for GenerateDesign {
    fn id(&self) -> StepId {
        self.kind.step_id()
    }

    fn get_command(&self, ctx: &StepContext<'_>) -> Result<Command, StepError> {
        let path = design_path(ctx);
        let subject = &ctx.session.subject;
        let mut prompt = format!(
            "Write the {} design document for `{}` to `{}`.\nInclude the sections: {}.",
            self.kind.noun(),
            subject.label(),
            path,
            self.kind.sections().join(", ")
        );
        if self.kind == DesignKind::Context && !subject.component_ids.is_empty() {
            prompt.push_str(&format!(
                "\nThe context owns these components: {}.",
                subject.component_ids.join(", ")
            ));
        }
        Ok(ctx.decorate(Command::agent(self.id(), prompt).with_metadata(keys::DESIGN_PATH, path)))
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
        let path = written_path(self.id(), interaction, &result, keys::DESIGN_PATH)?;
        Ok(StepOutcome::recording(result).set(keys::DESIGN_PATH, path))
    }
}

/// Checks the design document against its required sections.
///
/// On failure the reported problems are stored as `validation_errors` for
/// [`ReviseDesign`].
#[derive(Debug, Clone, Copy)]
pub struct ValidateDesign {
    pub kind: DesignKind,
}

impl Step for ValidateDesign {
    fn id(&self) -> StepId {
        StepId::ValidateDesign
    }

    fn get_command(&self, ctx: &StepContext<'_>) -> Result<Command, StepError> {
        let path = ctx.require_state(self.id(), keys::DESIGN_PATH)?;
        let mut instruction = Map::new();
        instruction.insert("action".to_string(), json!("validate_design"));
        instruction.insert("path".to_string(), json!(path));
        instruction.insert("kind".to_string(), json!(self.kind.noun()));
        instruction.insert("required_sections".to_string(), json!(self.kind.sections()));
        Ok(ctx.decorate(
            Command::structured(self.id(), instruction).with_metadata(keys::DESIGN_PATH, path),
        ))
    }

    fn handle_result(
        &self,
        _ctx: &StepContext<'_>,
        _interaction: &Interaction,
        result: CommandResult,
    ) -> Result<StepOutcome, StepError> {
        if result.is_ok() {
            return Ok(StepOutcome::recording(result)
                .remove(keys::VALIDATION_ERRORS)
                .set(keys::VALIDATED_AT, chrono::Utc::now().to_rfc3339()));
        }
        let errors = match result.data.get("errors") {
            Some(Value::Array(items)) if !items.is_empty() => items
                .iter()
                .map(|item| item.as_str().map(str::to_string).unwrap_or_else(|| item.to_string()))
                .collect::<Vec<_>>()
                .join("\n"),
            _ => result.failure_text(),
        };
        Ok(StepOutcome::recording(result).set(keys::VALIDATION_ERRORS, errors))
    }
}

/// Asks the agent to fix the problems validation reported.
#[derive(Debug, Clone, Copy)]
pub struct ReviseDesign;

impl Step for ReviseDesign {
    fn id(&self) -> StepId {
        StepId::ReviseDesign
    }

    fn get_command(&self, ctx: &StepContext<'_>) -> Result<Command, StepError> {
        let path = ctx.require_state(self.id(), keys::DESIGN_PATH)?;
        let errors = ctx.require_state(self.id(), keys::VALIDATION_ERRORS)?;
        let prompt = format!(
            "The design document at `{path}` failed validation:\n\n{errors}\n\nRevise the document so every problem is resolved. Do not remove required sections."
        );
        Ok(ctx.decorate(Command::agent(self.id(), prompt).with_metadata(keys::DESIGN_PATH, path)))
    }

    fn handle_result(
        &self,
        _ctx: &StepContext<'_>,
        _interaction: &Interaction,
        result: CommandResult,
    ) -> Result<StepOutcome, StepError> {
        Ok(StepOutcome::recording(result))
    }
}

/// Path reported by the driver, falling back to the one the command planned.
pub(crate) fn written_path(
    step: StepId,
    interaction: &Interaction,
    result: &CommandResult,
    key: &str,
) -> Result<String, StepError> {
    result
        .data_str(key)
        .or_else(|| interaction.command.metadata_str(key))
        .map(str::to_string)
        .ok_or_else(|| StepError::MalformedCommand {
            step,
            message: format!("missing '{key}' metadata"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandPayload;
    use crate::step::StepOptions;
    use crate::step::test_support::{run, scope, session};
    use crate::workflow::WorkflowType;

    #[test]
    fn generate_records_planned_path() {
        let session = session(WorkflowType::ComponentDesign);
        let step = GenerateDesign {
            kind: DesignKind::Component,
        };
        let outcome = run(&step, &session, &[], CommandResult::ok());
        assert_eq!(outcome.state_updates["design_path"], "docs/design/accounts_user_repo.md");
    }

    #[test]
    fn generate_prefers_reported_path() {
        let session = session(WorkflowType::ContextDesign);
        let step = GenerateDesign {
            kind: DesignKind::Context,
        };
        let outcome = run(
            &step,
            &session,
            &[],
            CommandResult::ok().with_data("design_path", "docs/accounts.md"),
        );
        assert_eq!(outcome.state_updates["design_path"], "docs/accounts.md");
    }

    #[test]
    fn validate_requires_a_design_path() {
        let session = session(WorkflowType::ComponentDesign);
        let scope = scope();
        let options = StepOptions::default();
        let ctx = StepContext::new(&scope, &session, &[], &options);
        let step = ValidateDesign {
            kind: DesignKind::Component,
        };
        let err = step.get_command(&ctx).unwrap_err();
        assert_eq!(
            err,
            StepError::MissingState {
                step: StepId::ValidateDesign,
                key: "design_path".to_string()
            }
        );
    }

    #[test]
    fn validate_builds_structured_instruction_and_collects_errors() {
        let mut session = session(WorkflowType::ComponentDesign);
        session
            .state
            .insert("design_path".into(), "docs/design/x.md".into());
        let step = ValidateDesign {
            kind: DesignKind::Component,
        };
        let scope = scope();
        let options = StepOptions::default();
        let ctx = StepContext::new(&scope, &session, &[], &options);
        let command = step.get_command(&ctx).unwrap();
        match &command.payload {
            CommandPayload::Structured(map) => {
                assert_eq!(map["action"], "validate_design");
                assert_eq!(map["required_sections"].as_array().unwrap().len(), 4);
            }
            other => panic!("unexpected payload {other:?}"),
        }

        let mut failed = CommandResult::error("invalid design");
        failed
            .data
            .insert("errors".into(), json!(["missing Public API", "missing Purpose"]));
        let outcome = run(&step, &session, &[], failed);
        assert_eq!(
            outcome.state_updates["validation_errors"],
            "missing Public API\nmissing Purpose"
        );
    }

    #[test]
    fn revise_includes_validation_errors_in_prompt() {
        let mut session = session(WorkflowType::ComponentDesign);
        session
            .state
            .insert("design_path".into(), "docs/design/x.md".into());
        session
            .state
            .insert("validation_errors".into(), "missing Purpose".into());
        let scope = scope();
        let options = StepOptions::default();
        let ctx = StepContext::new(&scope, &session, &[], &options);
        let command = ReviseDesign.get_command(&ctx).unwrap();
        assert!(command.payload.as_text().unwrap().contains("missing Purpose"));
    }
}

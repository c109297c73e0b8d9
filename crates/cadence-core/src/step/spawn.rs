use serde_json::{Map, Value, json};

use super::{Step, StepContext, StepId, StepOutcome, keys};
use crate::command::{Command, CommandResult};
use crate::error::StepError;
use crate::interaction::Interaction;
use crate::session::{Session, SessionStatus};
use crate::workflow::WorkflowType;

/// The newest child of `workflow` for each component, in link order.
///
/// Children arrive in the order they were linked to the parent, so a
/// replacement started after a failed attempt supersedes it. A child
/// without a component id counts as its own component.
pub fn current_children(children: &[Session], workflow: WorkflowType) -> Vec<&Session> {
    let component_of = |child: &Session| -> String {
        child.subject.component_id.clone().unwrap_or_else(|| child.id.clone())
    };

    let mut current: Vec<&Session> = Vec::new();
    for child in children.iter().filter(|child| child.workflow_type == workflow) {
        let component = component_of(child);
        match current.iter().position(|seen| component_of(*seen) == component) {
            Some(index) => current[index] = child,
            None => current.push(child),
        }
    }
    current
}

/// Fans a context-level session out into one child session per component.
///
/// The command tells the driver which child sessions to start; the driver
/// starts them with this session as parent and drives each to completion.
/// A component whose newest child failed is listed again so that a retry
/// starts a replacement. An `ok` result is only accepted once every
/// component's newest child is complete; otherwise it is downgraded to an
/// error and the step is retried.
#[derive(Debug, Clone, Copy)]
pub struct SpawnComponentSessions {
    pub child_workflow: WorkflowType,
}

impl Step for SpawnComponentSessions {
    fn id(&self) -> StepId {
        StepId::SpawnComponentSessions
    }

    fn get_command(&self, ctx: &StepContext<'_>) -> Result<Command, StepError> {
        let component_ids = &ctx.session.subject.component_ids;
        if component_ids.is_empty() {
            return Err(StepError::MissingSubject {
                step: self.id(),
                field: "component_ids".to_string(),
            });
        }

        let existing: Vec<&Session> = current_children(ctx.children, self.child_workflow)
            .into_iter()
            .filter(|child| child.status != SessionStatus::Failed)
            .collect();
        let pending: Vec<&String> = component_ids
            .iter()
            .filter(|id| {
                !existing
                    .iter()
                    .any(|child| child.subject.component_id.as_ref() == Some(*id))
            })
            .collect();

        let mut instruction = Map::new();
        instruction.insert("action".to_string(), json!("spawn_sessions"));
        instruction.insert("workflow_type".to_string(), json!(self.child_workflow));
        instruction.insert("parent_session_id".to_string(), json!(ctx.session.id));
        instruction.insert("project_id".to_string(), json!(ctx.session.subject.project_id));
        instruction.insert("component_ids".to_string(), json!(pending));

        let existing_ids: Vec<&str> = existing.iter().map(|child| child.id.as_str()).collect();
        Ok(ctx.decorate(
            Command::structured(self.id(), instruction)
                .with_metadata("existing_child_session_ids", json!(existing_ids)),
        ))
    }

    fn handle_result(
        &self,
        ctx: &StepContext<'_>,
        _interaction: &Interaction,
        result: CommandResult,
    ) -> Result<StepOutcome, StepError> {
        if !result.is_ok() {
            return Ok(StepOutcome::recording(result));
        }

        let children = current_children(ctx.children, self.child_workflow);
        if children.is_empty() {
            return Ok(StepOutcome::recording(result).reject("no child sessions were started"));
        }
        let uncovered: Vec<&str> = ctx
            .session
            .subject
            .component_ids
            .iter()
            .filter(|id| {
                !children
                    .iter()
                    .any(|child| child.subject.component_id.as_ref() == Some(*id))
            })
            .map(String::as_str)
            .collect();
        if !uncovered.is_empty() {
            return Ok(StepOutcome::recording(result)
                .reject(format!("components without a child session: {}", uncovered.join(", "))));
        }

        let ids_with = |status: SessionStatus| {
            children
                .iter()
                .filter(|child| child.status == status)
                .map(|child| child.id.as_str())
                .collect::<Vec<&str>>()
        };
        let failed = ids_with(SessionStatus::Failed);
        if !failed.is_empty() {
            return Ok(StepOutcome::recording(result)
                .reject(format!("child sessions failed: {}", failed.join(", "))));
        }
        let active = ids_with(SessionStatus::Active);
        if !active.is_empty() {
            return Ok(StepOutcome::recording(result)
                .reject(format!("child sessions still running: {}", active.join(", "))));
        }

        Ok(StepOutcome::recording(result).set(
            keys::CHILD_SESSIONS_COMPLETED,
            Value::from(children.len() as u64),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SubjectRefs;
    use crate::step::StepOptions;
    use crate::step::test_support::{run, scope};

    const STEP: SpawnComponentSessions = SpawnComponentSessions {
        child_workflow: WorkflowType::ComponentTesting,
    };

    fn parent() -> Session {
        Session::new(
            "tenant-a",
            WorkflowType::ContextTesting,
            SubjectRefs::component("project-1", "accounts").with_component_ids(["c1", "c2"]),
        )
    }

    fn child(parent: &Session, component: &str, status: SessionStatus) -> Session {
        let mut child = Session::new(
            "tenant-a",
            WorkflowType::ComponentTesting,
            SubjectRefs::component("project-1", component),
        );
        child.parent_session_id = Some(parent.id.clone());
        child.status = status;
        child
    }

    #[test]
    fn command_lists_components_without_a_child() {
        let parent = parent();
        let children = vec![child(&parent, "c1", SessionStatus::Active)];
        let scope = scope();
        let options = StepOptions::default();
        let ctx = StepContext::new(&scope, &parent, &children, &options);

        let command = STEP.get_command(&ctx).unwrap();
        let instruction = command.payload.as_structured().unwrap();
        assert_eq!(instruction["workflow_type"], "component_testing");
        assert_eq!(instruction["component_ids"], json!(["c2"]));
        assert_eq!(command.metadata["existing_child_session_ids"], json!([children[0].id]));
    }

    #[test]
    fn failed_child_is_replaced_on_retry() {
        let parent = parent();
        let children = vec![
            child(&parent, "c1", SessionStatus::Complete),
            child(&parent, "c2", SessionStatus::Failed),
        ];
        let scope = scope();
        let options = StepOptions::default();
        let ctx = StepContext::new(&scope, &parent, &children, &options);

        let command = STEP.get_command(&ctx).unwrap();
        let instruction = command.payload.as_structured().unwrap();
        assert_eq!(instruction["component_ids"], json!(["c2"]));
        assert_eq!(command.metadata["existing_child_session_ids"], json!([children[0].id]));
    }

    #[test]
    fn replacement_supersedes_failed_child() {
        let parent = parent();
        let children = vec![
            child(&parent, "c1", SessionStatus::Complete),
            child(&parent, "c2", SessionStatus::Failed),
            child(&parent, "c2", SessionStatus::Complete),
        ];

        let current = current_children(&children, WorkflowType::ComponentTesting);
        let ids: Vec<&str> = current.iter().map(|child| child.id.as_str()).collect();
        assert_eq!(ids, vec![children[0].id.as_str(), children[2].id.as_str()]);

        let outcome = run(&STEP, &parent, &children, CommandResult::ok());
        assert!(outcome.result.is_ok());
        assert_eq!(outcome.state_updates["child_sessions_completed"], 2);
    }

    #[test]
    fn ok_with_uncovered_component_is_downgraded() {
        let parent = parent();
        let children = vec![child(&parent, "c1", SessionStatus::Complete)];
        let outcome = run(&STEP, &parent, &children, CommandResult::ok());
        assert!(!outcome.result.is_ok());
        assert_eq!(
            outcome.state_updates["error"],
            "components without a child session: c2"
        );
    }

    #[test]
    fn requires_component_ids() {
        let mut parent = parent();
        parent.subject.component_ids.clear();
        let scope = scope();
        let options = StepOptions::default();
        let ctx = StepContext::new(&scope, &parent, &[], &options);
        assert!(matches!(STEP.get_command(&ctx), Err(StepError::MissingSubject { .. })));
    }

    #[test]
    fn ok_without_children_is_downgraded() {
        let parent = parent();
        let outcome = run(&STEP, &parent, &[], CommandResult::ok());
        assert!(!outcome.result.is_ok());
        assert_eq!(outcome.state_updates["error"], "no child sessions were started");
    }

    #[test]
    fn ok_with_running_children_is_downgraded() {
        let parent = parent();
        let children = vec![
            child(&parent, "c1", SessionStatus::Complete),
            child(&parent, "c2", SessionStatus::Active),
        ];
        let outcome = run(&STEP, &parent, &children, CommandResult::ok());
        assert!(!outcome.result.is_ok());
        assert!(outcome.result.failure_text().contains(&children[1].id));
    }

    #[test]
    fn ok_with_completed_children_is_accepted() {
        let parent = parent();
        let children = vec![
            child(&parent, "c1", SessionStatus::Complete),
            child(&parent, "c2", SessionStatus::Complete),
        ];
        let outcome = run(&STEP, &parent, &children, CommandResult::ok());
        assert!(outcome.result.is_ok());
        assert_eq!(outcome.state_updates["child_sessions_completed"], 2);
    }
}

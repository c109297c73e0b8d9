//! Session driver: the loop that pulls commands from the orchestration
//! façade, runs them and feeds the results back.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::{BoxFuture, FutureExt, try_join_all};
use serde_json::{Map, Value, json};
use tracing::Instrument;

use cadence_application::OrchestrationService;
use cadence_core::command::CommandResult;
use cadence_core::error::CadenceError;
use cadence_core::interaction::Interaction;
use cadence_core::session::{Scope, Session, SessionStatus, SubjectRefs};
use cadence_core::step::{StepOptions, current_children};
use cadence_core::workflow::WorkflowType;

use crate::environment::ExecutionEnvironment;

const SPAWN_ACTION: &str = "spawn_sessions";

/// Drives sessions to a terminal state.
///
/// Spawn instructions are handled here rather than in the environment: the
/// driver starts the requested child sessions under the parent and drives
/// them concurrently before answering the parent's command.
pub struct SessionDriver {
    service: Arc<OrchestrationService>,
    environment: Arc<dyn ExecutionEnvironment>,
    scope: Scope,
    options: StepOptions,
}

impl SessionDriver {
    pub fn new(service: Arc<OrchestrationService>, environment: Arc<dyn ExecutionEnvironment>, scope: Scope) -> Self {
        Self {
            service,
            environment,
            scope,
            options: StepOptions::default(),
        }
    }

    pub fn with_options(mut self, options: StepOptions) -> Self {
        self.options = options;
        self
    }

    /// Runs `session_id` until it completes or fails and returns its final
    /// snapshot.
    ///
    /// A command left pending by an earlier run is executed again first.
    pub fn drive<'a>(&'a self, session_id: &'a str) -> BoxFuture<'a, Result<Session>> {
        async move {
            tracing::info!("[SessionDriver] Driving session {}", session_id);
            while let Some(interaction) = self.next_interaction(session_id).await? {
                let span = tracing::info_span!(
                    "interaction",
                    session_id = %session_id,
                    interaction_id = %interaction.id,
                    step = %interaction.step_id
                );
                let result = self.execute(session_id, &interaction).instrument(span).await?;
                tracing::debug!(
                    "[SessionDriver] {} finished with {} in session {}",
                    interaction.step_id,
                    result.status,
                    session_id
                );
                self.service
                    .submit_result(&self.scope, session_id, &interaction.id, result)
                    .await
                    .with_context(|| format!("submitting result for session {session_id}"))?;
            }

            let session = self.service.get_session(&self.scope, session_id).await?;
            tracing::info!("[SessionDriver] Session {} ended as {}", session.id, session.status);
            Ok(session)
        }
        .boxed()
    }

    /// The command to run next, or `None` once the session is terminal.
    async fn next_interaction(&self, session_id: &str) -> Result<Option<Interaction>> {
        match self.service.next_command(&self.scope, session_id, &self.options).await {
            Ok(interaction) => Ok(Some(interaction)),
            Err(e) if e.is_session_complete() => Ok(None),
            Err(CadenceError::RetryLimitExceeded { step, max_attempts }) => {
                tracing::warn!(
                    "[SessionDriver] Session {} gave up on {} after {} attempts",
                    session_id,
                    step,
                    max_attempts
                );
                Ok(None)
            }
            Err(CadenceError::PendingInteraction { interaction_id, .. }) => {
                let session = self.service.get_session(&self.scope, session_id).await?;
                let pending = session
                    .find_interaction(&interaction_id)
                    .cloned()
                    .with_context(|| format!("pending interaction {interaction_id} vanished"))?;
                tracing::info!("[SessionDriver] Resuming pending {} in session {}", pending.step_id, session_id);
                Ok(Some(pending))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn execute(&self, session_id: &str, interaction: &Interaction) -> Result<CommandResult> {
        match interaction.command.payload.as_structured() {
            Some(instruction) if instruction.get("action").and_then(Value::as_str) == Some(SPAWN_ACTION) => {
                self.spawn_children(session_id, instruction).await
            }
            _ => Ok(self.environment.run(interaction).await),
        }
    }

    /// Starts the children a spawn instruction asks for, then drives the
    /// newest child of every component.
    ///
    /// Components that already have a child which has not failed are not
    /// started again.
    async fn spawn_children(&self, parent_id: &str, instruction: &Map<String, Value>) -> Result<CommandResult> {
        let Some(workflow_type) = instruction
            .get("workflow_type")
            .and_then(Value::as_str)
            .and_then(|name| name.parse::<WorkflowType>().ok())
        else {
            return Ok(CommandResult::error("spawn instruction names no known workflow type"));
        };
        let project_id = instruction
            .get("project_id")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let component_ids: Vec<&str> = instruction
            .get("component_ids")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        // A resumed instruction may list components started before a crash
        let linked = self.service.child_sessions(&self.scope, parent_id).await?;
        let covered: Vec<String> = current_children(&linked, workflow_type)
            .into_iter()
            .filter(|child| child.status != SessionStatus::Failed)
            .filter_map(|child| child.subject.component_id.clone())
            .collect();

        for component_id in component_ids {
            if covered.iter().any(|id| id == component_id) {
                tracing::info!(
                    "[SessionDriver] {} already has a {} child under {}",
                    component_id,
                    workflow_type,
                    parent_id
                );
                continue;
            }
            tracing::info!(
                progress = "starting child sessions",
                "[SessionDriver] Spawning {} for {}",
                workflow_type,
                component_id
            );
            self.service
                .start(
                    &self.scope,
                    workflow_type,
                    SubjectRefs::component(project_id, component_id),
                    Some(parent_id),
                )
                .await?;
        }

        let linked = self.service.child_sessions(&self.scope, parent_id).await?;
        let children = current_children(&linked, workflow_type);
        tracing::info!(
            progress = "driving child sessions",
            "[SessionDriver] Driving {} children of {}",
            children.len(),
            parent_id
        );

        let finished = try_join_all(children.iter().map(|child| self.drive(&child.id))).await?;
        let failed: Vec<&str> = finished
            .iter()
            .filter(|child| child.status != SessionStatus::Complete)
            .map(|child| child.id.as_str())
            .collect();

        let ids: Vec<&str> = finished.iter().map(|child| child.id.as_str()).collect();
        if failed.is_empty() {
            Ok(CommandResult::ok().with_data("child_session_ids", json!(ids)))
        } else {
            Ok(CommandResult::error(format!("child sessions did not complete: {}", failed.join(", ")))
                .with_data("child_session_ids", json!(ids)))
        }
    }
}

//! Orchestration façade.
//!
//! `OrchestrationService` is the only component that mutates sessions. Each
//! operation is one load → decide → revision-checked write → notify cycle;
//! the repository's revision check is the only synchronization between
//! concurrent callers.

use std::sync::Arc;

use serde_json::Value;

use cadence_core::command::CommandResult;
use cadence_core::error::{CadenceError, Result, TransitionError};
use cadence_core::interaction::Interaction;
use cadence_core::session::{
    Scope, Session, SessionEvent, SessionEventPublisher, SessionRepository, SessionStatus, SubjectRefs,
};
use cadence_core::step::{StepContext, StepOptions, keys};
use cadence_core::workflow::{RetryPolicy, WorkflowType, orchestrator};

use crate::live_status::{LiveStatus, LiveStatusRegistry};
use crate::session::SessionUpdater;

pub struct OrchestrationService {
    repository: Arc<dyn SessionRepository>,
    publisher: Arc<dyn SessionEventPublisher>,
    live_status: Arc<LiveStatusRegistry>,
    updater: SessionUpdater,
    retry_policy: RetryPolicy,
    /// Fills option fields a caller leaves unset
    default_options: StepOptions,
}

impl OrchestrationService {
    pub fn new(repository: Arc<dyn SessionRepository>, publisher: Arc<dyn SessionEventPublisher>) -> Self {
        Self {
            updater: SessionUpdater::new(repository.clone()),
            repository,
            publisher,
            live_status: Arc::new(LiveStatusRegistry::new()),
            retry_policy: RetryPolicy::default(),
            default_options: StepOptions::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_default_options(mut self, options: StepOptions) -> Self {
        self.default_options = options;
        self
    }

    /// Shares an existing registry, e.g. one fed by a tracing layer.
    pub fn with_live_status(mut self, live_status: Arc<LiveStatusRegistry>) -> Self {
        self.live_status = live_status;
        self
    }

    pub fn live_status(&self) -> &Arc<LiveStatusRegistry> {
        &self.live_status
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }

    /// Creates a session, linking it into its parent's child set when a
    /// parent is given.
    ///
    /// A child whose parent link cannot be written is removed again, so a
    /// stored `parent_session_id` always has a matching child entry.
    pub async fn start(
        &self,
        scope: &Scope,
        workflow_type: WorkflowType,
        subject: SubjectRefs,
        parent_session_id: Option<&str>,
    ) -> Result<Session> {
        if let Some(parent_id) = parent_session_id {
            let parent = self.load_scoped(scope, parent_id).await?;
            if parent.is_terminal() {
                return Err(TransitionError::SessionComplete.into());
            }
        }

        let mut session = Session::new(&scope.tenant_id, workflow_type, subject);
        session.parent_session_id = parent_session_id.map(str::to_string);
        let session = self.repository.insert(&session).await?;

        tracing::info!(
            "[OrchestrationService] Started {} session {} (parent: {:?})",
            workflow_type,
            session.id,
            parent_session_id
        );
        self.publish(SessionEvent::created(session.clone()));

        if let Some(parent_id) = parent_session_id {
            let child_id = session.id.clone();
            let linked = self
                .updater
                .update(parent_id, |parent| {
                    // The parent may have finished since the check above
                    if parent.is_terminal() {
                        return Err(TransitionError::SessionComplete.into());
                    }
                    Ok(parent.add_child(child_id.as_str()))
                })
                .await;
            match linked {
                Ok(parent) => self.publish(SessionEvent::updated(parent)),
                Err(e) => {
                    tracing::warn!(
                        "[OrchestrationService] Could not link {} under {}, removing it: {}",
                        session.id,
                        parent_id,
                        e
                    );
                    self.repository.delete(&session.id).await?;
                    self.publish(SessionEvent::deleted(session));
                    return Err(e);
                }
            }
        }

        Ok(session)
    }

    /// Issues the next command of a session as a new pending interaction.
    pub async fn next_command(&self, scope: &Scope, session_id: &str, options: &StepOptions) -> Result<Interaction> {
        let mut session = self.load_scoped(scope, session_id).await?;
        if session.is_terminal() {
            return Err(TransitionError::SessionComplete.into());
        }
        if let Some(pending) = session.pending_interaction() {
            return Err(CadenceError::PendingInteraction {
                session_id: session.id.clone(),
                interaction_id: pending.id.clone(),
            });
        }

        let orchestrator = orchestrator(session.workflow_type);
        let next = orchestrator.get_next_interaction(Some(&session))?;

        if let Err(limit) = self.retry_policy.check(&session, next) {
            tracing::warn!("[OrchestrationService] Session {} failed: {}", session.id, limit);
            session.status = SessionStatus::Failed;
            session
                .state
                .insert(keys::ERROR.to_string(), Value::String(limit.to_string()));
            session.touch();
            let stored = self.repository.update(&session).await?;
            self.publish(SessionEvent::updated(stored));
            return Err(limit);
        }

        let step = orchestrator.step(next).ok_or_else(|| {
            CadenceError::internal(format!(
                "workflow '{}' has no handler for step '{}'",
                session.workflow_type, next
            ))
        })?;

        let children = self.children_of(&session).await?;
        let options = options.clone().or(&self.default_options);
        let command = {
            let ctx = StepContext::new(scope, &session, &children, &options);
            step.get_command(&ctx)?
        };

        let interaction = Interaction::pending(&session.id, command, session.next_inserted_order());
        session.interactions.push(interaction.clone());
        session.touch();
        let stored = self.repository.update(&session).await?;

        tracing::debug!(
            "[OrchestrationService] Issued {} ({}) for session {}",
            next,
            interaction.id,
            stored.id
        );
        self.publish(SessionEvent::updated(stored));
        Ok(interaction)
    }

    /// Attaches `result` to the pending interaction and lets the originating
    /// step fold it into the session.
    pub async fn submit_result(
        &self,
        scope: &Scope,
        session_id: &str,
        interaction_id: &str,
        result: CommandResult,
    ) -> Result<Session> {
        let mut session = self.load_scoped(scope, session_id).await?;

        let interaction = session
            .find_interaction(interaction_id)
            .cloned()
            .ok_or_else(|| CadenceError::InteractionNotFound {
                session_id: session.id.clone(),
                interaction_id: interaction_id.to_string(),
            })?;
        if interaction.is_completed() {
            return Err(CadenceError::InteractionAlreadyCompleted {
                interaction_id: interaction_id.to_string(),
            });
        }
        if session.pending_interaction().map(|pending| pending.id.as_str()) != Some(interaction_id) {
            return Err(CadenceError::InteractionNotPending {
                session_id: session.id.clone(),
                interaction_id: interaction_id.to_string(),
            });
        }
        if session.is_terminal() {
            return Err(TransitionError::SessionComplete.into());
        }

        let orchestrator = orchestrator(session.workflow_type);
        let step = orchestrator
            .step(interaction.step_id)
            .ok_or_else(|| TransitionError::InvalidInteraction {
                step: interaction.step_id,
                workflow: session.workflow_type.to_string(),
            })?;

        let children = self.children_of(&session).await?;
        let outcome = {
            let ctx = StepContext::new(scope, &session, &children, &self.default_options);
            step.handle_result(&ctx, &interaction, result)?
        };
        let status = outcome.result.status;
        outcome.apply(&mut session, interaction_id)?;
        let stored = self.repository.update(&session).await?;

        self.live_status.clear(interaction_id).await;
        if stored.status == SessionStatus::Complete {
            tracing::info!("[OrchestrationService] Session {} complete", stored.id);
        } else {
            tracing::debug!(
                "[OrchestrationService] {} finished with {} in session {}",
                interaction.step_id,
                status,
                stored.id
            );
        }
        self.publish(SessionEvent::updated(stored.clone()));
        Ok(stored)
    }

    pub async fn get_session(&self, scope: &Scope, session_id: &str) -> Result<Session> {
        self.load_scoped(scope, session_id).await
    }

    /// Sessions of the caller's tenant, oldest first.
    pub async fn list_sessions(&self, scope: &Scope, workflow_type: Option<WorkflowType>) -> Result<Vec<Session>> {
        let sessions = self.repository.list_by_tenant(&scope.tenant_id).await?;
        Ok(sessions
            .into_iter()
            .filter(|session| workflow_type.is_none_or(|wf| session.workflow_type == wf))
            .collect())
    }

    /// Current snapshots of a session's children, in link order.
    pub async fn child_sessions(&self, scope: &Scope, session_id: &str) -> Result<Vec<Session>> {
        let session = self.load_scoped(scope, session_id).await?;
        self.children_of(&session).await
    }

    /// Whether the session's terminal step has succeeded.
    pub async fn is_complete(&self, scope: &Scope, session_id: &str) -> Result<bool> {
        let session = self.load_scoped(scope, session_id).await?;
        Ok(orchestrator(session.workflow_type).is_complete(&session))
    }

    /// Marks an active session failed, e.g. when its command hangs.
    pub async fn fail_session(&self, scope: &Scope, session_id: &str, reason: &str) -> Result<Session> {
        let mut session = self.load_scoped(scope, session_id).await?;
        if session.is_terminal() {
            return Err(TransitionError::SessionComplete.into());
        }
        session.status = SessionStatus::Failed;
        session
            .state
            .insert(keys::ERROR.to_string(), Value::String(reason.to_string()));
        session.touch();
        let stored = self.repository.update(&session).await?;

        self.live_status.clear_session(&stored.id).await;
        tracing::info!("[OrchestrationService] Session {} failed: {}", stored.id, reason);
        self.publish(SessionEvent::updated(stored.clone()));
        Ok(stored)
    }

    /// Deletes a session. Children are detached, never deleted; a parent
    /// forgets the deleted child.
    pub async fn delete_session(&self, scope: &Scope, session_id: &str) -> Result<()> {
        let session = self.load_scoped(scope, session_id).await?;
        self.repository.delete(&session.id).await?;
        self.live_status.clear_session(&session.id).await;

        for child_id in &session.child_session_ids {
            let detached = self
                .updater
                .update(child_id, |child| {
                    if child.parent_session_id.as_deref() == Some(session_id) {
                        child.parent_session_id = None;
                        Ok(true)
                    } else {
                        Ok(false)
                    }
                })
                .await;
            match detached {
                Ok(child) => self.publish(SessionEvent::updated(child)),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }

        if let Some(parent_id) = &session.parent_session_id {
            match self
                .updater
                .update(parent_id, |parent| Ok(parent.remove_child(session_id)))
                .await
            {
                Ok(parent) => self.publish(SessionEvent::updated(parent)),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }

        tracing::info!("[OrchestrationService] Deleted session {}", session.id);
        self.publish(SessionEvent::deleted(session));
        Ok(())
    }

    /// Records progress for the session's pending interaction.
    pub async fn report_progress(
        &self,
        scope: &Scope,
        session_id: &str,
        interaction_id: &str,
        message: &str,
    ) -> Result<LiveStatus> {
        let session = self.load_scoped(scope, session_id).await?;
        if session.pending_interaction().map(|pending| pending.id.as_str()) != Some(interaction_id) {
            return Err(CadenceError::InteractionNotPending {
                session_id: session.id.clone(),
                interaction_id: interaction_id.to_string(),
            });
        }
        Ok(self.live_status.report(&session.id, interaction_id, message).await)
    }

    /// Loads a session the caller's tenant owns; anything else is not found.
    async fn load_scoped(&self, scope: &Scope, session_id: &str) -> Result<Session> {
        match self.repository.find_by_id(session_id).await? {
            Some(session) if scope.owns(&session.tenant_id) => Ok(session),
            _ => Err(CadenceError::not_found("Session", session_id)),
        }
    }

    async fn children_of(&self, session: &Session) -> Result<Vec<Session>> {
        let mut children = Vec::with_capacity(session.child_session_ids.len());
        for child_id in &session.child_session_ids {
            match self.repository.find_by_id(child_id).await? {
                Some(child) => children.push(child),
                None => tracing::warn!(
                    "[OrchestrationService] Session {} links missing child {}",
                    session.id,
                    child_id
                ),
            }
        }
        Ok(children)
    }

    fn publish(&self, event: SessionEvent) {
        let tenant_id = event.session.tenant_id.clone();
        self.publisher.publish(&tenant_id, event);
    }
}

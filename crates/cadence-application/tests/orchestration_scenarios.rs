use std::sync::Arc;

use cadence_application::OrchestrationService;
use cadence_core::command::{CommandResult, ExecutionMode, ResultStatus};
use cadence_core::error::{CadenceError, TransitionError};
use cadence_core::interaction::Interaction;
use cadence_core::session::{
    Scope, Session, SessionEventKind, SessionRepository, SessionStatus, SubjectRefs,
};
use cadence_core::step::{StepId, StepOptions};
use cadence_core::workflow::{RetryPolicy, WorkflowType, orchestrator};
use cadence_infrastructure::{BroadcastSessionEventBus, InMemorySessionRepository, TomlSessionRepository};
use async_trait::async_trait;
use serde_json::json;

struct Harness {
    service: OrchestrationService,
    repository: Arc<dyn SessionRepository>,
    bus: Arc<BroadcastSessionEventBus>,
    scope: Scope,
}

fn harness_with(repository: Arc<dyn SessionRepository>, policy: RetryPolicy) -> Harness {
    let bus = Arc::new(BroadcastSessionEventBus::default());
    let service = OrchestrationService::new(repository.clone(), bus.clone()).with_retry_policy(policy);
    Harness {
        service,
        repository,
        bus,
        scope: Scope::tenant("tenant-a"),
    }
}

fn harness() -> Harness {
    harness_with(Arc::new(InMemorySessionRepository::new()), RetryPolicy::default())
}

fn component(id: &str) -> SubjectRefs {
    SubjectRefs::component("project-1", id)
}

impl Harness {
    async fn start(&self, workflow: WorkflowType, subject: SubjectRefs) -> Session {
        self.service.start(&self.scope, workflow, subject, None).await.unwrap()
    }

    async fn next(&self, session_id: &str) -> Interaction {
        self.service
            .next_command(&self.scope, session_id, &StepOptions::default())
            .await
            .unwrap()
    }

    async fn submit(&self, session_id: &str, interaction: &Interaction, result: CommandResult) -> Session {
        self.service
            .submit_result(&self.scope, session_id, &interaction.id, result)
            .await
            .unwrap()
    }

    /// Issues the next command, checks its step and answers it.
    async fn step(&self, session_id: &str, expected: StepId, result: CommandResult) -> Session {
        let interaction = self.next(session_id).await;
        assert_eq!(interaction.step_id, expected);
        self.submit(session_id, &interaction, result).await
    }

    /// Drives a component_testing session straight to completion.
    async fn complete_component_testing(&self, session_id: &str) -> Session {
        self.step(session_id, StepId::Initialize, CommandResult::ok()).await;
        self.step(session_id, StepId::GenerateTests, CommandResult::ok()).await;
        self.step(session_id, StepId::RunTests, CommandResult::ok()).await;
        self.step(session_id, StepId::Finalize, CommandResult::ok()).await
    }
}

#[tokio::test]
async fn test_linear_path_and_self_retry() {
    let h = harness();
    let session = h.start(WorkflowType::ComponentTesting, component("users")).await;

    let first = h.next(&session.id).await;
    assert_eq!(first.step_id, StepId::Initialize);
    assert_eq!(first.command.execution_mode, ExecutionMode::Shell);
    assert_eq!(first.command.metadata_str("branch_name"), Some("test-users"));

    let after_error = h
        .submit(&session.id, &first, CommandResult::error("fatal: not a git repository"))
        .await;
    assert_eq!(after_error.state_str("error"), Some("fatal: not a git repository"));
    assert_eq!(after_error.status, SessionStatus::Active);

    let retried = h.step(&session.id, StepId::Initialize, CommandResult::ok()).await;
    assert!(retried.state.get("error").is_none());
    assert_eq!(retried.state_str("branch_name"), Some("test-users"));

    let generate = h.next(&session.id).await;
    assert_eq!(generate.step_id, StepId::GenerateTests);
    assert_eq!(generate.command.execution_mode, ExecutionMode::Agent);
}

#[tokio::test]
async fn test_failing_tests_loop_through_fix() {
    let h = harness();
    let session = h.start(WorkflowType::ComponentTesting, component("users")).await;
    h.step(&session.id, StepId::Initialize, CommandResult::ok()).await;
    h.step(&session.id, StepId::GenerateTests, CommandResult::ok()).await;

    let failed = h
        .step(&session.id, StepId::RunTests, CommandResult::error("2 tests failed"))
        .await;
    assert_eq!(failed.state_str("test_failures"), Some("2 tests failed"));

    let fix = h.next(&session.id).await;
    assert_eq!(fix.step_id, StepId::FixTestFailures);
    assert!(fix.command.payload.as_text().unwrap().contains("2 tests failed"));
    h.submit(&session.id, &fix, CommandResult::ok()).await;

    let passed = h.step(&session.id, StepId::RunTests, CommandResult::ok()).await;
    assert!(passed.state.get("test_failures").is_none());

    assert_eq!(h.next(&session.id).await.step_id, StepId::Finalize);
}

#[tokio::test]
async fn test_finalize_ok_completes_the_session() {
    let h = harness();
    let session = h.start(WorkflowType::ComponentTesting, component("users")).await;
    let done = h.complete_component_testing(&session.id).await;

    assert_eq!(done.status, SessionStatus::Complete);
    assert_eq!(done.state["artifacts"], json!(["tests/users_test.rs"]));
    assert!(h.service.is_complete(&h.scope, &session.id).await.unwrap());

    let err = h
        .service
        .next_command(&h.scope, &session.id, &StepOptions::default())
        .await
        .unwrap_err();
    assert!(err.is_session_complete());

    // Monotonic completion
    assert!(h.service.fail_session(&h.scope, &session.id, "late").await.is_err());
    let reloaded = h.service.get_session(&h.scope, &session.id).await.unwrap();
    assert_eq!(reloaded.status, SessionStatus::Complete);
}

#[tokio::test]
async fn test_submit_outside_the_pending_slot_is_rejected() {
    let h = harness();
    let session = h.start(WorkflowType::ComponentTesting, component("users")).await;

    let unknown = h
        .service
        .submit_result(&h.scope, &session.id, "no-such-interaction", CommandResult::ok())
        .await
        .unwrap_err();
    assert!(matches!(unknown, CadenceError::InteractionNotFound { .. }));

    let first = h.next(&session.id).await;
    let pending = h
        .service
        .next_command(&h.scope, &session.id, &StepOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(pending, CadenceError::PendingInteraction { .. }));

    h.submit(&session.id, &first, CommandResult::ok()).await;
    let twice = h
        .service
        .submit_result(&h.scope, &session.id, &first.id, CommandResult::error("again"))
        .await
        .unwrap_err();
    assert!(matches!(twice, CadenceError::InteractionAlreadyCompleted { .. }));

    let stored = h.service.get_session(&h.scope, &session.id).await.unwrap();
    assert_eq!(stored.interactions[0].status(), Some(ResultStatus::Ok));
}

#[tokio::test]
async fn test_context_testing_aggregates_three_children() {
    let h = harness();
    let parent = h
        .start(
            WorkflowType::ContextTesting,
            SubjectRefs::component("project-1", "accounts").with_component_ids(["users", "teams", "roles"]),
        )
        .await;
    h.step(&parent.id, StepId::Initialize, CommandResult::ok()).await;

    // Spawn reported ok before any child exists is not accepted
    let spawn = h.next(&parent.id).await;
    assert_eq!(spawn.step_id, StepId::SpawnComponentSessions);
    let instruction = spawn.command.payload.as_structured().unwrap();
    assert_eq!(instruction["workflow_type"], "component_testing");
    assert_eq!(instruction["component_ids"], json!(["users", "teams", "roles"]));
    let rejected = h.submit(&parent.id, &spawn, CommandResult::ok()).await;
    assert_eq!(rejected.interactions.last().unwrap().status(), Some(ResultStatus::Error));

    let spawn = h.next(&parent.id).await;
    assert_eq!(spawn.step_id, StepId::SpawnComponentSessions);
    for component_id in ["users", "teams", "roles"] {
        let child = h
            .service
            .start(
                &h.scope,
                WorkflowType::ComponentTesting,
                component(component_id),
                Some(&parent.id),
            )
            .await
            .unwrap();
        assert_eq!(child.parent_session_id.as_deref(), Some(parent.id.as_str()));
        h.complete_component_testing(&child.id).await;
    }
    let accepted = h.submit(&parent.id, &spawn, CommandResult::ok()).await;
    assert_eq!(accepted.child_session_ids.len(), 3);
    assert_eq!(accepted.state["child_sessions_completed"], 3);

    let finalize = h.next(&parent.id).await;
    assert_eq!(finalize.step_id, StepId::Finalize);
    let artifacts = finalize.command.metadata["artifacts"].as_array().unwrap();
    assert_eq!(artifacts.len(), 3);
    assert_eq!(artifacts[0], "tests/users_test.rs");

    let done = h.submit(&parent.id, &finalize, CommandResult::ok()).await;
    assert_eq!(done.status, SessionStatus::Complete);
    assert_eq!(h.service.child_sessions(&h.scope, &parent.id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_retry_limit_fails_the_session() {
    let h = harness_with(Arc::new(InMemorySessionRepository::new()), RetryPolicy::new(2));
    let session = h.start(WorkflowType::ComponentTesting, component("users")).await;
    h.step(&session.id, StepId::Initialize, CommandResult::ok()).await;
    h.step(&session.id, StepId::GenerateTests, CommandResult::ok()).await;

    for _ in 0..2 {
        h.step(&session.id, StepId::RunTests, CommandResult::error("red")).await;
        h.step(&session.id, StepId::FixTestFailures, CommandResult::ok()).await;
    }

    let err = h
        .service
        .next_command(&h.scope, &session.id, &StepOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CadenceError::RetryLimitExceeded {
            step: StepId::RunTests,
            max_attempts: 2
        }
    ));

    let failed = h.service.get_session(&h.scope, &session.id).await.unwrap();
    assert_eq!(failed.status, SessionStatus::Failed);
    assert!(failed.state_str("error").unwrap().contains("run_tests"));
    assert!(
        h.service
            .next_command(&h.scope, &session.id, &StepOptions::default())
            .await
            .unwrap_err()
            .is_session_complete()
    );
}

#[tokio::test]
async fn test_history_is_append_only_and_follows_the_table() {
    let h = harness();
    let session = h.start(WorkflowType::ComponentTesting, component("users")).await;

    let mut previous: Vec<Interaction> = Vec::new();
    h.step(&session.id, StepId::Initialize, CommandResult::error("x")).await;
    for (step, result) in [
        (StepId::Initialize, CommandResult::ok()),
        (StepId::GenerateTests, CommandResult::ok()),
        (StepId::RunTests, CommandResult::error("red")),
        (StepId::FixTestFailures, CommandResult::ok()),
        (StepId::RunTests, CommandResult::ok()),
    ] {
        let current = h.step(&session.id, step, result).await;
        assert_eq!(&current.interactions[..previous.len()], previous.as_slice());
        previous = current.interactions.clone();
    }

    let stored = h.service.get_session(&h.scope, &session.id).await.unwrap();
    let path: Vec<_> = stored
        .interactions
        .iter()
        .map(|interaction| (interaction.step_id, interaction.status()))
        .collect();
    assert!(orchestrator(WorkflowType::ComponentTesting).transitions().permits_path(&path));
    let orders: Vec<u64> = stored.interactions.iter().map(|i| i.inserted_order).collect();
    assert_eq!(orders, (0..orders.len() as u64).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_next_command_yields_one_pending_interaction() {
    let h = Arc::new(harness());
    let session = h.start(WorkflowType::ComponentTesting, component("users")).await;

    let a = {
        let h = h.clone();
        let id = session.id.clone();
        tokio::spawn(async move { h.service.next_command(&h.scope, &id, &StepOptions::default()).await })
    };
    let b = {
        let h = h.clone();
        let id = session.id.clone();
        tokio::spawn(async move { h.service.next_command(&h.scope, &id, &StepOptions::default()).await })
    };
    let results = [a.await.unwrap(), b.await.unwrap()];

    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);
    for result in &results {
        if let Err(e) = result {
            assert!(e.is_conflict() || matches!(e, CadenceError::PendingInteraction { .. }));
        }
    }
    let stored = h.service.get_session(&h.scope, &session.id).await.unwrap();
    assert_eq!(stored.interactions.len(), 1);
}

#[tokio::test]
async fn test_stale_write_loses() {
    let h = harness();
    let session = h.start(WorkflowType::ContextReview, component("accounts")).await;
    let stale = h.repository.find_by_id(&session.id).await.unwrap().unwrap();

    h.next(&session.id).await;

    let err = h.repository.update(&stale).await.unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_delete_detaches_children_and_unlinks_parent() {
    let h = harness();
    let parent = h
        .start(
            WorkflowType::ContextCoding,
            SubjectRefs::component("project-1", "accounts").with_component_ids(["users", "teams"]),
        )
        .await;
    let mut children = Vec::new();
    for component_id in ["users", "teams"] {
        children.push(
            h.service
                .start(&h.scope, WorkflowType::ComponentCoding, component(component_id), Some(&parent.id))
                .await
                .unwrap(),
        );
    }

    h.service.delete_session(&h.scope, &children[1].id).await.unwrap();
    let parent_now = h.service.get_session(&h.scope, &parent.id).await.unwrap();
    assert_eq!(parent_now.child_session_ids, vec![children[0].id.clone()]);

    h.service.delete_session(&h.scope, &parent.id).await.unwrap();
    let orphan = h.service.get_session(&h.scope, &children[0].id).await.unwrap();
    assert!(orphan.parent_session_id.is_none());
    assert!(h.service.get_session(&h.scope, &parent.id).await.unwrap_err().is_not_found());
}

/// What [`InterferingRepository`] does to a parent while a child starts.
enum Interference {
    /// Every write to sessions of this workflow loses the revision race
    RejectWritesTo(WorkflowType),
    /// The parent is completed right after a child is inserted
    FinishParentOnInsert,
}

struct InterferingRepository {
    inner: InMemorySessionRepository,
    interference: Interference,
}

impl InterferingRepository {
    fn new(interference: Interference) -> Self {
        Self {
            inner: InMemorySessionRepository::new(),
            interference,
        }
    }
}

#[async_trait]
impl SessionRepository for InterferingRepository {
    async fn find_by_id(&self, session_id: &str) -> cadence_core::error::Result<Option<Session>> {
        self.inner.find_by_id(session_id).await
    }

    async fn insert(&self, session: &Session) -> cadence_core::error::Result<Session> {
        let stored = self.inner.insert(session).await?;
        if let (Interference::FinishParentOnInsert, Some(parent_id)) =
            (&self.interference, &session.parent_session_id)
        {
            let mut parent = self.inner.find_by_id(parent_id).await?.unwrap();
            parent.status = SessionStatus::Complete;
            self.inner.update(&parent).await?;
        }
        Ok(stored)
    }

    async fn update(&self, session: &Session) -> cadence_core::error::Result<Session> {
        match self.interference {
            Interference::RejectWritesTo(workflow) if session.workflow_type == workflow => {
                Err(CadenceError::Conflict {
                    session_id: session.id.clone(),
                    expected: session.revision,
                    actual: session.revision + 1,
                })
            }
            _ => self.inner.update(session).await,
        }
    }

    async fn delete(&self, session_id: &str) -> cadence_core::error::Result<()> {
        self.inner.delete(session_id).await
    }

    async fn list_all(&self) -> cadence_core::error::Result<Vec<Session>> {
        self.inner.list_all().await
    }
}

fn accounts_context() -> SubjectRefs {
    SubjectRefs::component("project-1", "accounts").with_component_ids(["users"])
}

#[tokio::test]
async fn test_child_is_removed_when_the_parent_link_fails() {
    let h = harness_with(
        Arc::new(InterferingRepository::new(Interference::RejectWritesTo(
            WorkflowType::ContextTesting,
        ))),
        RetryPolicy::default(),
    );
    let parent = h.start(WorkflowType::ContextTesting, accounts_context()).await;
    let mut rx = h.bus.subscribe("tenant-a");

    let err = h
        .service
        .start(&h.scope, WorkflowType::ComponentTesting, component("users"), Some(&parent.id))
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    let stored: Vec<String> = h
        .repository
        .list_by_tenant("tenant-a")
        .await
        .unwrap()
        .into_iter()
        .map(|session| session.id)
        .collect();
    assert_eq!(stored, vec![parent.id.clone()]);
    assert!(h.service.child_sessions(&h.scope, &parent.id).await.unwrap().is_empty());

    assert_eq!(rx.recv().await.unwrap().event, SessionEventKind::Created);
    assert_eq!(rx.recv().await.unwrap().event, SessionEventKind::Deleted);
}

#[tokio::test]
async fn test_child_is_not_linked_under_a_parent_that_just_finished() {
    let h = harness_with(
        Arc::new(InterferingRepository::new(Interference::FinishParentOnInsert)),
        RetryPolicy::default(),
    );
    let parent = h.start(WorkflowType::ContextTesting, accounts_context()).await;

    let err = h
        .service
        .start(&h.scope, WorkflowType::ComponentTesting, component("users"), Some(&parent.id))
        .await
        .unwrap_err();
    assert!(err.is_session_complete());

    let parent = h.service.get_session(&h.scope, &parent.id).await.unwrap();
    assert_eq!(parent.status, SessionStatus::Complete);
    assert!(parent.child_session_ids.is_empty());
    assert_eq!(h.repository.list_by_tenant("tenant-a").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_events_are_published_per_tenant() {
    let h = harness();
    let mut rx = h.bus.subscribe("tenant-a");
    let mut other = h.bus.subscribe("tenant-b");

    let session = h.start(WorkflowType::ContextReview, component("accounts")).await;
    assert_eq!(rx.recv().await.unwrap().event, SessionEventKind::Created);

    h.next(&session.id).await;
    let updated = rx.recv().await.unwrap();
    assert_eq!(updated.event, SessionEventKind::Updated);
    assert_eq!(updated.session.interactions.len(), 1);

    h.service.delete_session(&h.scope, &session.id).await.unwrap();
    assert_eq!(rx.recv().await.unwrap().event, SessionEventKind::Deleted);

    assert!(other.try_recv().is_err());
}

#[tokio::test]
async fn test_sessions_are_tenant_scoped() {
    let h = harness();
    let session = h.start(WorkflowType::ContextReview, component("accounts")).await;
    h.start(WorkflowType::ComponentDesign, component("users")).await;

    let intruder = Scope::tenant("tenant-b");
    let err = h.service.get_session(&intruder, &session.id).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(h.service.list_sessions(&intruder, None).await.unwrap().is_empty());

    let reviews = h
        .service
        .list_sessions(&h.scope, Some(WorkflowType::ContextReview))
        .await
        .unwrap();
    assert_eq!(reviews.len(), 1);
    assert_eq!(h.service.list_sessions(&h.scope, None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_manual_failure_of_a_hung_command() {
    let h = harness();
    let session = h.start(WorkflowType::ComponentTesting, component("users")).await;
    let pending = h.next(&session.id).await;
    h.service
        .report_progress(&h.scope, &session.id, &pending.id, "fetching")
        .await
        .unwrap();

    let failed = h
        .service
        .fail_session(&h.scope, &session.id, "runner lost")
        .await
        .unwrap();
    assert_eq!(failed.status, SessionStatus::Failed);
    assert_eq!(failed.state_str("error"), Some("runner lost"));
    assert!(h.service.live_status().get(&pending.id).await.is_none());

    let err = h
        .service
        .submit_result(&h.scope, &session.id, &pending.id, CommandResult::ok())
        .await
        .unwrap_err();
    assert!(matches!(err, CadenceError::Transition(TransitionError::SessionComplete)));
}

#[tokio::test]
async fn test_submit_clears_live_status() {
    let h = harness();
    let session = h.start(WorkflowType::ComponentTesting, component("users")).await;
    let pending = h.next(&session.id).await;

    h.service
        .report_progress(&h.scope, &session.id, &pending.id, "compiling")
        .await
        .unwrap();
    assert_eq!(
        h.service.live_status().get(&pending.id).await.unwrap().message,
        "compiling"
    );

    h.submit(&session.id, &pending, CommandResult::ok()).await;
    assert!(h.service.live_status().get(&pending.id).await.is_none());
}

#[tokio::test]
async fn test_sessions_resume_from_toml_storage() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let session_id = {
        let h = harness_with(
            Arc::new(TomlSessionRepository::new(temp_dir.path()).unwrap()),
            RetryPolicy::default(),
        );
        let session = h.start(WorkflowType::ComponentDesign, component("users")).await;
        h.step(&session.id, StepId::Initialize, CommandResult::ok()).await;
        h.step(&session.id, StepId::GenerateComponentDesign, CommandResult::ok()).await;
        session.id
    };

    // A fresh service over the same directory picks up where the last one stopped
    let h = harness_with(
        Arc::new(TomlSessionRepository::new(temp_dir.path()).unwrap()),
        RetryPolicy::default(),
    );
    let validate = h.next(&session_id).await;
    assert_eq!(validate.step_id, StepId::ValidateDesign);
    let instruction = validate.command.payload.as_structured().unwrap();
    assert_eq!(instruction["path"], "docs/design/users.md");

    let invalid = h
        .submit(
            &session_id,
            &validate,
            CommandResult::error("validation failed").with_data("errors", json!(["missing Public API"])),
        )
        .await;
    assert_eq!(invalid.state_str("validation_errors"), Some("missing Public API"));
    assert_eq!(h.next(&session_id).await.step_id, StepId::ReviseDesign);
}

//! Workflow types, the orchestrator contract and the workflow registry.
//!
//! Each workflow is a fixed set of steps plus a [`TransitionTable`]. The
//! orchestrator never stores anything: the next step is always recomputed
//! from the session's interaction history.

mod component_coding;
mod component_design;
mod component_testing;
mod context_coding;
mod context_design;
mod context_review;
mod context_testing;
mod retry;
mod table;

pub use component_coding::ComponentCodingOrchestrator;
pub use component_design::ComponentDesignOrchestrator;
pub use component_testing::ComponentTestingOrchestrator;
pub use context_coding::ContextCodingOrchestrator;
pub use context_design::ContextDesignOrchestrator;
pub use context_review::ContextReviewOrchestrator;
pub use context_testing::ContextTestingOrchestrator;
pub use retry::{DEFAULT_MAX_STEP_ATTEMPTS, RetryPolicy};
pub use table::{Next, Transition, TransitionTable};

use serde::{Deserialize, Serialize};

use crate::command::ResultStatus;
use crate::error::TransitionError;
use crate::session::Session;
use crate::step::{Step, StepId};

/// Closed set of workflow types.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WorkflowType {
    ComponentDesign,
    ComponentCoding,
    ComponentTesting,
    ContextDesign,
    ContextCoding,
    ContextTesting,
    ContextReview,
}

impl WorkflowType {
    /// One-line description shown by the CLI.
    pub fn description(self) -> &'static str {
        match self {
            WorkflowType::ComponentDesign => "Write and validate the design document of one component",
            WorkflowType::ComponentCoding => "Implement one component until its tests pass",
            WorkflowType::ComponentTesting => "Write tests for one component until they pass",
            WorkflowType::ContextDesign => "Write and validate the design document of a bounded context",
            WorkflowType::ContextCoding => "Implement every component of a context through child sessions",
            WorkflowType::ContextTesting => "Test every component of a context through child sessions",
            WorkflowType::ContextReview => "Review a context's design",
        }
    }

    /// Workflow of the child sessions a fan-out workflow spawns.
    pub fn child_workflow(self) -> Option<WorkflowType> {
        match self {
            WorkflowType::ContextCoding => Some(WorkflowType::ComponentCoding),
            WorkflowType::ContextTesting => Some(WorkflowType::ComponentTesting),
            _ => None,
        }
    }
}

/// Per-workflow sequencing logic.
pub trait Orchestrator: Send + Sync {
    fn workflow_type(&self) -> WorkflowType;

    /// Steps in declaration order.
    fn steps(&self) -> &'static [StepId];

    fn transitions(&self) -> &'static TransitionTable;

    /// Handler for `id`, or `None` if the step is not part of this workflow.
    fn step(&self, id: StepId) -> Option<&'static dyn Step>;

    /// Picks the step to issue next from the last completed interaction.
    fn get_next_interaction(&self, session: Option<&Session>) -> Result<StepId, TransitionError> {
        let last = session
            .and_then(Session::last_completed_interaction)
            .and_then(|interaction| interaction.status().map(|status| (interaction.step_id, status)));
        self.transitions().resolve(self.workflow_type(), self.steps(), last)
    }

    /// True once the terminal step's interaction completed with `ok`.
    fn is_complete(&self, session: &Session) -> bool {
        let Some(terminal) = self.transitions().terminal_step() else {
            return false;
        };
        session.last_interaction().is_some_and(|interaction| {
            interaction.step_id == terminal && interaction.status() == Some(ResultStatus::Ok)
        })
    }
}

static COMPONENT_DESIGN: ComponentDesignOrchestrator = ComponentDesignOrchestrator;
static COMPONENT_CODING: ComponentCodingOrchestrator = ComponentCodingOrchestrator;
static COMPONENT_TESTING: ComponentTestingOrchestrator = ComponentTestingOrchestrator;
static CONTEXT_DESIGN: ContextDesignOrchestrator = ContextDesignOrchestrator;
static CONTEXT_CODING: ContextCodingOrchestrator = ContextCodingOrchestrator;
static CONTEXT_TESTING: ContextTestingOrchestrator = ContextTestingOrchestrator;
static CONTEXT_REVIEW: ContextReviewOrchestrator = ContextReviewOrchestrator;

/// Returns the orchestrator registered for `workflow`.
pub fn orchestrator(workflow: WorkflowType) -> &'static dyn Orchestrator {
    match workflow {
        WorkflowType::ComponentDesign => &COMPONENT_DESIGN,
        WorkflowType::ComponentCoding => &COMPONENT_CODING,
        WorkflowType::ComponentTesting => &COMPONENT_TESTING,
        WorkflowType::ContextDesign => &CONTEXT_DESIGN,
        WorkflowType::ContextCoding => &CONTEXT_CODING,
        WorkflowType::ContextTesting => &CONTEXT_TESTING,
        WorkflowType::ContextReview => &CONTEXT_REVIEW,
    }
}

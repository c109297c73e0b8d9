//! Context testing: one component_testing child session per component, then
//! a single commit of every child's `output_path`.
//!
//! | key | written by | read by |
//! |---|---|---|
//! | `branch_name`, `started_at` | Initialize | Finalize |
//! | `child_sessions_completed` | SpawnComponentSessions | |
//! | `output_path` (children) | child GenerateTests | Finalize |
//! | `artifacts`, `committed_at` | Finalize | |

use super::{Orchestrator, Transition, TransitionTable, WorkflowType};
use crate::step::{AggregateFinalize, Initialize, SpawnComponentSessions, Step, StepId, keys};

static INITIALIZE: Initialize = Initialize { branch_prefix: "test" };
static SPAWN: SpawnComponentSessions = SpawnComponentSessions {
    child_workflow: WorkflowType::ComponentTesting,
};
static FINALIZE: AggregateFinalize = AggregateFinalize {
    child_workflow: WorkflowType::ComponentTesting,
    child_key: keys::OUTPUT_PATH,
    commit_prefix: "test",
};

const STEPS: &[StepId] = &[StepId::Initialize, StepId::SpawnComponentSessions, StepId::Finalize];

static TRANSITIONS: TransitionTable = TransitionTable {
    entry: StepId::Initialize,
    transitions: &[
        Transition::ok(StepId::Initialize, StepId::SpawnComponentSessions),
        Transition::retry(StepId::Initialize),
        Transition::ok(StepId::SpawnComponentSessions, StepId::Finalize),
        Transition::retry(StepId::SpawnComponentSessions),
        Transition::complete(StepId::Finalize),
        Transition::retry(StepId::Finalize),
    ],
};

pub struct ContextTestingOrchestrator;

impl Orchestrator for ContextTestingOrchestrator {
    fn workflow_type(&self) -> WorkflowType {
        WorkflowType::ContextTesting
    }

    fn steps(&self) -> &'static [StepId] {
        STEPS
    }

    fn transitions(&self) -> &'static TransitionTable {
        &TRANSITIONS
    }

    fn step(&self, id: StepId) -> Option<&'static dyn Step> {
        match id {
            StepId::Initialize => Some(&INITIALIZE),
            StepId::SpawnComponentSessions => Some(&SPAWN),
            StepId::Finalize => Some(&FINALIZE),
            _ => None,
        }
    }
}

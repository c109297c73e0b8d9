//! Context coding: one component_coding child session per component, then a
//! single commit of every child's `implementation_path`.
//!
//! Writes `branch_name`, `started_at`, `child_sessions_completed`,
//! `artifacts` and `committed_at`. Reads `implementation_path` from each
//! child.

use super::{Orchestrator, Transition, TransitionTable, WorkflowType};
use crate::step::{AggregateFinalize, Initialize, SpawnComponentSessions, Step, StepId, keys};

static INITIALIZE: Initialize = Initialize { branch_prefix: "code" };
static SPAWN: SpawnComponentSessions = SpawnComponentSessions {
    child_workflow: WorkflowType::ComponentCoding,
};
static FINALIZE: AggregateFinalize = AggregateFinalize {
    child_workflow: WorkflowType::ComponentCoding,
    child_key: keys::IMPLEMENTATION_PATH,
    commit_prefix: "feat",
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

pub struct ContextCodingOrchestrator;

impl Orchestrator for ContextCodingOrchestrator {
    fn workflow_type(&self) -> WorkflowType {
        WorkflowType::ContextCoding
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

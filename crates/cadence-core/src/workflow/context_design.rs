//! Context design: the component-design loop applied to a whole bounded
//! context. Same state keys as component design.

use super::{Orchestrator, Transition, TransitionTable, WorkflowType};
use crate::step::{
    DesignKind, Finalize, GenerateDesign, Initialize, ReviseDesign, Step, StepId, ValidateDesign, keys,
};

static INITIALIZE: Initialize = Initialize {
    branch_prefix: "context-design",
};
static GENERATE: GenerateDesign = GenerateDesign {
    kind: DesignKind::Context,
};
static VALIDATE: ValidateDesign = ValidateDesign {
    kind: DesignKind::Context,
};
static FINALIZE: Finalize = Finalize {
    artifact_keys: &[keys::DESIGN_PATH],
    commit_prefix: "docs",
};

const STEPS: &[StepId] = &[
    StepId::Initialize,
    StepId::GenerateContextDesign,
    StepId::ValidateDesign,
    StepId::ReviseDesign,
    StepId::Finalize,
];

static TRANSITIONS: TransitionTable = TransitionTable {
    entry: StepId::Initialize,
    transitions: &[
        Transition::ok(StepId::Initialize, StepId::GenerateContextDesign),
        Transition::retry(StepId::Initialize),
        Transition::ok(StepId::GenerateContextDesign, StepId::ValidateDesign),
        Transition::retry(StepId::GenerateContextDesign),
        Transition::ok(StepId::ValidateDesign, StepId::Finalize),
        Transition::error(StepId::ValidateDesign, StepId::ReviseDesign),
        Transition::ok(StepId::ReviseDesign, StepId::ValidateDesign),
        Transition::retry(StepId::ReviseDesign),
        Transition::complete(StepId::Finalize),
        Transition::retry(StepId::Finalize),
    ],
};

pub struct ContextDesignOrchestrator;

impl Orchestrator for ContextDesignOrchestrator {
    fn workflow_type(&self) -> WorkflowType {
        WorkflowType::ContextDesign
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
            StepId::GenerateContextDesign => Some(&GENERATE),
            StepId::ValidateDesign => Some(&VALIDATE),
            StepId::ReviseDesign => Some(&ReviseDesign),
            StepId::Finalize => Some(&FINALIZE),
            _ => None,
        }
    }
}

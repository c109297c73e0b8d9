//! Component design: draft a component's design document, validate it and
//! revise it until it passes validation.
//!
//! Writes `branch_name`, `started_at`, `design_path`, `validation_errors`,
//! `validated_at`, `artifacts` and `committed_at`.

use super::{Orchestrator, Transition, TransitionTable, WorkflowType};
use crate::step::{
    DesignKind, Finalize, GenerateDesign, Initialize, ReviseDesign, Step, StepId, ValidateDesign, keys,
};

static INITIALIZE: Initialize = Initialize { branch_prefix: "design" };
static GENERATE: GenerateDesign = GenerateDesign {
    kind: DesignKind::Component,
};
static VALIDATE: ValidateDesign = ValidateDesign {
    kind: DesignKind::Component,
};
static FINALIZE: Finalize = Finalize {
    artifact_keys: &[keys::DESIGN_PATH],
    commit_prefix: "docs",
};

const STEPS: &[StepId] = &[
    StepId::Initialize,
    StepId::GenerateComponentDesign,
    StepId::ValidateDesign,
    StepId::ReviseDesign,
    StepId::Finalize,
];

static TRANSITIONS: TransitionTable = TransitionTable {
    entry: StepId::Initialize,
    transitions: &[
        Transition::ok(StepId::Initialize, StepId::GenerateComponentDesign),
        Transition::retry(StepId::Initialize),
        Transition::ok(StepId::GenerateComponentDesign, StepId::ValidateDesign),
        Transition::retry(StepId::GenerateComponentDesign),
        Transition::ok(StepId::ValidateDesign, StepId::Finalize),
        Transition::error(StepId::ValidateDesign, StepId::ReviseDesign),
        Transition::ok(StepId::ReviseDesign, StepId::ValidateDesign),
        Transition::retry(StepId::ReviseDesign),
        Transition::complete(StepId::Finalize),
        Transition::retry(StepId::Finalize),
    ],
};

pub struct ComponentDesignOrchestrator;

impl Orchestrator for ComponentDesignOrchestrator {
    fn workflow_type(&self) -> WorkflowType {
        WorkflowType::ComponentDesign
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
            StepId::GenerateComponentDesign => Some(&GENERATE),
            StepId::ValidateDesign => Some(&VALIDATE),
            StepId::ReviseDesign => Some(&ReviseDesign),
            StepId::Finalize => Some(&FINALIZE),
            _ => None,
        }
    }
}

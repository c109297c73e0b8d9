//! Context review: one agent review of a context's design, committed as a
//! review document. Writes `review_path`.

use super::{Orchestrator, Transition, TransitionTable, WorkflowType};
use crate::step::{ExecuteReview, Finalize, Initialize, Step, StepId, keys};

static INITIALIZE: Initialize = Initialize { branch_prefix: "review" };
static FINALIZE: Finalize = Finalize {
    artifact_keys: &[keys::REVIEW_PATH],
    commit_prefix: "review",
};

const STEPS: &[StepId] = &[StepId::Initialize, StepId::ExecuteReview, StepId::Finalize];

static TRANSITIONS: TransitionTable = TransitionTable {
    entry: StepId::Initialize,
    transitions: &[
        Transition::ok(StepId::Initialize, StepId::ExecuteReview),
        Transition::retry(StepId::Initialize),
        Transition::ok(StepId::ExecuteReview, StepId::Finalize),
        Transition::retry(StepId::ExecuteReview),
        Transition::complete(StepId::Finalize),
        Transition::retry(StepId::Finalize),
    ],
};

pub struct ContextReviewOrchestrator;

impl Orchestrator for ContextReviewOrchestrator {
    fn workflow_type(&self) -> WorkflowType {
        WorkflowType::ContextReview
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
            StepId::ExecuteReview => Some(&ExecuteReview),
            StepId::Finalize => Some(&FINALIZE),
            _ => None,
        }
    }
}

//! Component coding: implement one component, then run and fix tests until
//! they pass.
//!
//! Reads `design_path` implicitly through the default design location.
//! Writes `branch_name`, `started_at`, `implementation_path`,
//! `test_failures`, `tests_passed_at`, `fix_attempts`, `artifacts` and
//! `committed_at`. A parent context_coding session aggregates
//! `implementation_path`.

use super::{Orchestrator, Transition, TransitionTable, WorkflowType};
use crate::step::{
    FixTestFailures, Finalize, GenerateImplementation, Initialize, RunTests, Step, StepId, keys,
};

static INITIALIZE: Initialize = Initialize { branch_prefix: "code" };
static FINALIZE: Finalize = Finalize {
    artifact_keys: &[keys::IMPLEMENTATION_PATH],
    commit_prefix: "feat",
};

const STEPS: &[StepId] = &[
    StepId::Initialize,
    StepId::GenerateImplementation,
    StepId::RunTests,
    StepId::FixTestFailures,
    StepId::Finalize,
];

static TRANSITIONS: TransitionTable = TransitionTable {
    entry: StepId::Initialize,
    transitions: &[
        Transition::ok(StepId::Initialize, StepId::GenerateImplementation),
        Transition::retry(StepId::Initialize),
        Transition::ok(StepId::GenerateImplementation, StepId::RunTests),
        Transition::retry(StepId::GenerateImplementation),
        Transition::ok(StepId::RunTests, StepId::Finalize),
        Transition::error(StepId::RunTests, StepId::FixTestFailures),
        Transition::ok(StepId::FixTestFailures, StepId::RunTests),
        Transition::retry(StepId::FixTestFailures),
        Transition::complete(StepId::Finalize),
        Transition::retry(StepId::Finalize),
    ],
};

pub struct ComponentCodingOrchestrator;

impl Orchestrator for ComponentCodingOrchestrator {
    fn workflow_type(&self) -> WorkflowType {
        WorkflowType::ComponentCoding
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
            StepId::GenerateImplementation => Some(&GenerateImplementation),
            StepId::RunTests => Some(&RunTests),
            StepId::FixTestFailures => Some(&FixTestFailures),
            StepId::Finalize => Some(&FINALIZE),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ResultStatus;
    use crate::workflow::test_support::next;

    #[test]
    fn implementation_feeds_the_test_loop() {
        let wf = WorkflowType::ComponentCoding;
        assert_eq!(
            next(wf, &[(StepId::Initialize, ResultStatus::Ok)]).unwrap(),
            StepId::GenerateImplementation
        );
        assert_eq!(
            next(
                wf,
                &[
                    (StepId::Initialize, ResultStatus::Ok),
                    (StepId::GenerateImplementation, ResultStatus::Ok),
                    (StepId::RunTests, ResultStatus::Error),
                ]
            )
            .unwrap(),
            StepId::FixTestFailures
        );
    }
}

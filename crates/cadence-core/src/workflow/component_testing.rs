//! Component testing: write tests for one component and loop until they pass.
//!
//! State keys:
//!
//! | key | written by | read by |
//! |---|---|---|
//! | `branch_name`, `started_at` | Initialize | Finalize |
//! | `output_path` | GenerateTests | RunTests, FixTestFailures, Finalize, parent Finalize |
//! | `test_failures` | RunTests (error) | FixTestFailures |
//! | `tests_passed_at` | RunTests (ok) | |
//! | `fix_attempts` | FixTestFailures | |
//! | `artifacts`, `committed_at` | Finalize | |

use super::{Orchestrator, Transition, TransitionTable, WorkflowType};
use crate::step::{FixTestFailures, Finalize, GenerateTests, Initialize, RunTests, Step, StepId, keys};

static INITIALIZE: Initialize = Initialize { branch_prefix: "test" };
static FINALIZE: Finalize = Finalize {
    artifact_keys: &[keys::OUTPUT_PATH],
    commit_prefix: "test",
};

const STEPS: &[StepId] = &[
    StepId::Initialize,
    StepId::GenerateTests,
    StepId::RunTests,
    StepId::FixTestFailures,
    StepId::Finalize,
];

static TRANSITIONS: TransitionTable = TransitionTable {
    entry: StepId::Initialize,
    transitions: &[
        Transition::ok(StepId::Initialize, StepId::GenerateTests),
        Transition::retry(StepId::Initialize),
        Transition::ok(StepId::GenerateTests, StepId::RunTests),
        Transition::retry(StepId::GenerateTests),
        Transition::ok(StepId::RunTests, StepId::Finalize),
        Transition::error(StepId::RunTests, StepId::FixTestFailures),
        Transition::ok(StepId::FixTestFailures, StepId::RunTests),
        Transition::retry(StepId::FixTestFailures),
        Transition::complete(StepId::Finalize),
        Transition::retry(StepId::Finalize),
    ],
};

pub struct ComponentTestingOrchestrator;

impl Orchestrator for ComponentTestingOrchestrator {
    fn workflow_type(&self) -> WorkflowType {
        WorkflowType::ComponentTesting
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
            StepId::GenerateTests => Some(&GenerateTests),
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
    use crate::error::TransitionError;
    use crate::workflow::orchestrator;
    use crate::workflow::test_support::{next, with_history};

    const WF: WorkflowType = WorkflowType::ComponentTesting;
    const OK: ResultStatus = ResultStatus::Ok;
    const ERR: ResultStatus = ResultStatus::Error;

    #[test]
    fn linear_path() {
        let orchestrator = orchestrator(WF);
        assert_eq!(orchestrator.get_next_interaction(None).unwrap(), StepId::Initialize);
        assert_eq!(
            orchestrator.get_next_interaction(Some(&with_history(WF, &[]))).unwrap(),
            StepId::Initialize
        );
        assert_eq!(next(WF, &[(StepId::Initialize, OK)]).unwrap(), StepId::GenerateTests);
        assert_eq!(next(WF, &[(StepId::Initialize, ERR)]).unwrap(), StepId::Initialize);
        assert_eq!(
            next(WF, &[(StepId::Initialize, OK), (StepId::GenerateTests, OK)]).unwrap(),
            StepId::RunTests
        );
    }

    #[test]
    fn failing_tests_loop_through_fix() {
        let base = [(StepId::Initialize, OK), (StepId::GenerateTests, OK)];

        let mut history = base.to_vec();
        history.push((StepId::RunTests, ERR));
        assert_eq!(next(WF, &history).unwrap(), StepId::FixTestFailures);

        history.push((StepId::FixTestFailures, OK));
        assert_eq!(next(WF, &history).unwrap(), StepId::RunTests);

        history.push((StepId::RunTests, OK));
        assert_eq!(next(WF, &history).unwrap(), StepId::Finalize);
    }

    #[test]
    fn finalize_ok_completes_the_session() {
        let history = [
            (StepId::Initialize, OK),
            (StepId::GenerateTests, OK),
            (StepId::RunTests, OK),
            (StepId::Finalize, OK),
        ];
        assert_eq!(next(WF, &history).unwrap_err(), TransitionError::SessionComplete);
        assert!(orchestrator(WF).is_complete(&with_history(WF, &history)));
        assert!(!orchestrator(WF).is_complete(&with_history(WF, &history[..3])));
    }

    #[test]
    fn history_from_another_workflow_is_rejected() {
        let err = next(WF, &[(StepId::ExecuteReview, OK)]).unwrap_err();
        assert!(matches!(err, TransitionError::InvalidInteraction { .. }));
    }

    #[test]
    fn next_is_deterministic() {
        let session = with_history(WF, &[(StepId::Initialize, OK), (StepId::GenerateTests, ERR)]);
        let orchestrator = orchestrator(WF);
        let first = orchestrator.get_next_interaction(Some(&session)).unwrap();
        for _ in 0..10 {
            assert_eq!(orchestrator.get_next_interaction(Some(&session)).unwrap(), first);
        }
    }
}

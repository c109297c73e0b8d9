//! Transition tables: the step graph of a workflow as static data.

use std::collections::HashSet;

use crate::command::ResultStatus;
use crate::error::TransitionError;
use crate::step::StepId;

use super::WorkflowType;

/// Where a transition leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    Step(StepId),
    /// The workflow is done; no further command is issued.
    Complete,
}

/// One edge of the step graph: `from` finishing with `on` leads to `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: StepId,
    pub on: ResultStatus,
    pub to: Next,
}

impl Transition {
    pub const fn new(from: StepId, on: ResultStatus, to: Next) -> Self {
        Self { from, on, to }
    }

    pub const fn ok(from: StepId, to: StepId) -> Self {
        Self::new(from, ResultStatus::Ok, Next::Step(to))
    }

    pub const fn error(from: StepId, to: StepId) -> Self {
        Self::new(from, ResultStatus::Error, Next::Step(to))
    }

    /// A failed step is simply issued again.
    pub const fn retry(step: StepId) -> Self {
        Self::error(step, step)
    }

    pub const fn complete(from: StepId) -> Self {
        Self::new(from, ResultStatus::Ok, Next::Complete)
    }
}

/// The complete step graph of one workflow.
#[derive(Debug, Clone, Copy)]
pub struct TransitionTable {
    /// Step issued when a session has no completed interaction yet
    pub entry: StepId,
    pub transitions: &'static [Transition],
}

impl TransitionTable {
    pub fn lookup(&self, from: StepId, on: ResultStatus) -> Option<Next> {
        self.transitions
            .iter()
            .find(|t| t.from == from && t.on == on)
            .map(|t| t.to)
    }

    /// The step whose `ok` completes the workflow.
    pub fn terminal_step(&self) -> Option<StepId> {
        self.transitions
            .iter()
            .find(|t| t.to == Next::Complete)
            .map(|t| t.from)
    }

    /// Computes the step that follows `last`, the `(step, status)` of the
    /// most recent completed interaction.
    pub fn resolve(
        &self,
        workflow: WorkflowType,
        steps: &[StepId],
        last: Option<(StepId, ResultStatus)>,
    ) -> Result<StepId, TransitionError> {
        let Some((step, status)) = last else {
            return Ok(self.entry);
        };
        if !steps.contains(&step) {
            return Err(TransitionError::InvalidInteraction {
                step,
                workflow: workflow.to_string(),
            });
        }
        match self.lookup(step, status) {
            Some(Next::Step(next)) => Ok(next),
            Some(Next::Complete) => Err(TransitionError::SessionComplete),
            None => Err(TransitionError::InvalidState {
                step,
                status: status.to_string(),
            }),
        }
    }

    /// Checks the table against the declared steps.
    ///
    /// The entry must be declared, every declared step needs at least one
    /// outgoing transition, every source and target must be declared,
    /// exactly one step may complete the workflow, and no `(step, status)`
    /// pair may be mapped twice.
    pub fn validate(&self, steps: &[StepId]) -> Result<(), String> {
        let declared: HashSet<StepId> = steps.iter().copied().collect();
        let mut problems = Vec::new();

        if !declared.contains(&self.entry) {
            problems.push(format!("entry step '{}' is not declared", self.entry));
        }

        let mut seen = HashSet::new();
        for t in self.transitions {
            if !declared.contains(&t.from) {
                problems.push(format!("transition from undeclared step '{}'", t.from));
            }
            if let Next::Step(to) = t.to {
                if !declared.contains(&to) {
                    problems.push(format!("transition from '{}' targets undeclared step '{to}'", t.from));
                }
            }
            if !seen.insert((t.from, t.on)) {
                problems.push(format!("'{}' on '{}' is mapped more than once", t.from, t.on));
            }
        }

        for step in steps {
            if !self.transitions.iter().any(|t| t.from == *step) {
                problems.push(format!("step '{step}' has no outgoing transition"));
            }
        }

        let terminal = self
            .transitions
            .iter()
            .filter(|t| t.to == Next::Complete)
            .count();
        if terminal != 1 {
            problems.push(format!("expected exactly one completing transition, found {terminal}"));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems.join("; "))
        }
    }

    /// Whether a recorded history is a walk this table allows.
    ///
    /// `history` holds each issued step with the status of its result, `None`
    /// for a still-pending interaction (only allowed last).
    pub fn permits_path(&self, history: &[(StepId, Option<ResultStatus>)]) -> bool {
        let Some((first, _)) = history.first() else {
            return true;
        };
        if *first != self.entry {
            return false;
        }
        history.windows(2).all(|pair| {
            let (from, status) = pair[0];
            let (to, _) = pair[1];
            match status {
                Some(status) => self.lookup(from, status) == Some(Next::Step(to)),
                None => false,
            }
        })
    }
}

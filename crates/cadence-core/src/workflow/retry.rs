use serde::{Deserialize, Serialize};

use crate::error::{CadenceError, Result};
use crate::session::Session;
use crate::step::StepId;

pub const DEFAULT_MAX_STEP_ATTEMPTS: u32 = 5;

/// Bounds how often a single step may be issued within one session.
///
/// Retry loops in the transition tables are cycles; this guard is what
/// makes them terminate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// `0` disables the guard
    pub max_step_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_step_attempts: DEFAULT_MAX_STEP_ATTEMPTS,
        }
    }
}

impl RetryPolicy {
    pub fn unlimited() -> Self {
        Self { max_step_attempts: 0 }
    }

    pub fn new(max_step_attempts: u32) -> Self {
        Self { max_step_attempts }
    }

    /// Fails with `RetryLimitExceeded` when `next` has already been issued
    /// `max_step_attempts` times.
    pub fn check(&self, session: &Session, next: StepId) -> Result<()> {
        if self.max_step_attempts == 0 {
            return Ok(());
        }
        if session.attempts(next) >= self.max_step_attempts {
            return Err(CadenceError::RetryLimitExceeded {
                step: next,
                max_attempts: self.max_step_attempts,
            });
        }
        Ok(())
    }
}

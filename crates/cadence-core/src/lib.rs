//! Domain layer of the Cadence session orchestration engine.
//!
//! Sessions are persisted state machines. A workflow's [`workflow::Orchestrator`]
//! decides which step runs next from the session's interaction history, the
//! [`step::Step`] turns that decision into a [`command::Command`], and the
//! result reported back is folded into the session state by the same step.

pub mod command;
pub mod config;
pub mod error;
pub mod interaction;
pub mod session;
pub mod step;
pub mod workflow;

pub use error::{CadenceError, Result};

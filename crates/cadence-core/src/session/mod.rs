//! Session domain module.
//!
//! This module contains the persisted session aggregate, its change events,
//! and the repository/publisher interfaces the engine depends on.
//!
//! # Module Structure
//!
//! - `model`: Core session domain model (`Session`, `SessionStatus`, `SubjectRefs`)
//! - `scope`: Caller identity used to scope every operation (`Scope`)
//! - `state`: Merge semantics for the free-form state map (`StateMap`)
//! - `event`: Change notifications (`SessionEvent`) and their publisher
//! - `repository`: Repository trait for session persistence

mod event;
mod model;
mod repository;
mod scope;
mod state;

pub use event::{SessionEvent, SessionEventKind, SessionEventPublisher};
pub use model::{Session, SessionStatus, SubjectRefs};
pub use repository::SessionRepository;
pub use scope::Scope;
pub use state::{StateMap, merge_state};

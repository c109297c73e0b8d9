//! Application layer for Cadence.
//!
//! Hosts the orchestration façade that drives sessions through their
//! workflows, plus the ephemeral live-status registry.

pub mod live_status;
pub mod orchestration_service;
pub mod session;

pub use live_status::{LiveStatus, LiveStatusRegistry, LiveStatusUpdate};
pub use orchestration_service::OrchestrationService;

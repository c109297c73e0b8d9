//! Driver side of cadence: executes issued commands and reports their
//! results and progress back to the orchestration façade.

pub mod driver;
pub mod environment;
pub mod tracing_layer;

pub use driver::SessionDriver;
pub use environment::{ExecutionEnvironment, ShellEnvironment};
pub use tracing_layer::{LiveStatusLayer, ProgressEvent, forward_progress};

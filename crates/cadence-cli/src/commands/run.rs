use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use cadence_core::step::StepOptions;
use cadence_execution::{SessionDriver, ShellEnvironment};

use super::{CliContext, StepOptionArgs, print_json};

/// Drives a session to a terminal state, executing its commands locally.
pub async fn run(ctx: &CliContext, session_id: &str, dir: Option<PathBuf>, options: StepOptionArgs) -> Result<()> {
    let working_dir = match dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let mut environment = ShellEnvironment::new(&working_dir);
    if let Some(agent) = &ctx.config.orchestration.agent {
        environment = environment.with_default_agent(agent);
    }

    let options: StepOptions = options.into();
    let driver = SessionDriver::new(ctx.service.clone(), Arc::new(environment), ctx.scope.clone()).with_options(options);

    tracing::info!("[run] Driving session {} in {:?}", session_id, working_dir);
    let session = driver.drive(session_id).await?;
    print_json(&session)
}

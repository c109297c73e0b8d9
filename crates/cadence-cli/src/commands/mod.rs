pub mod info;
pub mod run;
pub mod session;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use cadence_application::{LiveStatusRegistry, OrchestrationService};
use cadence_core::command::ResultStatus;
use cadence_core::config::{CadenceConfig, LoggingConfig};
use cadence_core::session::Scope;
use cadence_core::step::StepOptions;
use cadence_execution::{LiveStatusLayer, forward_progress};
use cadence_infrastructure::{BroadcastSessionEventBus, ConfigService, TomlSessionRepository};

/// Everything a subcommand needs: configuration, the façade and the caller's
/// tenant.
pub struct CliContext {
    pub config: CadenceConfig,
    pub config_path: PathBuf,
    pub service: Arc<OrchestrationService>,
    pub scope: Scope,
}

impl CliContext {
    pub fn load(tenant: Option<String>, data_dir: Option<PathBuf>) -> Result<Self> {
        let config_service = ConfigService::default_location()?;
        let config = config_service.load()?;
        let live_status = Arc::new(LiveStatusRegistry::new());
        init_logging(&config.logging, live_status.clone());

        let data_dir = data_dir.or_else(|| config.storage.data_dir.clone());
        let repository = TomlSessionRepository::default_location(data_dir.as_ref())
            .context("Failed to open the session store")?;
        tracing::debug!("[CliContext] Sessions stored in {:?}", repository.sessions_dir());

        let service = OrchestrationService::new(
            Arc::new(repository),
            Arc::new(BroadcastSessionEventBus::default()),
        )
        .with_retry_policy(config.orchestration.retry_policy())
        .with_default_options(config.orchestration.default_options())
        .with_live_status(live_status);

        let scope = Scope::tenant(tenant.unwrap_or_else(|| config.orchestration.default_tenant.clone()));
        Ok(Self {
            config_path: config_service.path().to_path_buf(),
            config,
            service: Arc::new(service),
            scope,
        })
    }
}

/// Installs the global subscriber: `RUST_LOG` wins over `logging.filter`.
/// Logs go to stderr so stdout stays machine-readable.
fn init_logging(logging: &LoggingConfig, live_status: Arc<LiveStatusRegistry>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));

    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(forward_progress(rx, live_status));

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(LiveStatusLayer::new(tx));
    // A subscriber installed earlier (e.g. by tests) stays in place
    if logging.json {
        let _ = registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init();
    } else {
        let _ = registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init();
    }
}

/// Per-call overrides for command generation.
#[derive(Args, Debug, Default)]
pub struct StepOptionArgs {
    /// Agent to hand agent-mode commands to
    #[arg(long)]
    pub agent: Option<String>,
    /// Command line for test-running steps
    #[arg(long)]
    pub test_command: Option<String>,
    /// Extra option copied into command metadata (repeatable)
    #[arg(long = "option", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub extra: Vec<(String, String)>,
}

impl From<StepOptionArgs> for StepOptions {
    fn from(args: StepOptionArgs) -> Self {
        StepOptions {
            agent: args.agent,
            test_command: args.test_command,
            extra: args
                .extra
                .into_iter()
                .map(|(key, value)| (key, serde_json::Value::String(value)))
                .collect(),
        }
    }
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.trim().to_string(), value.to_string()))
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum StatusArg {
    Ok,
    Error,
}

impl From<StatusArg> for ResultStatus {
    fn from(status: StatusArg) -> Self {
        match status {
            StatusArg::Ok => ResultStatus::Ok,
            StatusArg::Error => ResultStatus::Error,
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

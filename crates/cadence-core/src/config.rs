use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::step::StepOptions;
use crate::workflow::{DEFAULT_MAX_STEP_ATTEMPTS, RetryPolicy};

/// Root of `config.toml`. Every section and field is optional.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct CadenceConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub orchestration: OrchestrationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct StorageConfig {
    /// Overrides the platform data directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct OrchestrationConfig {
    /// Per-step issue limit within one session; 0 disables the guard
    #[serde(default = "default_max_step_attempts")]
    pub max_step_attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default = "default_tenant")]
    pub default_tenant: String,
}

fn default_max_step_attempts() -> u32 {
    DEFAULT_MAX_STEP_ATTEMPTS
}

fn default_tenant() -> String {
    "default".to_string()
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            max_step_attempts: default_max_step_attempts(),
            test_command: None,
            agent: None,
            default_tenant: default_tenant(),
        }
    }
}

impl OrchestrationConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_step_attempts)
    }

    /// Options applied when a caller leaves a field unset.
    pub fn default_options(&self) -> StepOptions {
        StepOptions {
            agent: self.agent.clone(),
            test_command: self.test_command.clone(),
            ..StepOptions::default()
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` wins when set
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
        }
    }
}

//! Execution environments: where issued commands actually run.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tokio::process::Command as Process;

use cadence_core::command::{CommandPayload, CommandResult, ExecutionMode};
use cadence_core::interaction::Interaction;

/// Runs one issued command and reports what happened.
///
/// Failures of the command itself are results, not errors: an environment
/// always produces a `CommandResult`.
#[async_trait]
pub trait ExecutionEnvironment: Send + Sync {
    async fn run(&self, interaction: &Interaction) -> CommandResult;
}

/// Runs shell commands with `sh -c`, agent prompts through an external agent
/// program, and validates design documents on disk.
///
/// Progress is reported as tracing events with a `progress` field; see
/// [`LiveStatusLayer`](crate::LiveStatusLayer).
pub struct ShellEnvironment {
    working_dir: PathBuf,
    /// Agent program used when a command does not name one
    default_agent: Option<String>,
}

impl ShellEnvironment {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            default_agent: None,
        }
    }

    pub fn with_default_agent(mut self, agent: impl Into<String>) -> Self {
        self.default_agent = Some(agent.into());
        self
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    async fn run_process(&self, mut process: Process, label: &str) -> CommandResult {
        tracing::debug!("[ShellEnvironment] Running {} in {:?}", label, self.working_dir);
        let output = match process.current_dir(&self.working_dir).output().await {
            Ok(output) => output,
            Err(e) => return CommandResult::error(format!("failed to start {label}: {e}")),
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if output.status.success() {
            return CommandResult::ok().with_data("output", stdout);
        }

        let message = if stderr.trim().is_empty() {
            format!("{label} exited with {}", output.status)
        } else {
            stderr.trim().to_string()
        };
        CommandResult::error(message).with_data("output", format!("{stdout}{stderr}"))
    }

    async fn run_shell(&self, command_line: &str) -> CommandResult {
        tracing::info!(progress = "running shell command", "[ShellEnvironment] $ {}", command_line);
        let mut process = Process::new("sh");
        process.arg("-c").arg(command_line);
        self.run_process(process, "shell command").await
    }

    async fn run_agent(&self, interaction: &Interaction, prompt: &str) -> CommandResult {
        let Some(agent) = interaction
            .command
            .metadata_str("agent")
            .or(self.default_agent.as_deref())
        else {
            return CommandResult::error("no agent configured for agent-mode command");
        };
        tracing::info!(progress = "waiting for agent", "[ShellEnvironment] Invoking agent '{}'", agent);
        let mut process = Process::new(agent);
        process.arg(prompt);
        self.run_process(process, agent).await
    }

    async fn run_structured(&self, instruction: &Map<String, Value>) -> CommandResult {
        match instruction.get("action").and_then(Value::as_str) {
            Some("validate_design") => self.validate_design(instruction).await,
            Some(action) => CommandResult::error(format!("unsupported action '{action}'")),
            None => CommandResult::error("structured command without an action"),
        }
    }

    /// Checks that every required section appears as a markdown heading.
    async fn validate_design(&self, instruction: &Map<String, Value>) -> CommandResult {
        let Some(path) = instruction.get("path").and_then(Value::as_str) else {
            return CommandResult::error("validate_design without a path");
        };
        tracing::info!(progress = "validating design", "[ShellEnvironment] Validating {}", path);

        let document = match tokio::fs::read_to_string(self.working_dir.join(path)).await {
            Ok(document) => document,
            Err(e) => {
                return CommandResult::error(format!("cannot read {path}: {e}"))
                    .with_data("errors", json!([format!("design document {path} is missing")]));
            }
        };

        let missing = missing_sections(&document, instruction.get("required_sections"));
        if missing.is_empty() {
            CommandResult::ok()
        } else {
            let errors: Vec<String> = missing.iter().map(|s| format!("missing section: {s}")).collect();
            CommandResult::error("design validation failed").with_data("errors", json!(errors))
        }
    }
}

fn missing_sections<'a>(document: &str, required: Option<&'a Value>) -> Vec<&'a str> {
    let headings: Vec<String> = document
        .lines()
        .filter_map(|line| line.trim_start().strip_prefix('#'))
        .map(|heading| heading.trim_start_matches('#').trim().to_lowercase())
        .collect();

    required
        .and_then(Value::as_array)
        .map(|sections| {
            sections
                .iter()
                .filter_map(Value::as_str)
                .filter(|section| !headings.iter().any(|h| *h == section.to_lowercase()))
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl ExecutionEnvironment for ShellEnvironment {
    async fn run(&self, interaction: &Interaction) -> CommandResult {
        let command = &interaction.command;
        match (&command.payload, command.execution_mode) {
            (CommandPayload::Text(line), ExecutionMode::Shell) => self.run_shell(line).await,
            (CommandPayload::Text(prompt), ExecutionMode::Agent) => self.run_agent(interaction, prompt).await,
            (CommandPayload::Structured(instruction), _) => self.run_structured(instruction).await,
        }
    }
}

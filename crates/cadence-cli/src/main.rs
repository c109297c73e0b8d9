use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use cadence_core::workflow::WorkflowType;

mod commands;

#[derive(Parser)]
#[command(name = "cadence")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Cadence - session orchestration for agent-driven development workflows", long_about = None)]
struct Cli {
    /// Tenant to act for (defaults to `orchestration.default_tenant`)
    #[arg(global = true, long)]
    tenant: Option<String>,

    /// Directory holding the session store (overrides `storage.data_dir`)
    #[arg(global = true, long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new session
    Start {
        /// Workflow to run (see `cadence workflows`)
        workflow: WorkflowType,
        #[arg(long)]
        project: String,
        /// Component or context the session works on
        #[arg(long)]
        component: Option<String>,
        /// Human-readable name used for branches and file names
        #[arg(long)]
        name: Option<String>,
        /// Components a context-level session fans out to
        #[arg(long, value_delimiter = ',')]
        components: Vec<String>,
        /// Parent session to link the new session under
        #[arg(long)]
        parent: Option<String>,
    },
    /// Issue the next command of a session
    Next {
        session_id: String,
        #[command(flatten)]
        options: commands::StepOptionArgs,
    },
    /// Report the result of a pending command
    Submit {
        session_id: String,
        interaction_id: String,
        #[arg(long, value_enum)]
        status: commands::StatusArg,
        /// Error message for a failed command
        #[arg(long)]
        message: Option<String>,
        /// Result data as a JSON object
        #[arg(long)]
        data: Option<String>,
    },
    /// Print a session
    Show { session_id: String },
    /// List the tenant's sessions
    List {
        #[arg(long)]
        workflow: Option<WorkflowType>,
    },
    /// List a session's children
    Children { session_id: String },
    /// Mark a session failed
    Fail {
        session_id: String,
        #[arg(long)]
        reason: String,
    },
    /// Delete a session, detaching its children
    Delete { session_id: String },
    /// Drive a session to completion in the current directory
    Run {
        session_id: String,
        /// Directory commands run in
        #[arg(long)]
        dir: Option<PathBuf>,
        #[command(flatten)]
        options: commands::StepOptionArgs,
    },
    /// List the available workflows
    Workflows,
    /// Print the effective configuration and where it was read from
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let ctx = commands::CliContext::load(cli.tenant, cli.data_dir)?;

    match cli.command {
        Commands::Start {
            workflow,
            project,
            component,
            name,
            components,
            parent,
        } => {
            commands::session::start(&ctx, workflow, project, component, name, components, parent).await?
        }
        Commands::Next { session_id, options } => commands::session::next(&ctx, &session_id, options).await?,
        Commands::Submit {
            session_id,
            interaction_id,
            status,
            message,
            data,
        } => commands::session::submit(&ctx, &session_id, &interaction_id, status, message, data).await?,
        Commands::Show { session_id } => commands::session::show(&ctx, &session_id).await?,
        Commands::List { workflow } => commands::session::list(&ctx, workflow).await?,
        Commands::Children { session_id } => commands::session::children(&ctx, &session_id).await?,
        Commands::Fail { session_id, reason } => commands::session::fail(&ctx, &session_id, &reason).await?,
        Commands::Delete { session_id } => commands::session::delete(&ctx, &session_id).await?,
        Commands::Run {
            session_id,
            dir,
            options,
        } => commands::run::run(&ctx, &session_id, dir, options).await?,
        Commands::Workflows => commands::info::workflows()?,
        Commands::Config => commands::info::config(&ctx)?,
    }

    Ok(())
}

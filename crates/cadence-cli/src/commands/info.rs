use anyhow::Result;
use serde_json::json;
use strum::IntoEnumIterator;

use cadence_core::workflow::{WorkflowType, orchestrator};

use super::{CliContext, print_json};

/// Lists every workflow with its declared steps.
pub fn workflows() -> Result<()> {
    let catalog: Vec<_> = WorkflowType::iter()
        .map(|workflow| {
            let orchestrator = orchestrator(workflow);
            json!({
                "workflow_type": workflow,
                "description": workflow.description(),
                "steps": orchestrator.steps(),
                "child_workflow": workflow.child_workflow(),
            })
        })
        .collect();
    print_json(&catalog)
}

pub fn config(ctx: &CliContext) -> Result<()> {
    print_json(&json!({
        "path": ctx.config_path,
        "config": ctx.config,
        "tenant": ctx.scope.tenant_id,
    }))
}

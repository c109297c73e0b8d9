use anyhow::{Context, Result, bail};
use serde_json::{Map, Value};

use cadence_core::command::{CommandResult, ResultStatus};
use cadence_core::session::SubjectRefs;
use cadence_core::workflow::WorkflowType;

use super::{CliContext, StatusArg, StepOptionArgs, print_json};

pub async fn start(
    ctx: &CliContext,
    workflow: WorkflowType,
    project: String,
    component: Option<String>,
    name: Option<String>,
    components: Vec<String>,
    parent: Option<String>,
) -> Result<()> {
    let subject = SubjectRefs {
        project_id: project,
        component_id: component,
        name,
        component_ids: components,
    };
    let session = ctx
        .service
        .start(&ctx.scope, workflow, subject, parent.as_deref())
        .await?;
    print_json(&session)
}

pub async fn next(ctx: &CliContext, session_id: &str, options: StepOptionArgs) -> Result<()> {
    let interaction = ctx
        .service
        .next_command(&ctx.scope, session_id, &options.into())
        .await?;
    print_json(&interaction)
}

pub async fn submit(
    ctx: &CliContext,
    session_id: &str,
    interaction_id: &str,
    status: StatusArg,
    message: Option<String>,
    data: Option<String>,
) -> Result<()> {
    let result = build_result(status.into(), message, data.as_deref())?;
    let session = ctx
        .service
        .submit_result(&ctx.scope, session_id, interaction_id, result)
        .await?;
    print_json(&session)
}

fn build_result(status: ResultStatus, message: Option<String>, data: Option<&str>) -> Result<CommandResult> {
    let data: Map<String, Value> = match data {
        Some(raw) => serde_json::from_str(raw).context("--data must be a JSON object")?,
        None => Map::new(),
    };
    let result = match (status, message) {
        (ResultStatus::Ok, None) => CommandResult::ok(),
        (ResultStatus::Ok, Some(_)) => bail!("--message only applies to failed commands"),
        (ResultStatus::Error, message) => {
            CommandResult::error(message.unwrap_or_else(|| "command failed".to_string()))
        }
    };
    Ok(CommandResult { data, ..result })
}

pub async fn show(ctx: &CliContext, session_id: &str) -> Result<()> {
    let session = ctx.service.get_session(&ctx.scope, session_id).await?;
    print_json(&session)
}

pub async fn list(ctx: &CliContext, workflow: Option<WorkflowType>) -> Result<()> {
    let sessions = ctx.service.list_sessions(&ctx.scope, workflow).await?;
    let summaries: Vec<Value> = sessions
        .iter()
        .map(|session| {
            serde_json::json!({
                "id": session.id,
                "workflow_type": session.workflow_type,
                "status": session.status,
                "subject": session.subject.label(),
                "interactions": session.interactions.len(),
                "parent_session_id": session.parent_session_id,
                "updated_at": session.updated_at,
            })
        })
        .collect();
    print_json(&summaries)
}

pub async fn children(ctx: &CliContext, session_id: &str) -> Result<()> {
    let children = ctx.service.child_sessions(&ctx.scope, session_id).await?;
    print_json(&children)
}

pub async fn fail(ctx: &CliContext, session_id: &str, reason: &str) -> Result<()> {
    let session = ctx.service.fail_session(&ctx.scope, session_id, reason).await?;
    print_json(&session)
}

pub async fn delete(ctx: &CliContext, session_id: &str) -> Result<()> {
    ctx.service.delete_session(&ctx.scope, session_id).await?;
    print_json(&serde_json::json!({ "deleted": session_id }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_result_parses_data() {
        let result = build_result(ResultStatus::Ok, None, Some(r#"{"output_path": "tests/a.rs"}"#)).unwrap();
        assert!(result.is_ok());
        assert_eq!(result.data_str("output_path"), Some("tests/a.rs"));
    }

    #[test]
    fn test_build_result_error_keeps_message() {
        let result = build_result(ResultStatus::Error, Some("2 failed".into()), None).unwrap();
        assert_eq!(result.error_message.as_deref(), Some("2 failed"));
    }

    #[test]
    fn test_build_result_rejects_non_object_data() {
        assert!(build_result(ResultStatus::Ok, None, Some("[1, 2]")).is_err());
        assert!(build_result(ResultStatus::Ok, Some("x".into()), None).is_err());
    }
}

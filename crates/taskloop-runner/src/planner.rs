//! Plan Builder: task description in, validated plan out.

use serde::Deserialize;
use taskloop_core::{Plan, PlanningError, Task};
use taskloop_prompts::SYSTEM_PROMPT;
use tracing::{info, warn};

use crate::backend::{Message, ModelGateway};
use crate::extract::extract_json;
use crate::subtask_parser::{FieldError, RawSubtask};

#[derive(Deserialize)]
struct RawPlan {
    #[serde(default)]
    subtasks: Option<Vec<RawSubtask>>,
}

/// Ask the model to decompose `task` and parse its answer into a plan.
pub async fn build(
    gateway: &dyn ModelGateway,
    task: &Task,
    tool_names: &[String],
) -> Result<Plan, PlanningError> {
    let messages = [
        Message::system(SYSTEM_PROMPT),
        Message::user(taskloop_prompts::plan::assemble(task, tool_names)),
    ];
    let response = gateway
        .complete(&messages, None)
        .await
        .map_err(|e| PlanningError::Gateway(e.to_string()))?;

    let plan = parse_plan(response.content_str())?;
    info!("plan built: {} subtasks", plan.len());
    Ok(plan)
}

/// Parse raw model text into a plan of fresh `Pending` subtasks.
pub fn parse_plan(text: &str) -> Result<Plan, PlanningError> {
    let payload = extract_json(text);
    if payload.is_empty() {
        return Err(PlanningError::EmptyResponse);
    }
    let raw: RawPlan =
        serde_json::from_str(payload).map_err(|e| PlanningError::MalformedJson(e.to_string()))?;
    let raw_subtasks = raw.subtasks.ok_or(PlanningError::MalformedJson(
        "missing `subtasks` array".into(),
    ))?;
    if raw_subtasks.is_empty() {
        return Err(PlanningError::NoSubtasks);
    }

    let mut plan = Plan::new();
    for (index, raw) in raw_subtasks.into_iter().enumerate() {
        let subtask = raw.into_subtask(None).map_err(|e| match e {
            FieldError::Missing(field) => PlanningError::MissingField { index, field },
            FieldError::UnknownComplexity { id, value } => {
                PlanningError::UnknownComplexity { id, value }
            }
        })?;
        let requested = subtask.id.clone();
        let assigned = plan.push(subtask);
        if assigned != requested {
            warn!("duplicate subtask id {requested} renamed to {assigned}");
        }
    }
    Ok(plan)
}

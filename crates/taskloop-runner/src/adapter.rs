//! Plan Adapter: asks the model how to route around a subtask that ran out
//! of attempts, then applies the answer to the plan.

use serde::Deserialize;
use taskloop_core::{
    AdaptationError, AdaptationRecord, AdaptationStrategy, CritiqueResult, Plan, Subtask,
    SubtaskStatus,
};
use taskloop_prompts::SYSTEM_PROMPT;
use tracing::{debug, info, warn};

use crate::backend::{Message, ModelGateway};
use crate::extract::extract_json;
use crate::subtask_parser::{FieldError, RawSubtask};

#[derive(Deserialize)]
struct RawRemedy {
    #[serde(default)]
    strategy: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    subtasks: Option<Vec<RawSubtask>>,
}

/// A parsed, validated remediation not yet applied to any plan.
#[derive(Debug)]
pub struct Remedy {
    pub strategy: AdaptationStrategy,
    pub reasoning: String,
    pub subtasks: Vec<Subtask>,
}

/// Parse the model's answer. New subtasks inherit `default_priority` when
/// they carry none and are marked as adapted.
pub fn parse_remedy(text: &str, default_priority: i64) -> Result<Remedy, AdaptationError> {
    let payload = extract_json(text);
    if payload.is_empty() {
        return Err(AdaptationError::MalformedJson("empty response".into()));
    }
    let raw: RawRemedy =
        serde_json::from_str(payload).map_err(|e| AdaptationError::MalformedJson(e.to_string()))?;

    let strategy_str = raw.strategy.unwrap_or_default();
    let strategy = AdaptationStrategy::parse_str(&strategy_str)
        .ok_or(AdaptationError::UnknownStrategy(strategy_str))?;

    let mut subtasks = Vec::new();
    for (index, raw) in raw.subtasks.unwrap_or_default().into_iter().enumerate() {
        let mut subtask = raw.into_subtask(Some(default_priority)).map_err(|e| match e {
            FieldError::Missing(field) => AdaptationError::MissingField { index, field },
            FieldError::UnknownComplexity { id, value } => {
                AdaptationError::UnknownComplexity { id, value }
            }
        })?;
        subtask.is_adapted = true;
        subtasks.push(subtask);
    }

    Ok(Remedy {
        strategy,
        reasoning: raw.reasoning.unwrap_or_default(),
        subtasks,
    })
}

/// Apply `remedy` to the failed subtask `failed_id`.
///
/// The plan is left untouched when this returns an error. Subtasks are
/// only ever appended.
pub fn apply(
    plan: &mut Plan,
    failed_id: &str,
    remedy: Remedy,
) -> Result<AdaptationRecord, AdaptationError> {
    let failed = plan
        .get_mut(failed_id)
        .ok_or_else(|| AdaptationError::UnknownSubtask(failed_id.to_string()))?;

    let appends = match remedy.strategy {
        AdaptationStrategy::Replace => {
            failed.transition_to(SubtaskStatus::Replaced)?;
            if remedy.subtasks.is_empty() {
                warn!("subtask {failed_id} replaced with no new subtasks");
            }
            true
        }
        AdaptationStrategy::Skip => {
            failed.transition_to(SubtaskStatus::Skipped)?;
            if !remedy.subtasks.is_empty() {
                debug!(
                    "ignoring {} subtasks proposed alongside skip",
                    remedy.subtasks.len()
                );
            }
            false
        }
        AdaptationStrategy::Supplement => {
            if failed.status != SubtaskStatus::Failed {
                return Err(AdaptationError::Status(taskloop_core::StatusError {
                    id: failed_id.to_string(),
                    from: failed.status,
                    to: SubtaskStatus::Failed,
                }));
            }
            true
        }
    };

    let mut added = Vec::new();
    if appends {
        for subtask in remedy.subtasks {
            let requested = subtask.id.clone();
            let assigned = plan.push(subtask);
            if assigned != requested {
                warn!("adapted subtask id {requested} collides, stored as {assigned}");
            }
            added.push(assigned);
        }
    }

    Ok(AdaptationRecord {
        failed_subtask: failed_id.to_string(),
        strategy: remedy.strategy,
        reasoning: remedy.reasoning,
        added,
    })
}

/// Ask the model for a remedy for `failed` and apply it to `plan`.
pub async fn adapt(
    gateway: &dyn ModelGateway,
    plan: &mut Plan,
    failed: &Subtask,
    critique: &CritiqueResult,
    tool_names: &[String],
) -> Result<AdaptationRecord, AdaptationError> {
    let prompt =
        taskloop_prompts::adapt::assemble(failed, critique, &plan.progress(), tool_names);
    let messages = [Message::system(SYSTEM_PROMPT), Message::user(prompt)];
    let response = gateway
        .complete(&messages, None)
        .await
        .map_err(|e| AdaptationError::Gateway(e.to_string()))?;

    let remedy = parse_remedy(response.content_str(), failed.priority)?;
    let record = apply(plan, &failed.id, remedy)?;
    info!(
        "adapted subtask {} via {}: {} new subtask(s)",
        record.failed_subtask,
        record.strategy,
        record.added.len()
    );
    Ok(record)
}

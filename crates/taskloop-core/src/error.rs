use thiserror::Error;

use crate::subtask::SubtaskStatus;

/// The model did not produce a usable plan. Fatal to a task run.
#[derive(Debug, Error)]
pub enum PlanningError {
    #[error("model gateway failed: {0}")]
    Gateway(String),

    #[error("model returned an empty plan response")]
    EmptyResponse,

    #[error("plan response is not valid JSON: {0}")]
    MalformedJson(String),

    #[error("subtask {index} is missing required field `{field}`")]
    MissingField { index: usize, field: &'static str },

    #[error("subtask {id} has unknown complexity `{value}`")]
    UnknownComplexity { id: String, value: String },

    #[error("plan contains no subtasks")]
    NoSubtasks,
}

/// Remediation could not be applied. Never propagated past the controller.
#[derive(Debug, Error)]
pub enum AdaptationError {
    #[error("model gateway failed: {0}")]
    Gateway(String),

    #[error("adaptation response is not valid JSON: {0}")]
    MalformedJson(String),

    #[error("unknown adaptation strategy `{0}`")]
    UnknownStrategy(String),

    #[error("new subtask {index} is missing required field `{field}`")]
    MissingField { index: usize, field: &'static str },

    #[error("new subtask {id} has unknown complexity `{value}`")]
    UnknownComplexity { id: String, value: String },

    #[error("subtask {0} is not in the plan")]
    UnknownSubtask(String),

    #[error(transparent)]
    Status(#[from] StatusError),
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("subtask {id}: illegal status transition {from} -> {to}")]
pub struct StatusError {
    pub id: String,
    pub from: SubtaskStatus,
    pub to: SubtaskStatus,
}

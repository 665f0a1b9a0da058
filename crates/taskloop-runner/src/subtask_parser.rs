//! Subtask records as the model writes them, shared by planning and
//! adaptation.

use serde::Deserialize;
use serde_json::Value;
use taskloop_core::{Complexity, Subtask};
use tracing::warn;

/// A subtask exactly as the model supplied it. Execution state (status,
/// attempts) is not read even when present.
#[derive(Debug, Deserialize)]
pub(crate) struct RawSubtask {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, alias = "definitionOfDone")]
    definition_of_done: Option<Vec<String>>,
    #[serde(default)]
    dependencies: Option<Vec<Value>>,
    #[serde(default)]
    priority: Option<i64>,
    #[serde(default)]
    complexity: Option<String>,
    #[serde(default, alias = "requiredTools")]
    required_tools: Option<Vec<String>>,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum FieldError {
    Missing(&'static str),
    UnknownComplexity { id: String, value: String },
}

/// Ids may arrive as strings or bare numbers.
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl RawSubtask {
    /// Validate into a fresh `Pending` subtask. `default_priority` fills in
    /// a missing priority; without one, priority is required.
    pub(crate) fn into_subtask(self, default_priority: Option<i64>) -> Result<Subtask, FieldError> {
        let id = self
            .id
            .as_ref()
            .and_then(id_string)
            .ok_or(FieldError::Missing("id"))?;
        let description = self
            .description
            .filter(|d| !d.trim().is_empty())
            .ok_or(FieldError::Missing("description"))?;
        let priority = self
            .priority
            .or(default_priority)
            .ok_or(FieldError::Missing("priority"))?;
        let complexity = match self.complexity {
            None => Complexity::Medium,
            Some(value) => Complexity::parse_str(&value)
                .ok_or_else(|| FieldError::UnknownComplexity { id: id.clone(), value })?,
        };

        // An unreadable dependency is kept verbatim so it never resolves.
        let dependencies: Vec<String> = self
            .dependencies
            .unwrap_or_default()
            .iter()
            .map(|dep| {
                id_string(dep).unwrap_or_else(|| {
                    warn!("subtask {id} has unrecognised dependency {dep}, it will block");
                    dep.to_string()
                })
            })
            .collect();

        let mut subtask = Subtask::new(id, description.trim());
        subtask.priority = priority;
        subtask.complexity = complexity;
        subtask.definition_of_done = self.definition_of_done.unwrap_or_default();
        subtask.dependencies = dependencies;
        subtask.required_tools = self.required_tools.unwrap_or_default();
        Ok(subtask)
    }
}

use serde::{Deserialize, Serialize};

/// The user-supplied coding task. Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub description: String,
    #[serde(default)]
    pub constraints: Vec<String>,
}

impl Task {
    pub fn new(description: impl Into<String>, constraints: Vec<String>) -> Self {
        Self {
            description: description.into(),
            constraints,
        }
    }
}

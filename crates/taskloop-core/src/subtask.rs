use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StatusError;

/// Estimated effort for a subtask. Secondary scheduling key, lower first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Low => "low",
            Complexity::Medium => "medium",
            Complexity::High => "high",
        }
    }

    /// Strict, case-insensitive parse. Unknown tags are `None` so callers
    /// can fail loudly instead of guessing a default.
    pub fn parse_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Complexity::Low),
            "medium" => Some(Complexity::Medium),
            "high" => Some(Complexity::High),
            _ => None,
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a subtask.
///
/// ```text
/// Pending -> InProgress -> Completed
/// InProgress -> Pending            (retry)
/// InProgress -> Failed             (attempts exhausted)
/// Failed -> Replaced | Skipped     (adaptation)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Replaced,
    Skipped,
}

impl SubtaskStatus {
    pub const ALL: &[SubtaskStatus] = &[
        SubtaskStatus::Pending,
        SubtaskStatus::InProgress,
        SubtaskStatus::Completed,
        SubtaskStatus::Failed,
        SubtaskStatus::Replaced,
        SubtaskStatus::Skipped,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubtaskStatus::Pending => "pending",
            SubtaskStatus::InProgress => "in_progress",
            SubtaskStatus::Completed => "completed",
            SubtaskStatus::Failed => "failed",
            SubtaskStatus::Replaced => "replaced",
            SubtaskStatus::Skipped => "skipped",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SubtaskStatus::Pending),
            "in_progress" => Some(SubtaskStatus::InProgress),
            "completed" => Some(SubtaskStatus::Completed),
            "failed" => Some(SubtaskStatus::Failed),
            "replaced" => Some(SubtaskStatus::Replaced),
            "skipped" => Some(SubtaskStatus::Skipped),
            _ => None,
        }
    }

    /// Resolved statuses unblock dependents. `Failed` never does.
    pub fn is_resolved(&self) -> bool {
        matches!(
            self,
            SubtaskStatus::Completed | SubtaskStatus::Replaced | SubtaskStatus::Skipped
        )
    }

    pub fn can_transition_to(&self, next: SubtaskStatus) -> bool {
        use SubtaskStatus::{Completed, Failed, InProgress, Pending, Replaced, Skipped};
        matches!(
            (self, next),
            (Pending, InProgress)
                | (InProgress, Completed)
                | (InProgress, Pending)
                | (InProgress, Failed)
                | (Failed, Replaced)
                | (Failed, Skipped)
        )
    }
}

impl fmt::Display for SubtaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One planned unit of work with its own acceptance criteria and lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: String,
    pub description: String,
    pub definition_of_done: Vec<String>,
    pub dependencies: Vec<String>,
    pub priority: i64,
    pub complexity: Complexity,
    pub required_tools: Vec<String>,
    pub status: SubtaskStatus,
    pub attempt_count: u32,
    pub is_adapted: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Subtask {
    /// A fresh `Pending` subtask with priority 0, medium complexity and no
    /// criteria, dependencies or tools.
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            definition_of_done: Vec::new(),
            dependencies: Vec::new(),
            priority: 0,
            complexity: Complexity::Medium,
            required_tools: Vec::new(),
            status: SubtaskStatus::Pending,
            attempt_count: 0,
            is_adapted: false,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_resolved()
    }

    /// Move to `next`, rejecting anything the lifecycle does not allow.
    pub fn transition_to(&mut self, next: SubtaskStatus) -> Result<(), StatusError> {
        if !self.status.can_transition_to(next) {
            return Err(StatusError {
                id: self.id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Pending -> InProgress, counting the attempt and stamping its start.
    pub fn begin_attempt(&mut self) -> Result<(), StatusError> {
        self.transition_to(SubtaskStatus::InProgress)?;
        self.attempt_count += 1;
        self.started_at = Some(Utc::now());
        self.finished_at = None;
        Ok(())
    }

    pub fn finish_attempt(&mut self) {
        self.finished_at = Some(Utc::now());
    }
}

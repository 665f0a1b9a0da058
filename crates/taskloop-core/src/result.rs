use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::plan::Plan;
use crate::subtask::Subtask;

/// Outcome of one Executor invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    pub response: String,
    pub tool_calls_executed: usize,
    /// `tool_name: result` per executed (or attempted) call, in order.
    pub tool_results: Vec<String>,
    pub success: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationMetrics {
    pub tool_calls: usize,
    pub response_length: usize,
}

/// Build/test/lint verdicts for the working tree after an attempt.
///
/// Every check defaults to passing: a tree with nothing to verify is not a
/// failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationResult {
    pub build_success: bool,
    pub tests_pass: bool,
    pub lint_pass: bool,
    pub logs: Vec<String>,
    pub metrics: ObservationMetrics,
}

impl Default for ObservationResult {
    fn default() -> Self {
        Self {
            build_success: true,
            tests_pass: true,
            lint_pass: true,
            logs: Vec::new(),
            metrics: ObservationMetrics::default(),
        }
    }
}

impl ObservationResult {
    pub fn all_passed(&self) -> bool {
        self.build_success && self.tests_pass && self.lint_pass
    }
}

/// Coarse classification of why a subtask failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    #[default]
    None,
    Compilation,
    Logic,
    Style,
    Environment,
    Network,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::None => "none",
            ErrorType::Compilation => "compilation",
            ErrorType::Logic => "logic",
            ErrorType::Style => "style",
            ErrorType::Environment => "environment",
            ErrorType::Network => "network",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single problem raised by the critic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub message: String,
    pub error_type: ErrorType,
    /// Non-critical issues are recorded but never fail a subtask on their own.
    pub critical: bool,
}

impl Issue {
    pub fn critical(message: impl Into<String>, error_type: ErrorType) -> Self {
        Self {
            message: message.into(),
            error_type,
            critical: true,
        }
    }

    pub fn minor(message: impl Into<String>, error_type: ErrorType) -> Self {
        Self {
            message: message.into(),
            error_type,
            critical: false,
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.critical {
            write!(f, "[{}] {}", self.error_type, self.message)
        } else {
            write!(f, "[{}, non-critical] {}", self.error_type, self.message)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CritiqueResult {
    pub success: bool,
    pub issues: Vec<Issue>,
    pub error_type: ErrorType,
    pub feedback: String,
}

/// Remediation chosen by the plan adapter for a terminally failed subtask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdaptationStrategy {
    Replace,
    Supplement,
    Skip,
}

impl AdaptationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdaptationStrategy::Replace => "replace",
            AdaptationStrategy::Supplement => "supplement",
            AdaptationStrategy::Skip => "skip",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replace" => Some(AdaptationStrategy::Replace),
            "supplement" => Some(AdaptationStrategy::Supplement),
            "skip" => Some(AdaptationStrategy::Skip),
            _ => None,
        }
    }
}

impl fmt::Display for AdaptationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the plan adapter did in an iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdaptationRecord {
    pub failed_subtask: String,
    pub strategy: AdaptationStrategy,
    pub reasoning: String,
    pub added: Vec<String>,
}

/// One turn of the completion loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationResult {
    pub iteration: u32,
    pub progress: String,
    /// Snapshot of the selected subtask at the end of the iteration.
    pub subtask: Subtask,
    pub action: Option<ActionResult>,
    pub observation: Option<ObservationResult>,
    pub critique: Option<CritiqueResult>,
    pub adaptation: Option<AdaptationRecord>,
    pub success: bool,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Why the completion loop stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum TerminationReason {
    AllResolved,
    /// Nothing schedulable while these subtasks remain unresolved.
    Deadlock { blocked: Vec<String> },
    IterationLimit,
    TimeLimit,
    FailureLimit,
    PlanningFailed,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::AllResolved => f.write_str("all subtasks resolved"),
            TerminationReason::Deadlock { blocked } => {
                write!(f, "deadlock: no schedulable subtask, unresolved [{}]", blocked.join(", "))
            }
            TerminationReason::IterationLimit => f.write_str("iteration limit reached"),
            TerminationReason::TimeLimit => f.write_str("wall-clock limit reached"),
            TerminationReason::FailureLimit => f.write_str("failed-subtask limit exceeded"),
            TerminationReason::PlanningFailed => f.write_str("planning failed"),
        }
    }
}

/// Final report of a task run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCompletionResult {
    pub task_description: String,
    pub constraints: Vec<String>,
    pub plan: Option<Plan>,
    pub iterations: Vec<IterationResult>,
    /// True iff every subtask is Completed, Replaced or Skipped.
    pub success: bool,
    pub error: Option<String>,
    pub termination: TerminationReason,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_iterations: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observation_defaults_to_passing() {
        let obs = ObservationResult::default();
        assert!(obs.all_passed());
        assert!(obs.logs.is_empty());
    }

    #[test]
    fn strategy_parse_is_strict() {
        assert_eq!(
            AdaptationStrategy::parse_str("Replace"),
            Some(AdaptationStrategy::Replace)
        );
        assert_eq!(
            AdaptationStrategy::parse_str("skip"),
            Some(AdaptationStrategy::Skip)
        );
        assert_eq!(AdaptationStrategy::parse_str("retry"), None);
        assert_eq!(AdaptationStrategy::parse_str(""), None);
    }

    #[test]
    fn issue_display_marks_non_critical() {
        let minor = Issue::minor("lint warnings", ErrorType::Style);
        assert_eq!(minor.to_string(), "[style, non-critical] lint warnings");
        let critical = Issue::critical("build failed", ErrorType::Compilation);
        assert_eq!(critical.to_string(), "[compilation] build failed");
    }

    #[test]
    fn termination_serializes_with_tag() {
        let json = serde_json::to_value(TerminationReason::Deadlock {
            blocked: vec!["b".into()],
        })
        .unwrap();
        assert_eq!(json["reason"], "deadlock");
        assert_eq!(json["blocked"][0], "b");
    }
}

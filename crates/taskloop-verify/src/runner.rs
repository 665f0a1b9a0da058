use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use taskloop_tools::process::run_shell;

const KILL_GRACE: Duration = Duration::from_secs(5);

/// One command to run as part of a check.
#[derive(Debug, Clone)]
pub struct CheckStep {
    pub name: String,
    pub command: String,
    /// Relative to the runner's working directory.
    pub working_dir: Option<PathBuf>,
    pub timeout: Duration,
}

#[derive(Debug)]
pub struct StepResult {
    pub step_name: String,
    pub command: String,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl StepResult {
    pub fn passed(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Passed,
    Failed,
}

#[derive(Debug)]
pub struct RunResult {
    pub status: RunStatus,
    pub steps: Vec<StepResult>,
}

/// Runs check steps in order, stopping at the first failure.
#[derive(Debug, Clone, Default)]
pub struct Runner;

impl Runner {
    pub fn new() -> Self {
        Self
    }

    pub async fn execute(&self, steps: &[CheckStep], working_dir: &Path) -> RunResult {
        let mut results = Vec::new();

        for step in steps {
            let dir = step
                .working_dir
                .as_ref()
                .map(|d| working_dir.join(d))
                .unwrap_or_else(|| working_dir.to_path_buf());

            let started_at = Utc::now();
            let output = run_shell(&step.command, &dir, step.timeout, KILL_GRACE).await;
            let finished_at = Utc::now();

            let step_result = match output {
                Ok(output) => StepResult {
                    step_name: step.name.clone(),
                    command: step.command.clone(),
                    exit_code: output.exit_code,
                    stdout: output.stdout,
                    stderr: output.stderr,
                    started_at,
                    finished_at,
                },
                Err(e) => StepResult {
                    step_name: step.name.clone(),
                    command: step.command.clone(),
                    exit_code: None,
                    stdout: String::new(),
                    stderr: format!("Process error: {e}"),
                    started_at,
                    finished_at,
                },
            };

            let failed = !step_result.passed();
            results.push(step_result);
            if failed {
                break;
            }
        }

        let status = if results.iter().all(StepResult::passed) {
            RunStatus::Passed
        } else {
            RunStatus::Failed
        };

        RunResult {
            status,
            steps: results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(name: &str, command: &str, timeout_s: u64) -> CheckStep {
        CheckStep {
            name: name.into(),
            command: command.into(),
            working_dir: None,
            timeout: Duration::from_secs(timeout_s),
        }
    }

    #[tokio::test]
    async fn successful_step() {
        let dir = tempfile::tempdir().unwrap();
        let result = Runner::new()
            .execute(&[step("echo", "echo ok", 10)], dir.path())
            .await;
        assert_eq!(result.status, RunStatus::Passed);
        assert_eq!(result.steps[0].exit_code, Some(0));
        assert!(result.steps[0].stdout.contains("ok"));
    }

    #[tokio::test]
    async fn failed_step() {
        let dir = tempfile::tempdir().unwrap();
        let result = Runner::new()
            .execute(&[step("fail", "false", 10)], dir.path())
            .await;
        assert_eq!(result.status, RunStatus::Failed);
        assert_eq!(result.steps[0].exit_code, Some(1));
    }

    #[tokio::test]
    async fn stops_on_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let steps = vec![
            step("first", "echo 1", 10),
            step("fail", "false", 10),
            step("third", "echo 3", 10),
        ];
        let result = Runner::new().execute(&steps, dir.path()).await;
        assert_eq!(result.status, RunStatus::Failed);
        assert_eq!(result.steps.len(), 2);
    }

    #[tokio::test]
    async fn timeout_step() {
        let dir = tempfile::tempdir().unwrap();
        let result = Runner::new()
            .execute(&[step("slow", "sleep 10", 1)], dir.path())
            .await;
        assert_eq!(result.status, RunStatus::Failed);
        assert_eq!(result.steps[0].exit_code, None);
        assert!(result.steps[0].stderr.contains("Timeout"));
    }

    #[tokio::test]
    async fn honours_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/f.txt"), "inside").unwrap();
        let mut s = step("cat", "cat f.txt", 10);
        s.working_dir = Some(PathBuf::from("sub"));
        let result = Runner::new().execute(&[s], dir.path()).await;
        assert_eq!(result.status, RunStatus::Passed);
        assert_eq!(result.steps[0].stdout.trim(), "inside");
    }
}

//! Build, lint and test exposed as tools.
//!
//! Each tool answers with a JSON object carrying at least `Success` and
//! `Error`, plus the captured `Output`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use taskloop_tools::{Tool, ToolDefinition, ToolError};
use tracing::debug;

use crate::profiles::{discover, CheckKind, CheckProfile};
use crate::runner::{CheckStep, Runner, StepResult};

const MAX_REPORT_CHARS: usize = 4_000;
const MAX_UNAVAILABLE_CHARS: usize = 500;
/// Printed by cargo and similar front ends when a plugin is not installed.
const MISSING_SUBCOMMAND: &[&str] = &["no such command", "no such subcommand"];
/// Shell exit status for "command not found".
const EXIT_NOT_FOUND: i32 = 127;

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct CheckReport {
    success: bool,
    error: String,
    output: String,
}

/// Runs one kind of check against the project discovered under `root`.
pub struct CheckTool {
    kind: CheckKind,
    root: PathBuf,
    timeout: Duration,
}

impl CheckTool {
    pub fn new(kind: CheckKind, root: &Path, timeout: Duration) -> Self {
        Self {
            kind,
            root: root.to_path_buf(),
            timeout,
        }
    }

    pub fn tool_name(kind: CheckKind) -> &'static str {
        match kind {
            CheckKind::Build => "build_project",
            CheckKind::Lint => "run_lint",
            CheckKind::Test => "run_tests",
        }
    }
}

/// The build, lint and test tools for a workspace.
pub fn validation_tools(root: &Path, timeout: Duration) -> Vec<Arc<dyn Tool>> {
    [CheckKind::Build, CheckKind::Lint, CheckKind::Test]
        .into_iter()
        .map(|kind| Arc::new(CheckTool::new(kind, root, timeout)) as Arc<dyn Tool>)
        .collect()
}

#[async_trait]
impl Tool for CheckTool {
    fn definition(&self) -> ToolDefinition {
        let description = match self.kind {
            CheckKind::Build => "Build the project in the workspace and report compiler errors.",
            CheckKind::Lint => "Run the project's linter / style checker.",
            CheckKind::Test => "Run the project's test suite.",
        };
        ToolDefinition {
            name: Self::tool_name(self.kind).into(),
            description: description.into(),
            input_schema: json!({ "type": "object", "properties": {} }),
        }
    }

    async fn call(&self, _arguments: &str) -> Result<String, ToolError> {
        let root = self.root.clone();
        let descriptors = tokio::task::spawn_blocking(move || discover(&root))
            .await
            .map_err(|e| ToolError::Failed(format!("project discovery failed: {e}")))?;

        let Some(descriptor) = descriptors.first() else {
            return encode(CheckReport {
                success: true,
                error: String::new(),
                output: "no project descriptor found".into(),
            });
        };

        let profile = CheckProfile::for_system(descriptor.system);
        let Some(command) = profile.command(self.kind) else {
            return encode(CheckReport {
                success: true,
                error: String::new(),
                output: format!("{} has no {} command", descriptor.system, self.kind),
            });
        };

        debug!("running {} check: {command}", self.kind);
        let step = CheckStep {
            name: self.kind.as_str().into(),
            command: command.into(),
            working_dir: None,
            timeout: self.timeout,
        };
        let result = Runner::new().execute(&[step], descriptor.dir()).await;
        let Some(step) = result.steps.into_iter().next() else {
            return Err(ToolError::Failed("check produced no result".into()));
        };

        encode(outcome(self.kind, &profile, &step)?)
    }
}

/// Turn a finished check step into a report. A check whose tool is not
/// installed is an invocation error, not a failing check.
fn outcome(
    kind: CheckKind,
    profile: &CheckProfile,
    step: &StepResult,
) -> Result<CheckReport, ToolError> {
    let output = format!("{}{}", step.stdout, step.stderr);
    if !step.passed() && tool_missing(&step.command, step.exit_code, &output) {
        return Err(ToolError::Failed(format!(
            "{kind} command unavailable: {}",
            truncate_tail(output.trim(), MAX_UNAVAILABLE_CHARS)
        )));
    }

    let output = truncate_tail(&output, MAX_REPORT_CHARS);
    if step.passed() {
        return Ok(CheckReport {
            success: true,
            error: String::new(),
            output,
        });
    }
    let empty_suite = step.exit_code.is_some() && step.exit_code == profile.empty_suite_exit;
    if kind == CheckKind::Test && empty_suite {
        return Ok(CheckReport {
            success: true,
            error: String::new(),
            output: format!("no tests collected\n{output}"),
        });
    }

    let code = step
        .exit_code
        .map_or("timeout".to_string(), |c| c.to_string());
    Ok(CheckReport {
        success: false,
        error: format!("`{}` failed (exit {code})", step.command),
        output,
    })
}

/// Whether a failed step failed because its tool is absent: the shell
/// could not find it, cargo has no such subcommand, or `python -m` could
/// not import the runner module itself.
fn tool_missing(command: &str, exit_code: Option<i32>, output: &str) -> bool {
    if exit_code == Some(EXIT_NOT_FOUND) {
        return true;
    }
    if MISSING_SUBCOMMAND.iter().any(|marker| output.contains(marker)) {
        return true;
    }
    let mut words = command.split_whitespace();
    while let Some(word) = words.next() {
        if word == "-m" {
            return words
                .next()
                .is_some_and(|module| output.contains(&format!("No module named {module}")));
        }
    }
    false
}

fn encode(report: CheckReport) -> Result<String, ToolError> {
    serde_json::to_string(&report).map_err(|e| ToolError::Failed(e.to_string()))
}

fn truncate_tail(s: &str, max: usize) -> String {
    let count = s.chars().count();
    if count <= max {
        s.to_string()
    } else {
        s.chars().skip(count - max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles::BuildSystem;
    use chrono::Utc;

    fn parse(out: &str) -> serde_json::Value {
        serde_json::from_str(out).unwrap()
    }

    #[tokio::test]
    async fn no_descriptor_passes() {
        let dir = tempfile::tempdir().unwrap();
        let tool = CheckTool::new(CheckKind::Build, dir.path(), Duration::from_secs(10));
        let report = parse(&tool.call("{}").await.unwrap());
        assert_eq!(report["Success"], true);
        assert_eq!(report["Error"], "");
    }

    #[tokio::test]
    async fn make_without_lint_passes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Makefile"), "all:\n\ttrue\n").unwrap();
        let tool = CheckTool::new(CheckKind::Lint, dir.path(), Duration::from_secs(10));
        let report = parse(&tool.call("{}").await.unwrap());
        assert_eq!(report["Success"], true);
        assert!(report["Output"].as_str().unwrap().contains("no lint command"));
    }

    #[tokio::test]
    async fn failing_make_test_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Makefile"), "test:\n\t@echo boom && false\n").unwrap();
        let tool = CheckTool::new(CheckKind::Test, dir.path(), Duration::from_secs(30));
        let out = match tool.call("{}").await {
            Ok(out) => out,
            // make missing on this host
            Err(_) => return,
        };
        let report = parse(&out);
        assert_eq!(report["Success"], false);
        assert!(report["Error"].as_str().unwrap().contains("make test"));
        assert!(report["Output"].as_str().unwrap().contains("boom"));
    }

    fn finished(command: &str, exit_code: Option<i32>, stderr: &str) -> StepResult {
        StepResult {
            step_name: "check".into(),
            command: command.into(),
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    fn python() -> CheckProfile {
        CheckProfile::for_system(BuildSystem::Python)
    }

    #[test]
    fn missing_pytest_module_is_unavailable() {
        let step = finished(
            "python3 -m pytest -q",
            Some(1),
            "/usr/bin/python3: No module named pytest\n",
        );
        let err = outcome(CheckKind::Test, &python(), &step).unwrap_err();
        assert!(err.to_string().contains("test command unavailable"));
    }

    #[test]
    fn project_import_error_still_fails() {
        let step = finished(
            "python3 -m pytest -q",
            Some(2),
            "E   ModuleNotFoundError: No module named 'calculator'\n",
        );
        let report = outcome(CheckKind::Test, &python(), &step).unwrap();
        assert!(!report.success);
        assert!(report.error.contains("exit 2"));
    }

    #[test]
    fn empty_pytest_suite_passes() {
        let step = finished("python3 -m pytest -q", Some(5), "no tests ran in 0.01s\n");
        let report = outcome(CheckKind::Test, &python(), &step).unwrap();
        assert!(report.success);
        assert!(report.output.starts_with("no tests collected"));
    }

    #[test]
    fn empty_suite_exit_is_per_system() {
        let step = finished("cargo test --workspace", Some(5), "");
        let cargo = CheckProfile::for_system(BuildSystem::Cargo);
        assert!(!outcome(CheckKind::Test, &cargo, &step).unwrap().success);
        let lint = finished("ruff check .", Some(5), "");
        assert!(!outcome(CheckKind::Lint, &python(), &lint).unwrap().success);
    }

    #[test]
    fn missing_cargo_subcommand_is_unavailable() {
        let step = finished(
            "cargo clippy --workspace -- -D warnings",
            Some(101),
            "error: no such command: `clippy`\n",
        );
        let cargo = CheckProfile::for_system(BuildSystem::Cargo);
        let err = outcome(CheckKind::Lint, &cargo, &step).unwrap_err();
        assert!(err.to_string().contains("lint command unavailable"));
    }

    #[test]
    fn shell_not_found_is_unavailable() {
        let step = finished("ruff check .", Some(127), "sh: 1: ruff: not found\n");
        assert!(outcome(CheckKind::Lint, &python(), &step).is_err());
    }

    #[test]
    fn timeout_is_a_failure() {
        let step = finished("python3 -m pytest -q", None, "Timeout after 600s");
        let report = outcome(CheckKind::Test, &python(), &step).unwrap();
        assert!(!report.success);
        assert!(report.error.contains("exit timeout"));
    }

    #[tokio::test]
    async fn missing_subcommand_from_make_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("Makefile"),
            "all:\n\ttrue\ntest:\n\t@echo 'error: no such command: `nextest`' >&2; exit 101\n",
        )
        .unwrap();
        let tool = CheckTool::new(CheckKind::Test, dir.path(), Duration::from_secs(30));
        let err = tool.call("{}").await.unwrap_err();
        assert!(err.to_string().contains("test command unavailable"));
    }

    #[test]
    fn tool_names_are_fixed() {
        let dir = tempfile::tempdir().unwrap();
        let names: Vec<String> = validation_tools(dir.path(), Duration::from_secs(1))
            .iter()
            .map(|t| t.definition().name)
            .collect();
        assert_eq!(names, vec!["build_project", "run_lint", "run_tests"]);
    }
}

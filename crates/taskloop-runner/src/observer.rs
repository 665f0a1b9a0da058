//! Runs build, lint and test after an attempt and folds the results into
//! an [`ObservationResult`].

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use taskloop_core::{ActionResult, ObservationMetrics, ObservationResult};
use taskloop_tools::ToolRegistry;
use taskloop_verify::{discover, CheckKind, CheckTool};
use tracing::{debug, warn};

/// The two fields every validation tool reports.
#[derive(Debug, Deserialize)]
struct CheckReport {
    #[serde(rename = "Success")]
    success: bool,
    #[serde(rename = "Error", default)]
    error: String,
}

pub struct Observer<'a> {
    registry: &'a ToolRegistry,
    root: PathBuf,
}

impl<'a> Observer<'a> {
    pub fn new(registry: &'a ToolRegistry, root: &Path) -> Self {
        Self {
            registry,
            root: root.to_path_buf(),
        }
    }

    pub async fn observe(&self, action: &ActionResult) -> Result<ObservationResult> {
        if !self.root.is_dir() {
            bail!("workspace {} is not a directory", self.root.display());
        }

        let mut observation = ObservationResult {
            metrics: ObservationMetrics {
                tool_calls: action.tool_calls_executed,
                response_length: action.response.chars().count(),
            },
            ..Default::default()
        };

        let root = self.root.clone();
        let descriptors = tokio::task::spawn_blocking(move || discover(&root))
            .await
            .context("project discovery task failed")?;
        if descriptors.is_empty() {
            observation
                .logs
                .push("no project descriptor found, nothing to build, lint or test".into());
            return Ok(observation);
        }
        debug!(
            "observing {} project at {}",
            descriptors[0].system,
            descriptors[0].path.display()
        );

        observation.build_success = self.check(CheckKind::Build, &mut observation.logs).await;
        observation.lint_pass = self.check(CheckKind::Lint, &mut observation.logs).await;
        observation.tests_pass = self.check(CheckKind::Test, &mut observation.logs).await;
        Ok(observation)
    }

    /// Run one validation tool. When the tool cannot be invoked at all a
    /// build counts as failed while lint and test count as passed.
    async fn check(&self, kind: CheckKind, logs: &mut Vec<String>) -> bool {
        let name = CheckTool::tool_name(kind);
        let permissive = kind != CheckKind::Build;

        let outcome = match self.registry.get(name) {
            None => Err(format!("{name} is not registered")),
            Some(tool) => match tool.call("{}").await {
                Ok(raw) => serde_json::from_str::<CheckReport>(&raw)
                    .map_err(|e| format!("{name} returned an unreadable report: {e}")),
                Err(e) => Err(format!("{name} could not run: {e}")),
            },
        };

        match outcome {
            Ok(report) if report.success => true,
            Ok(report) => {
                let detail = if report.error.is_empty() {
                    "no detail".to_string()
                } else {
                    report.error
                };
                logs.push(format!("{kind} failed: {detail}"));
                false
            }
            Err(reason) if permissive => {
                warn!("{reason}; treating {kind} as passed");
                logs.push(format!("{kind} unavailable, treated as passed: {reason}"));
                true
            }
            Err(reason) => {
                logs.push(format!("{kind} failed: {reason}"));
                false
            }
        }
    }
}

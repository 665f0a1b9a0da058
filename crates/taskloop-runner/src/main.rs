use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use taskloop_runner::backend::openai::OpenAiGateway;
use taskloop_runner::backend::ModelGateway;
use taskloop_runner::config::RunnerConfig;
use taskloop_runner::{preflight, CompletionController};
use taskloop_tools::{workspace_tools, ToolRegistry};
use taskloop_verify::validation_tools;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = RunnerConfig::parse();
    let workspace = config
        .workspace
        .canonicalize()
        .with_context(|| format!("cannot resolve workspace {}", config.workspace.display()))?;
    info!("taskloop starting in {}", workspace.display());

    let registry = ToolRegistry::builder()
        .register_all(workspace_tools(&workspace, config.command_timeout()))
        .register_all(validation_tools(&workspace, config.check_timeout()))
        .build();

    let gateway = OpenAiGateway::new(&config.base_url, config.api_key.clone(), &config.model)?;
    info!("model: {} via {}", config.model, gateway.name());

    preflight::run_all(&workspace, &registry, &gateway).await?;

    let controller =
        CompletionController::new(Arc::new(gateway), registry, &workspace, config.limits());
    let limits = controller.limits();
    info!(
        "limits: {} iterations, {} minutes, {} failed subtasks, {} attempts per subtask",
        limits.max_iterations,
        limits.max_duration.as_secs() / 60,
        limits.max_failed_subtasks,
        limits.max_subtask_attempts
    );
    let result = controller
        .complete_task(&config.task, &config.constraints)
        .await;

    if let Some(plan) = &result.plan {
        info!("final plan: {}", plan.progress());
        for s in plan.subtasks() {
            info!("  [{}] {} ({} attempts): {}", s.id, s.status, s.attempt_count, s.description);
        }
    }
    if let Some(ref err) = result.error {
        tracing::error!("run failed: {err}");
    }
    info!(
        "finished after {} iteration(s): {} ({})",
        result.total_iterations,
        if result.success { "success" } else { "failure" },
        result.termination
    );

    if let Some(path) = &config.report {
        let json = serde_json::to_string_pretty(&result)?;
        std::fs::write(path, json)
            .with_context(|| format!("cannot write report to {}", path.display()))?;
        info!("report written to {}", path.display());
    }

    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}

use std::path::Path;
use std::process::Command;

use anyhow::{bail, Context, Result};
use taskloop_tools::ToolRegistry;
use tracing::info;

use crate::backend::ModelGateway;

/// Run all preflight checks before entering the loop.
pub async fn run_all(
    workspace: &Path,
    registry: &ToolRegistry,
    gateway: &dyn ModelGateway,
) -> Result<()> {
    check_workspace(workspace)?;
    check_shell()?;
    check_registry(registry)?;
    gateway
        .preflight_check()
        .await
        .with_context(|| format!("{} gateway preflight failed", gateway.name()))?;
    info!("all preflight checks passed");
    Ok(())
}

fn check_workspace(workspace: &Path) -> Result<()> {
    let meta = std::fs::metadata(workspace)
        .with_context(|| format!("workspace {} does not exist", workspace.display()))?;
    if !meta.is_dir() {
        bail!("workspace {} is not a directory", workspace.display());
    }
    if meta.permissions().readonly() {
        bail!("workspace {} is read-only", workspace.display());
    }
    info!("workspace: {}", workspace.display());
    Ok(())
}

fn check_shell() -> Result<()> {
    let output = Command::new("sh")
        .args(["-c", "true"])
        .output()
        .context("sh is not available; run_command and the build/lint/test tools need it")?;
    if !output.status.success() {
        bail!("sh -c true failed");
    }
    info!("shell: ok");
    Ok(())
}

fn check_registry(registry: &ToolRegistry) -> Result<()> {
    if registry.is_empty() {
        bail!("no tools registered");
    }
    info!("tools: {}", registry.names().join(", "));
    Ok(())
}

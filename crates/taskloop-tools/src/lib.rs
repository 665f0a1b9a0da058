pub mod fs;
pub mod process;
mod registry;
pub mod search;
pub mod shell;
mod workspace;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use registry::{ToolRegistry, ToolRegistryBuilder};
pub use workspace::{Workspace, SKIPPED_DIRS};

/// Name, description and JSON-schema input contract of a tool, as
/// advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("path escapes the workspace: {0}")]
    PathEscape(String),

    #[error("{0}")]
    Failed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A named capability the model can ask to invoke.
///
/// Tools take the raw JSON argument string the model produced and return a
/// string result. Errors are reported, never panicked.
#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    async fn call(&self, arguments: &str) -> Result<String, ToolError>;
}

/// Decode a model-supplied argument blob. An empty blob is read as `{}`.
pub fn parse_args<T: DeserializeOwned>(arguments: &str) -> Result<T, ToolError> {
    let raw = if arguments.trim().is_empty() {
        "{}"
    } else {
        arguments
    };
    serde_json::from_str(raw).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

/// The file, search and shell tools, all rooted at `root`.
pub fn workspace_tools(root: &Path, command_timeout: Duration) -> Vec<Arc<dyn Tool>> {
    let ws = Workspace::new(root);
    vec![
        Arc::new(fs::ReadFileTool::new(ws.clone())),
        Arc::new(fs::WriteFileTool::new(ws.clone())),
        Arc::new(fs::EditFileTool::new(ws.clone())),
        Arc::new(fs::ListDirectoryTool::new(ws.clone())),
        Arc::new(search::SearchCodeTool::new(ws.clone())),
        Arc::new(shell::RunCommandTool::new(ws, command_timeout)),
    ]
}

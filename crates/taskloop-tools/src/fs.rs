//! File tools: read, write, edit and list inside the workspace.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use walkdir::WalkDir;

use crate::workspace::is_skipped_dir;
use crate::{parse_args, Tool, ToolDefinition, ToolError, Workspace};

pub struct ReadFileTool {
    ws: Workspace,
}

impl ReadFileTool {
    pub fn new(ws: Workspace) -> Self {
        Self { ws }
    }
}

#[derive(Deserialize)]
struct PathArgs {
    path: String,
}

#[async_trait]
impl Tool for ReadFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "read_file".into(),
            description: "Read a text file from the workspace.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Path relative to the workspace root" }
                },
                "required": ["path"]
            }),
        }
    }

    async fn call(&self, arguments: &str) -> Result<String, ToolError> {
        let args: PathArgs = parse_args(arguments)?;
        let path = self.ws.resolve(&args.path)?;
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ToolError::Failed(format!("cannot read {}: {e}", args.path)))
    }
}

pub struct WriteFileTool {
    ws: Workspace,
}

impl WriteFileTool {
    pub fn new(ws: Workspace) -> Self {
        Self { ws }
    }
}

#[derive(Deserialize)]
struct WriteArgs {
    path: String,
    content: String,
}

#[async_trait]
impl Tool for WriteFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "write_file".into(),
            description: "Create or overwrite a file in the workspace. Parent directories are created.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Path relative to the workspace root" },
                    "content": { "type": "string", "description": "Full file content" }
                },
                "required": ["path", "content"]
            }),
        }
    }

    async fn call(&self, arguments: &str) -> Result<String, ToolError> {
        let args: WriteArgs = parse_args(arguments)?;
        let path = self.ws.resolve(&args.path)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &args.content).await?;
        Ok(format!("wrote {} bytes to {}", args.content.len(), args.path))
    }
}

pub struct EditFileTool {
    ws: Workspace,
}

impl EditFileTool {
    pub fn new(ws: Workspace) -> Self {
        Self { ws }
    }
}

#[derive(Deserialize)]
struct EditArgs {
    path: String,
    old_text: String,
    new_text: String,
}

#[async_trait]
impl Tool for EditFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "edit_file".into(),
            description: "Replace exactly one occurrence of old_text with new_text in a file.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string" },
                    "old_text": { "type": "string", "description": "Text to replace; must occur exactly once" },
                    "new_text": { "type": "string" }
                },
                "required": ["path", "old_text", "new_text"]
            }),
        }
    }

    async fn call(&self, arguments: &str) -> Result<String, ToolError> {
        let args: EditArgs = parse_args(arguments)?;
        if args.old_text.is_empty() {
            return Err(ToolError::InvalidArguments("old_text must not be empty".into()));
        }
        let path = self.ws.resolve(&args.path)?;
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ToolError::Failed(format!("cannot read {}: {e}", args.path)))?;

        match content.matches(&args.old_text).count() {
            0 => Err(ToolError::Failed(format!("old_text not found in {}", args.path))),
            1 => {
                let updated = content.replacen(&args.old_text, &args.new_text, 1);
                tokio::fs::write(&path, updated).await?;
                Ok(format!("edited {}", args.path))
            }
            n => Err(ToolError::Failed(format!(
                "old_text occurs {n} times in {}; add surrounding context",
                args.path
            ))),
        }
    }
}

pub struct ListDirectoryTool {
    ws: Workspace,
}

impl ListDirectoryTool {
    pub fn new(ws: Workspace) -> Self {
        Self { ws }
    }
}

#[derive(Deserialize)]
struct ListArgs {
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    depth: Option<usize>,
}

const DEFAULT_LIST_DEPTH: usize = 2;
const MAX_LIST_ENTRIES: usize = 500;

#[async_trait]
impl Tool for ListDirectoryTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "list_directory".into(),
            description: "List files and directories under a path, skipping build output.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Directory relative to the workspace root (default: root)" },
                    "depth": { "type": "integer", "description": "Maximum depth (default: 2)" }
                }
            }),
        }
    }

    async fn call(&self, arguments: &str) -> Result<String, ToolError> {
        let args: ListArgs = parse_args(arguments)?;
        let dir = self.ws.resolve(args.path.as_deref().unwrap_or(""))?;
        if !dir.is_dir() {
            return Err(ToolError::Failed(format!(
                "not a directory: {}",
                args.path.unwrap_or_default()
            )));
        }
        let depth = args.depth.unwrap_or(DEFAULT_LIST_DEPTH).max(1);
        let ws = self.ws.clone();

        tokio::task::spawn_blocking(move || {
            let mut lines = Vec::new();
            let walker = WalkDir::new(&dir)
                .min_depth(1)
                .max_depth(depth)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|e| {
                    !(e.file_type().is_dir() && is_skipped_dir(&e.file_name().to_string_lossy()))
                });
            for entry in walker.filter_map(Result::ok) {
                if lines.len() >= MAX_LIST_ENTRIES {
                    lines.push(format!("... truncated at {MAX_LIST_ENTRIES} entries"));
                    break;
                }
                let mut shown = ws.display_path(entry.path());
                if entry.file_type().is_dir() {
                    shown.push('/');
                }
                lines.push(shown);
            }
            if lines.is_empty() {
                "(empty directory)".to_string()
            } else {
                lines.join("\n")
            }
        })
        .await
        .map_err(|e| ToolError::Failed(format!("list task failed: {e}")))
    }
}

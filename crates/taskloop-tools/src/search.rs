use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use walkdir::WalkDir;

use crate::workspace::is_skipped_dir;
use crate::{parse_args, Tool, ToolDefinition, ToolError, Workspace};

const MAX_MATCHES: usize = 200;
const MAX_LINE_CHARS: usize = 240;

/// Regex search over text files in the workspace.
pub struct SearchCodeTool {
    ws: Workspace,
}

impl SearchCodeTool {
    pub fn new(ws: Workspace) -> Self {
        Self { ws }
    }
}

#[derive(Deserialize)]
struct SearchArgs {
    pattern: String,
    #[serde(default)]
    path: Option<String>,
}

#[async_trait]
impl Tool for SearchCodeTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "search_code".into(),
            description: "Search workspace files with a regular expression. Returns file:line: text matches.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "pattern": { "type": "string", "description": "Regular expression" },
                    "path": { "type": "string", "description": "Directory or file to search (default: root)" }
                },
                "required": ["pattern"]
            }),
        }
    }

    async fn call(&self, arguments: &str) -> Result<String, ToolError> {
        let args: SearchArgs = parse_args(arguments)?;
        let re = Regex::new(&args.pattern)
            .map_err(|e| ToolError::InvalidArguments(format!("bad pattern: {e}")))?;
        let start = self.ws.resolve(args.path.as_deref().unwrap_or(""))?;
        let ws = self.ws.clone();

        tokio::task::spawn_blocking(move || {
            let mut matches = Vec::new();
            let walker = WalkDir::new(&start)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|e| {
                    !(e.depth() > 0
                        && e.file_type().is_dir()
                        && is_skipped_dir(&e.file_name().to_string_lossy()))
                });
            'files: for entry in walker.filter_map(Result::ok) {
                if !entry.file_type().is_file() {
                    continue;
                }
                // Binary or unreadable files are skipped.
                let Ok(content) = std::fs::read_to_string(entry.path()) else {
                    continue;
                };
                for (n, line) in content.lines().enumerate() {
                    if re.is_match(line) {
                        let text: String = line.trim().chars().take(MAX_LINE_CHARS).collect();
                        matches.push(format!("{}:{}: {text}", ws.display_path(entry.path()), n + 1));
                        if matches.len() >= MAX_MATCHES {
                            matches.push(format!("... stopped after {MAX_MATCHES} matches"));
                            break 'files;
                        }
                    }
                }
            }
            if matches.is_empty() {
                "no matches".to_string()
            } else {
                matches.join("\n")
            }
        })
        .await
        .map_err(|e| ToolError::Failed(format!("search task failed: {e}")))
    }
}

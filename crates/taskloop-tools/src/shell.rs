use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::process::run_shell;
use crate::{parse_args, Tool, ToolDefinition, ToolError, Workspace};

const KILL_GRACE: Duration = Duration::from_secs(5);
const MAX_STREAM_CHARS: usize = 8_000;

/// Run a shell command in the workspace root.
pub struct RunCommandTool {
    ws: Workspace,
    timeout: Duration,
}

impl RunCommandTool {
    pub fn new(ws: Workspace, timeout: Duration) -> Self {
        Self { ws, timeout }
    }
}

#[derive(Deserialize)]
struct CommandArgs {
    command: String,
}

#[async_trait]
impl Tool for RunCommandTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "run_command".into(),
            description: "Run a shell command in the workspace root and return its exit code and output.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "command": { "type": "string", "description": "Command line passed to sh -c" }
                },
                "required": ["command"]
            }),
        }
    }

    async fn call(&self, arguments: &str) -> Result<String, ToolError> {
        let args: CommandArgs = parse_args(arguments)?;
        if args.command.trim().is_empty() {
            return Err(ToolError::InvalidArguments("command must not be empty".into()));
        }
        let output = run_shell(&args.command, self.ws.root(), self.timeout, KILL_GRACE).await?;
        if output.timed_out {
            return Err(ToolError::Failed(format!(
                "command timed out after {}s: {}",
                self.timeout.as_secs(),
                args.command
            )));
        }

        let code = output
            .exit_code
            .map_or("killed".to_string(), |c| c.to_string());
        Ok(format!(
            "exit code: {code}\nstdout:\n{}\nstderr:\n{}",
            tail(&output.stdout, MAX_STREAM_CHARS),
            tail(&output.stderr, MAX_STREAM_CHARS),
        ))
    }
}

/// Keep the last `max` chars; failures tend to be reported at the end.
fn tail(s: &str, max: usize) -> String {
    let count = s.chars().count();
    if count <= max {
        return s.to_string();
    }
    let skipped: String = s.chars().skip(count - max).collect();
    format!("...{skipped}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_exit_code_and_streams() {
        let dir = tempfile::tempdir().unwrap();
        let tool = RunCommandTool::new(Workspace::new(dir.path()), Duration::from_secs(10));
        let out = tool.call(r#"{"command": "echo hi; exit 2"}"#).await.unwrap();
        assert!(out.starts_with("exit code: 2"));
        assert!(out.contains("hi"));
    }

    #[tokio::test]
    async fn empty_command_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let tool = RunCommandTool::new(Workspace::new(dir.path()), Duration::from_secs(10));
        assert!(tool.call(r#"{"command": "  "}"#).await.is_err());
    }

    #[tokio::test]
    async fn timeout_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let tool = RunCommandTool::new(Workspace::new(dir.path()), Duration::from_secs(1));
        let err = tool.call(r#"{"command": "sleep 10"}"#).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn tail_keeps_the_end() {
        assert_eq!(tail("abcdef", 3), "...def");
        assert_eq!(tail("abc", 3), "abc");
    }
}

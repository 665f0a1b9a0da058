//! Drives one subtask attempt through a bounded tool-use conversation.

use std::sync::Arc;

use taskloop_core::{ActionResult, IterationResult, Subtask};
use taskloop_prompts::SYSTEM_PROMPT;
use taskloop_tools::{Tool, ToolRegistry};
use tracing::{debug, info, warn};

use crate::backend::{Message, ModelGateway, ModelResponse, ToolCallRequest};

pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 5;

pub struct Executor<'a> {
    gateway: &'a dyn ModelGateway,
    registry: &'a ToolRegistry,
    max_rounds: usize,
}

impl<'a> Executor<'a> {
    pub fn new(gateway: &'a dyn ModelGateway, registry: &'a ToolRegistry) -> Self {
        Self {
            gateway,
            registry,
            max_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    /// Run one attempt of `subtask`. Never fails: gateway errors count as
    /// an empty reply and tool errors are recorded as results.
    pub async fn execute(&self, subtask: &Subtask, history: &[IterationResult]) -> ActionResult {
        let mut messages = vec![
            Message::system(SYSTEM_PROMPT),
            Message::user(taskloop_prompts::execute::assemble(subtask, history)),
        ];
        let catalog = self.registry.definitions();
        let tools = (!catalog.is_empty()).then_some(catalog);

        let mut result = ActionResult::default();
        let mut tool_failed = false;

        for round in 1..=self.max_rounds {
            let response = match self.gateway.complete(&messages, tools).await {
                Ok(r) => r,
                Err(e) => {
                    warn!("subtask {}: model call failed in round {round}: {e}", subtask.id);
                    ModelResponse::default()
                }
            };
            let text = response.content_str().trim();
            if !text.is_empty() {
                result.response = text.to_string();
            }

            if response.tool_calls.is_empty() {
                debug!("subtask {}: model concluded after {round} round(s)", subtask.id);
                result.success = !tool_failed
                    && (!result.response.is_empty() || result.tool_calls_executed > 0);
                return result;
            }

            messages.push(Message::assistant(describe_turn(&response)));

            let mut round_results = Vec::with_capacity(response.tool_calls.len());
            for call in &response.tool_calls {
                let outcome = match self.registry.get(&call.name) {
                    None => {
                        warn!("subtask {}: model requested unknown tool {}", subtask.id, call.name);
                        Err("Tool not found".to_string())
                    }
                    Some(tool) => {
                        result.tool_calls_executed += 1;
                        invoke(Arc::clone(tool), call).await
                    }
                };
                let line = match outcome {
                    Ok(output) => format!("{}: {}", call.name, output),
                    Err(e) => {
                        tool_failed = true;
                        format!("{}: Error - {e}", call.name)
                    }
                };
                round_results.push(line);
            }

            messages.push(Message::user(taskloop_prompts::execute::tool_results_turn(
                &round_results,
            )));
            result.tool_results.extend(round_results);
        }

        info!(
            "subtask {}: tool round cap ({}) reached, {} tool calls executed",
            subtask.id, self.max_rounds, result.tool_calls_executed
        );
        result.success = !tool_failed && result.tool_calls_executed > 0;
        result
    }
}

/// Run a tool on its own task so a panicking tool cannot take the attempt
/// down with it.
async fn invoke(tool: Arc<dyn Tool>, call: &ToolCallRequest) -> Result<String, String> {
    let arguments = call.arguments.clone();
    let handle = tokio::spawn(async move { tool.call(&arguments).await });
    match handle.await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(e.to_string()),
        Err(join) => Err(format!("tool crashed: {join}")),
    }
}

/// Assistant turn as replayed to the model: its text plus the calls it made.
fn describe_turn(response: &ModelResponse) -> String {
    let mut turn = response.content_str().trim().to_string();
    for call in &response.tool_calls {
        if !turn.is_empty() {
            turn.push('\n');
        }
        turn.push_str(&format!("[tool call {}] {}({})", call.id, call.name, call.arguments));
    }
    turn
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::ScriptedGateway;
    use async_trait::async_trait;
    use serde_json::json;
    use taskloop_tools::{ToolDefinition, ToolError};

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "echo".into(),
                description: "echo arguments".into(),
                input_schema: json!({"type": "object"}),
            }
        }

        async fn call(&self, arguments: &str) -> Result<String, ToolError> {
            Ok(format!("echoed {arguments}"))
        }
    }

    struct BrokenTool;

    #[async_trait]
    impl Tool for BrokenTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "broken".into(),
                description: "always fails".into(),
                input_schema: json!({"type": "object"}),
            }
        }

        async fn call(&self, _arguments: &str) -> Result<String, ToolError> {
            Err(ToolError::Failed("disk on fire".into()))
        }
    }

    struct PanickingTool;

    #[async_trait]
    impl Tool for PanickingTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "panics".into(),
                description: "panics".into(),
                input_schema: json!({"type": "object"}),
            }
        }

        async fn call(&self, _arguments: &str) -> Result<String, ToolError> {
            panic!("tool bug");
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::builder()
            .register(Arc::new(EchoTool))
            .register(Arc::new(BrokenTool))
            .register(Arc::new(PanickingTool))
            .build()
    }

    fn subtask() -> Subtask {
        Subtask::new("s1", "Add Multiply")
    }

    #[tokio::test]
    async fn text_only_reply_succeeds() {
        let gw = ScriptedGateway::new().then_text("Nothing to change.");
        let reg = registry();
        let result = Executor::new(&gw, &reg).execute(&subtask(), &[]).await;
        assert!(result.success);
        assert_eq!(result.tool_calls_executed, 0);
        assert_eq!(result.response, "Nothing to change.");
        assert_eq!(gw.requests()[0].tool_names.as_ref().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn empty_reply_fails() {
        let gw = ScriptedGateway::new();
        let reg = registry();
        let result = Executor::new(&gw, &reg).execute(&subtask(), &[]).await;
        assert!(!result.success);
        assert_eq!(gw.call_count(), 1);
    }

    #[tokio::test]
    async fn tool_results_are_fed_back() {
        let gw = ScriptedGateway::new()
            .then_tools(&[("echo", r#"{"x": 1}"#)])
            .then_text("done");
        let reg = registry();
        let result = Executor::new(&gw, &reg).execute(&subtask(), &[]).await;
        assert!(result.success);
        assert_eq!(result.tool_calls_executed, 1);
        assert_eq!(result.tool_results, vec![r#"echo: echoed {"x": 1}"#]);

        let second = &gw.requests()[1];
        assert_eq!(second.messages.len(), 4);
        assert!(second.messages[2].content.contains("[tool call call_0] echo"));
        assert!(second.last_user().contains(r#"- echo: echoed {"x": 1}"#));
        assert!(second.last_user().contains("Decide your next action"));
    }

    #[tokio::test]
    async fn unknown_tool_marks_failure() {
        let gw = ScriptedGateway::new()
            .then_tools(&[("teleport", "{}")])
            .then_text("gave up");
        let reg = registry();
        let result = Executor::new(&gw, &reg).execute(&subtask(), &[]).await;
        assert!(!result.success);
        assert_eq!(result.tool_calls_executed, 0);
        assert_eq!(result.tool_results, vec!["teleport: Error - Tool not found"]);
    }

    #[tokio::test]
    async fn tool_error_is_captured() {
        let gw = ScriptedGateway::new()
            .then_tools(&[("broken", "{}"), ("echo", "{}")])
            .then_text("tried");
        let reg = registry();
        let result = Executor::new(&gw, &reg).execute(&subtask(), &[]).await;
        assert!(!result.success);
        assert_eq!(result.tool_calls_executed, 2);
        assert_eq!(result.tool_results[0], "broken: Error - disk on fire");
        assert_eq!(result.tool_results[1], "echo: echoed {}");
    }

    #[tokio::test]
    async fn panicking_tool_does_not_abort() {
        let gw = ScriptedGateway::new()
            .then_tools(&[("panics", "{}")])
            .then_text("hm");
        let reg = registry();
        let result = Executor::new(&gw, &reg).execute(&subtask(), &[]).await;
        assert!(!result.success);
        assert!(result.tool_results[0].starts_with("panics: Error - tool crashed"));
    }

    #[tokio::test]
    async fn round_cap_stops_repeating_model() {
        let gw = ScriptedGateway::new().with_fallback(ModelResponse::tool_calls(vec![
            ToolCallRequest {
                id: "c".into(),
                name: "echo".into(),
                arguments: "{}".into(),
            },
        ]));
        let reg = registry();
        let result = Executor::new(&gw, &reg).execute(&subtask(), &[]).await;
        assert_eq!(gw.call_count(), DEFAULT_MAX_TOOL_ROUNDS);
        assert_eq!(result.tool_calls_executed, DEFAULT_MAX_TOOL_ROUNDS);
        assert!(result.success);
    }

    #[tokio::test]
    async fn round_cap_with_failing_tool_fails() {
        let gw = ScriptedGateway::new().with_fallback(ModelResponse::tool_calls(vec![
            ToolCallRequest {
                id: "c".into(),
                name: "broken".into(),
                arguments: "{}".into(),
            },
        ]));
        let reg = registry();
        let result = Executor::new(&gw, &reg)
            .with_max_rounds(2)
            .execute(&subtask(), &[])
            .await;
        assert_eq!(result.tool_calls_executed, 2);
        assert!(!result.success);
    }

    #[tokio::test]
    async fn round_cap_without_executed_tools_fails() {
        let gw = ScriptedGateway::new().with_fallback(ModelResponse::tool_calls(vec![
            ToolCallRequest {
                id: "c".into(),
                name: "missing".into(),
                arguments: "{}".into(),
            },
        ]));
        let reg = registry();
        let result = Executor::new(&gw, &reg)
            .with_max_rounds(2)
            .execute(&subtask(), &[])
            .await;
        assert_eq!(gw.call_count(), 2);
        assert_eq!(result.tool_calls_executed, 0);
        assert!(!result.success);
    }

    #[tokio::test]
    async fn gateway_error_counts_as_no_response() {
        let gw = ScriptedGateway::new().then_error("timeout");
        let reg = registry();
        let result = Executor::new(&gw, &reg).execute(&subtask(), &[]).await;
        assert!(!result.success);
        assert!(result.response.is_empty());
    }
}

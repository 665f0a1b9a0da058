use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use taskloop_tools::ToolDefinition;
use tracing::{debug, info};
use uuid::Uuid;

use super::{GatewayError, Message, ModelGateway, ModelResponse, ToolCallRequest};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Gateway for any endpoint that speaks the OpenAI chat-completions
/// protocol (OpenAI itself, vLLM, Ollama, OpenRouter, ...).
#[derive(Debug)]
pub struct OpenAiGateway {
    base_url: String,
    api_key: Option<String>,
    model: String,
    client: reqwest::Client,
}

impl OpenAiGateway {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        model: &str,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("taskloop")
            .build()
            .map_err(|e| GatewayError::Transport(format!("HTTP client init: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.api_key {
            Some(ref key) => req.bearer_auth(key),
            None => req,
        }
    }
}

/// Chat-completions request body.
fn request_body(model: &str, messages: &[Message], tools: Option<&[ToolDefinition]>) -> Value {
    let mut body = json!({
        "model": model,
        "messages": messages,
    });
    if let Some(tools) = tools.filter(|t| !t.is_empty()) {
        body["tools"] = tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.input_schema,
                    }
                })
            })
            .collect();
    }
    body
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: Option<String>,
    function: WireFunction,
}

#[derive(Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: Option<String>,
}

fn decode_response(raw: &str) -> Result<ModelResponse, GatewayError> {
    let parsed: ChatResponse =
        serde_json::from_str(raw).map_err(|e| GatewayError::Decode(e.to_string()))?;
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| GatewayError::Decode("response has no choices".into()))?;

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|c| ToolCallRequest {
            id: c.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            name: c.function.name,
            arguments: c.function.arguments.unwrap_or_default(),
        })
        .collect();

    Ok(ModelResponse {
        content: choice.message.content,
        tool_calls,
    })
}

#[async_trait]
impl ModelGateway for OpenAiGateway {
    fn name(&self) -> &str {
        "openai"
    }

    fn model_hint(&self) -> Option<&str> {
        Some(&self.model)
    }

    async fn preflight_check(&self) -> anyhow::Result<()> {
        let resp = self
            .authorize(self.client.get(self.url("/models")))
            .send()
            .await
            .with_context(|| format!("model endpoint {} is not reachable", self.base_url))?;
        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            bail!("model endpoint rejected credentials (HTTP {status}), check TASKLOOP_API_KEY");
        }
        info!("model endpoint: reachable ({}, model {})", self.base_url, self.model);
        Ok(())
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<ModelResponse, GatewayError> {
        let body = request_body(&self.model, messages, tools);
        debug!(
            "chat request: {} messages, {} tools",
            messages.len(),
            tools.map_or(0, <[ToolDefinition]>::len)
        );

        let resp = self
            .authorize(self.client.post(self.url("/chat/completions")))
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        decode_response(&text)
    }
}

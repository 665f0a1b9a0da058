use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use taskloop_tools::ToolDefinition;

use super::{GatewayError, Message, ModelGateway, ModelResponse, ToolCallRequest};

type Responder = Box<dyn Fn(&[Message]) -> ModelResponse + Send + Sync>;

/// One request seen by a [`ScriptedGateway`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    /// Names from the tool catalog, `None` when no catalog was sent.
    pub tool_names: Option<Vec<String>>,
}

impl RecordedRequest {
    /// Content of the last user turn.
    pub fn last_user(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == super::Role::User)
            .map_or("", |m| m.content.as_str())
    }
}

/// A gateway for tests that replays queued responses in order.
///
/// Once the queue is drained every further request is answered by the
/// responder, which defaults to an empty response.
pub struct ScriptedGateway {
    queue: Mutex<VecDeque<Result<ModelResponse, GatewayError>>>,
    responder: Responder,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            responder: Box::new(|_| ModelResponse::default()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a plain text reply.
    pub fn then_text(self, content: &str) -> Self {
        self.then(Ok(ModelResponse::text(content)))
    }

    /// Queue a reply requesting the given `(name, arguments)` tool calls.
    pub fn then_tools(self, calls: &[(&str, &str)]) -> Self {
        let calls = calls
            .iter()
            .enumerate()
            .map(|(i, (name, args))| ToolCallRequest {
                id: format!("call_{i}"),
                name: name.to_string(),
                arguments: args.to_string(),
            })
            .collect();
        self.then(Ok(ModelResponse::tool_calls(calls)))
    }

    /// Queue a transport failure.
    pub fn then_error(self, message: &str) -> Self {
        self.then(Err(GatewayError::Transport(message.to_string())))
    }

    pub fn then(self, response: Result<ModelResponse, GatewayError>) -> Self {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push_back(response);
        }
        self
    }

    /// Answer with a fixed response once the queue is empty.
    pub fn with_fallback(self, response: ModelResponse) -> Self {
        self.respond_with(move |_| response.clone())
    }

    /// Answer with `f(messages)` once the queue is empty.
    pub fn respond_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&[Message]) -> ModelResponse + Send + Sync + 'static,
    {
        self.responder = Box::new(f);
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<ModelResponse, GatewayError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest {
                messages: messages.to_vec(),
                tool_names: tools.map(|t| t.iter().map(|d| d.name.clone()).collect()),
            });
        }
        let queued = self.queue.lock().ok().and_then(|mut q| q.pop_front());
        match queued {
            Some(response) => response,
            None => Ok((self.responder)(messages)),
        }
    }
}

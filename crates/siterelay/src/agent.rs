use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::errors::{AgentError, AgentResult};
use crate::models::message::Message;
use crate::models::request::{ChatRequest, Reply};
use crate::models::tool::ToolCall;
use crate::providers::base::Provider;
use crate::streaming::ToolCallAccumulator;
use crate::systems::ToolDispatcher;

pub mod fallback;

/// Upstream calls allowed per model attempt
pub const MAX_TOOL_ROUNDS: usize = 3;

pub const MAX_ROUNDS_NOTICE: &str = "max tool rounds reached";

/// Where a reply goes: a buffered JSON response or a live event stream
#[async_trait]
pub trait ReplySink: Send {
    /// Whether the upstream should be asked to stream
    fn is_streaming(&self) -> bool;

    /// Forward a piece of content as soon as it arrives. `Err(Cancelled)` means the
    /// client is gone and the exchange should stop.
    async fn send_partial(&mut self, delta: &str) -> AgentResult<()>;

    /// Deliver the final outcome. Called exactly once per exchange.
    async fn complete(&mut self, result: AgentResult<Reply>);
}

/// The outcome of one upstream call
#[derive(Debug, Default)]
struct Turn {
    content: String,
    tool_calls: Vec<ToolCall>,
    raw: Value,
}

/// Agent integrates the upstream chat model with the server-side tools it may call
pub struct Agent {
    provider: Arc<dyn Provider>,
    tools: ToolDispatcher,
    default_model: String,
}

impl Agent {
    /// Create a new Agent with the specified provider
    pub fn new<S: Into<String>>(provider: Arc<dyn Provider>, default_model: S) -> Self {
        Self {
            provider,
            tools: ToolDispatcher::new(),
            default_model: default_model.into(),
        }
    }

    pub fn with_tools(mut self, tools: ToolDispatcher) -> Self {
        self.tools = tools;
        self
    }

    /// Run the exchange and hand the outcome to the sink
    pub async fn respond(&self, request: &ChatRequest, sink: &mut dyn ReplySink) {
        let result = self.reply(request, sink).await;
        sink.complete(result).await;
    }

    /// Run the exchange on the requested model, falling back to free models when
    /// the upstream rejects it for quota or availability reasons.
    pub async fn reply(
        &self,
        request: &ChatRequest,
        sink: &mut dyn ReplySink,
    ) -> AgentResult<Reply> {
        match self.attempt(request, sink).await {
            Err(err) if err.is_fallback_eligible() => self.recover(request, sink, err).await,
            other => other,
        }
    }

    /// The bounded tool loop against a single model
    async fn attempt(
        &self,
        request: &ChatRequest,
        sink: &mut dyn ReplySink,
    ) -> AgentResult<Reply> {
        let mut messages = request.messages.clone();
        let mut last = Turn::default();

        for round in 0..MAX_TOOL_ROUNDS {
            let turn = if sink.is_streaming() {
                self.streamed_turn(request, &messages, sink).await?
            } else {
                self.buffered_turn(request, &messages).await?
            };

            if turn.tool_calls.is_empty() {
                return Ok(Reply {
                    output: turn.content,
                    raw: turn.raw,
                    model: Some(request.model.clone()),
                    notice: None,
                });
            }

            debug!(
                model = %request.model,
                round,
                calls = turn.tool_calls.len(),
                "running tool calls"
            );
            messages.push(Message::assistant_tool_calls(
                turn.content.clone(),
                turn.tool_calls.clone(),
            ));
            for call in &turn.tool_calls {
                let result = self.tools.dispatch(call).await;
                messages.push(Message::tool_result(call, &result));
            }
            last = turn;
        }

        warn!(model = %request.model, "{}", MAX_ROUNDS_NOTICE);
        Ok(Reply {
            output: last.content,
            raw: last.raw,
            model: Some(request.model.clone()),
            notice: Some(MAX_ROUNDS_NOTICE.to_string()),
        })
    }

    async fn buffered_turn(&self, request: &ChatRequest, messages: &[Message]) -> AgentResult<Turn> {
        let response = self
            .provider
            .complete(&request.payload(messages, false))
            .await?;

        let message = &response["choices"][0]["message"];
        let content = message["content"].as_str().unwrap_or_default().to_string();
        let tool_calls = match message.get("tool_calls") {
            Some(calls @ Value::Array(_)) => serde_json::from_value(calls.clone())?,
            _ => Vec::new(),
        };

        Ok(Turn {
            content,
            tool_calls,
            raw: response,
        })
    }

    async fn streamed_turn(
        &self,
        request: &ChatRequest,
        messages: &[Message],
        sink: &mut dyn ReplySink,
    ) -> AgentResult<Turn> {
        let mut chunks = self
            .provider
            .stream(&request.payload(messages, true))
            .await?;

        let mut content = String::new();
        let mut accumulator = ToolCallAccumulator::new();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            let Some(choice) = chunk.first_choice() else {
                continue;
            };
            if let Some(delta) = choice.delta.content.as_deref().filter(|d| !d.is_empty()) {
                content.push_str(delta);
                sink.send_partial(delta).await?;
            }
            accumulator.observe(choice);
        }

        Ok(Turn {
            content,
            tool_calls: accumulator.into_tool_calls(),
            raw: Value::Null,
        })
    }
}

/// A sink that collects a buffered reply, for callers that just want the result
#[derive(Debug, Default)]
pub struct BufferedSink {
    result: Option<AgentResult<Reply>>,
}

impl BufferedSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_result(self) -> AgentResult<Reply> {
        self.result
            .unwrap_or_else(|| Err(AgentError::Internal("reply never completed".to_string())))
    }
}

#[async_trait]
impl ReplySink for BufferedSink {
    fn is_streaming(&self) -> bool {
        false
    }

    async fn send_partial(&mut self, _delta: &str) -> AgentResult<()> {
        Ok(())
    }

    async fn complete(&mut self, result: AgentResult<Reply>) {
        self.result = Some(result);
    }
}

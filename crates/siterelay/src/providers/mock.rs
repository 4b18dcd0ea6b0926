use async_trait::async_trait;
use futures::stream;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::errors::{AgentError, AgentResult};
use crate::models::tool::ToolCall;
use crate::providers::base::{ChunkStream, ModelInfo, Provider};
use crate::streaming::ChatChunk;

type StreamTurn = AgentResult<Vec<AgentResult<ChatChunk>>>;

/// A mock provider that returns pre-configured responses for testing
#[derive(Default)]
pub struct MockProvider {
    completions: Mutex<VecDeque<AgentResult<Value>>>,
    streams: Mutex<VecDeque<StreamTurn>>,
    unavailable: HashMap<String, AgentError>,
    models: Option<Vec<ModelInfo>>,
    payloads: Mutex<Vec<Value>>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of buffered responses
    pub fn new(completions: Vec<AgentResult<Value>>) -> Self {
        Self {
            completions: Mutex::new(completions.into()),
            ..Default::default()
        }
    }

    /// Sequence of streamed turns, each a list of chunks
    pub fn with_streams(mut self, streams: Vec<StreamTurn>) -> Self {
        self.streams = Mutex::new(streams.into());
        self
    }

    /// Any request for `model` fails with `error`
    pub fn with_unavailable(mut self, model: &str, error: AgentError) -> Self {
        self.unavailable.insert(model.to_string(), error);
        self
    }

    pub fn with_models(mut self, ids: &[&str]) -> Self {
        self.models = Some(ids.iter().map(|id| ModelInfo::new(*id, *id)).collect());
        self
    }

    /// Every payload seen so far, in order
    pub fn payloads(&self) -> Vec<Value> {
        self.payloads.lock().unwrap().clone()
    }

    /// The models requested so far, in order
    pub fn requested_models(&self) -> Vec<String> {
        self.payloads()
            .iter()
            .map(|p| p["model"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    fn check_model(&self, payload: &Value) -> AgentResult<()> {
        self.payloads.lock().unwrap().push(payload.clone());
        let model = payload["model"].as_str().unwrap_or_default();
        match self.unavailable.get(model) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

pub fn completion_with_text(text: &str) -> Value {
    json!({
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": text},
            "finish_reason": "stop"
        }]
    })
}

pub fn completion_with_tool_calls(calls: &[ToolCall]) -> Value {
    json!({
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": null, "tool_calls": calls},
            "finish_reason": "tool_calls"
        }]
    })
}

pub fn unavailable(status: u16, body: &str) -> AgentError {
    AgentError::Upstream {
        status,
        body: body.to_string(),
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(&self, payload: &Value) -> AgentResult<Value> {
        self.check_model(payload)?;
        self.completions
            .lock()
            .unwrap()
            .pop_front()
            // Return empty response if no more pre-configured responses
            .unwrap_or_else(|| Ok(completion_with_text("")))
    }

    async fn stream(&self, payload: &Value) -> AgentResult<ChunkStream> {
        self.check_model(payload)?;
        let turn = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(vec![Ok(ChatChunk::finish("stop"))]))?;
        Ok(Box::pin(stream::iter(turn)))
    }

    async fn list_models(&self) -> AgentResult<Vec<ModelInfo>> {
        self.models
            .clone()
            .ok_or_else(|| AgentError::Transport("models listing unavailable".to_string()))
    }
}

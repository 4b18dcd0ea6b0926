use async_trait::async_trait;
use futures::stream;
use serde_json::{json, Value};

use super::base::{ChunkStream, ModelInfo, Provider};
use crate::errors::AgentResult;
use crate::streaming::ChatChunk;

const PROMPT_ECHO_LIMIT: usize = 400;

pub const DEMO_STREAM_PARTS: [&str; 3] = [
    "Demo mode (no server key): ",
    "request received, ",
    "configure OPENROUTER_API_KEY on the server to use a real model.",
];

/// Answers without calling the upstream, for servers with no API key configured
#[derive(Debug, Default, Clone)]
pub struct DemoProvider;

impl DemoProvider {
    pub fn new() -> Self {
        Self
    }

    /// First user message of the payload, cut to a sane length
    fn prompt_of(payload: &Value) -> String {
        let content = payload["messages"]
            .as_array()
            .and_then(|messages| messages.iter().find(|m| m["role"] == "user"))
            .map(|m| match &m["content"] {
                Value::String(text) => text.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            })
            .unwrap_or_default();
        content.chars().take(PROMPT_ECHO_LIMIT).collect()
    }

    pub fn demo_text(prompt: &str) -> String {
        format!(
            "Demo mode: OPENROUTER_API_KEY is not configured\nPrompt: {}\nTip: set OPENROUTER_API_KEY on the server to use a real model.",
            prompt
        )
    }
}

#[async_trait]
impl Provider for DemoProvider {
    async fn complete(&self, payload: &Value) -> AgentResult<Value> {
        Ok(json!({
            "demo": true,
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": Self::demo_text(&Self::prompt_of(payload)),
                },
                "finish_reason": "stop"
            }]
        }))
    }

    async fn stream(&self, _payload: &Value) -> AgentResult<ChunkStream> {
        let mut chunks: Vec<AgentResult<ChatChunk>> = DEMO_STREAM_PARTS
            .iter()
            .map(|part| Ok(ChatChunk::content(*part)))
            .collect();
        chunks.push(Ok(ChatChunk::finish("stop")));
        Ok(Box::pin(stream::iter(chunks)))
    }

    async fn list_models(&self) -> AgentResult<Vec<ModelInfo>> {
        Ok(Vec::new())
    }
}

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::AgentResult;
use crate::streaming::ChatChunk;

/// Stream of parsed chunks for one streamed completion
pub type ChunkStream = BoxStream<'static, AgentResult<ChatChunk>>;

/// A model advertised by the upstream. Fields we don't read are kept for the listing endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ModelInfo {
    pub fn new<I: Into<String>, N: Into<String>>(id: I, name: N) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            extra: Map::new(),
        }
    }

    pub fn is_free(&self) -> bool {
        self.id.contains(":free")
    }
}

/// Base trait for chat completion upstreams
#[async_trait]
pub trait Provider: Send + Sync {
    /// Run one non-streaming chat completion and return the raw response body
    async fn complete(&self, payload: &Value) -> AgentResult<Value>;

    /// Run one streaming chat completion. Errors on the initial HTTP status surface here,
    /// before any chunk is produced.
    async fn stream(&self, payload: &Value) -> AgentResult<ChunkStream>;

    /// List the models the upstream currently offers
    async fn list_models(&self) -> AgentResult<Vec<ModelInfo>>;
}

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::AgentResult;
use crate::models::tool::{Tool, ToolCall};

/// Core trait that defines a group of tools the agent can run on the model's behalf
#[async_trait]
pub trait System: Send + Sync {
    /// Get the name of the system
    fn name(&self) -> &str;

    /// Get the system description
    fn description(&self) -> &str;

    /// Get available tools
    fn tools(&self) -> &[Tool];

    /// Call a tool with the given parameters. Errors are turned into `{error}` results
    /// by the dispatcher, so implementations may fail freely.
    async fn call(&self, tool_call: &ToolCall) -> AgentResult<Value>;
}

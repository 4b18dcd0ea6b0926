use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::errors::{AgentError, AgentResult};
use crate::models::tool::{tools_to_openai_spec, Tool, ToolCall};

mod system;
pub mod web;

pub use system::System;
pub use web::WebSystem;

/// Routes tool calls to the system that owns the tool
#[derive(Clone, Default)]
pub struct ToolDispatcher {
    systems: Vec<Arc<dyn System>>,
}

impl ToolDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system(mut self, system: Arc<dyn System>) -> Self {
        self.systems.push(system);
        self
    }

    pub fn tools(&self) -> Vec<Tool> {
        self.systems
            .iter()
            .flat_map(|system| system.tools().iter().cloned())
            .collect()
    }

    /// OpenAI-shaped definitions of every registered tool
    pub fn openai_tools(&self) -> AgentResult<Vec<Value>> {
        tools_to_openai_spec(&self.tools())
    }

    fn owner(&self, name: &str) -> Option<&Arc<dyn System>> {
        self.systems
            .iter()
            .find(|system| system.tools().iter().any(|tool| tool.name == name))
    }

    /// Run one call. Never fails: every error becomes an `{"error": ...}` result
    /// that goes back to the model like any other tool output.
    pub async fn dispatch(&self, call: &ToolCall) -> Value {
        let result = match self.owner(call.name()) {
            Some(system) => {
                debug!(system = system.name(), tool = call.name(), "dispatching tool call");
                system.call(call).await
            }
            None => Err(AgentError::UnsupportedTool(call.name().to_string())),
        };

        match result {
            Ok(value) => value,
            Err(err) => {
                warn!(tool = call.name(), id = %call.id, "tool call failed: {}", err);
                json!({ "error": err.to_string() })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EchoSystem {
        tools: Vec<Tool>,
    }

    impl EchoSystem {
        fn new() -> Self {
            Self {
                tools: vec![Tool::new("echo", "Echo the arguments", json!({"type": "object"}))],
            }
        }
    }

    #[async_trait]
    impl System for EchoSystem {
        fn name(&self) -> &str {
            "EchoSystem"
        }

        fn description(&self) -> &str {
            "Echoes"
        }

        fn tools(&self) -> &[Tool] {
            &self.tools
        }

        async fn call(&self, tool_call: &ToolCall) -> AgentResult<Value> {
            tool_call.parse_arguments()
        }
    }

    fn dispatcher() -> ToolDispatcher {
        ToolDispatcher::new().with_system(Arc::new(EchoSystem::new()))
    }

    #[tokio::test]
    async fn test_dispatch_routes_to_owner() {
        let call = ToolCall::new("call_1", "echo", "{\"a\":1}");
        assert_eq!(dispatcher().dispatch(&call).await, json!({"a": 1}));
    }

    #[tokio::test]
    async fn test_unknown_tool_becomes_error_result() {
        let call = ToolCall::new("call_1", "rm_rf", "{}");
        assert_eq!(
            dispatcher().dispatch(&call).await,
            json!({"error": "Unsupported tool: rm_rf"})
        );
    }

    #[tokio::test]
    async fn test_bad_arguments_become_error_result() {
        let call = ToolCall::new("call_1", "echo", "{not json");
        let result = dispatcher().dispatch(&call).await;
        assert!(result["error"]
            .as_str()
            .unwrap()
            .starts_with("echo: invalid arguments"));
    }

    #[test]
    fn test_openai_tools_lists_every_system() {
        let tools = dispatcher()
            .with_system(Arc::new(WebSystem::default()))
            .openai_tools()
            .unwrap();
        let names: Vec<_> = tools
            .iter()
            .map(|t| t["function"]["name"].as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            vec![
                "echo",
                "fetch_url",
                "fetch_url_text",
                "http_get_json_path",
                "web_search",
                "current_time"
            ]
        );
    }
}

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::role::Role;
use super::tool::ToolCall;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
/// Message content is either plain text or a list of structured parts (text, image_url, ...)
pub enum MessageContent {
    Text(String),
    Parts(Vec<Value>),
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        MessageContent::Text(text.to_string())
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        MessageContent::Text(text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A message in a chat conversation, in the openai wire shape
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: Option<MessageContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Fields we don't model are carried through to the upstream as-is
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    fn with_role(role: Role, content: Option<MessageContent>) -> Self {
        Message {
            role,
            content,
            tool_calls: None,
            tool_call_id: None,
            name: None,
            extra: Map::new(),
        }
    }

    /// Create a new user message
    pub fn user<S: Into<MessageContent>>(content: S) -> Self {
        Self::with_role(Role::User, Some(content.into()))
    }

    /// The assistant turn that asked for tools; it must precede the tool results in history
    pub fn assistant_tool_calls<S: Into<String>>(content: S, tool_calls: Vec<ToolCall>) -> Self {
        Message {
            tool_calls: Some(tool_calls),
            ..Self::with_role(Role::Assistant, Some(MessageContent::Text(content.into())))
        }
    }

    /// The result of a single tool call, serialized as JSON text
    pub fn tool_result(call: &ToolCall, result: &Value) -> Self {
        Message {
            tool_call_id: Some(call.id.clone()),
            name: Some(call.function.name.clone()),
            ..Self::with_role(Role::Tool, Some(MessageContent::Text(result.to_string())))
        }
    }

    /// Content rendered as text: plain text as-is, structured parts as JSON
    pub fn text(&self) -> String {
        match &self.content {
            Some(MessageContent::Text(text)) => text.clone(),
            Some(MessageContent::Parts(parts)) => Value::Array(parts.clone()).to_string(),
            None => String::new(),
        }
    }
}

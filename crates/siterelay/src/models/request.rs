use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::message::Message;
use crate::errors::{AgentError, AgentResult};

/// Chat request as posted by the site, before validation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatBody {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub messages: Option<Vec<Message>>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_p: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub tools: Option<Value>,
    #[serde(default)]
    pub tool_choice: Option<Value>,
    #[serde(default)]
    pub response_format: Option<Value>,
    #[serde(default)]
    pub extra_body: Option<Value>,
}

impl ChatBody {
    /// Validate the body: either `messages` or a non-empty `prompt` must be present.
    pub fn into_request(self, default_model: &str) -> AgentResult<ChatRequest> {
        let messages = match (self.messages.clone(), self.prompt.as_deref()) {
            (Some(messages), _) => messages,
            (None, Some(prompt)) if !prompt.is_empty() => vec![Message::user(prompt)],
            _ => {
                return Err(AgentError::InvalidRequest(
                    "Missing prompt or messages".to_string(),
                ))
            }
        };
        Ok(self.build(default_model, messages))
    }

    /// Like `into_request`, but an empty body becomes a single empty user message.
    /// Used in demo mode, where nothing is sent upstream anyway.
    pub fn into_request_lenient(self, default_model: &str) -> ChatRequest {
        let messages = self.messages.clone().unwrap_or_else(|| {
            vec![Message::user(self.prompt.clone().unwrap_or_default())]
        });
        self.build(default_model, messages)
    }

    fn build(self, default_model: &str, messages: Vec<Message>) -> ChatRequest {
        let mut params = Map::new();
        if let Some(temperature) = self.temperature {
            params.insert("temperature".to_string(), json!(temperature));
        }
        if let Some(top_p) = self.top_p {
            params.insert("top_p".to_string(), json!(top_p));
        }
        if let Some(max_tokens) = self.max_tokens {
            params.insert("max_tokens".to_string(), json!(max_tokens));
        }
        for (key, value) in [
            ("tools", self.tools),
            ("tool_choice", self.tool_choice),
            ("response_format", self.response_format),
        ] {
            if let Some(value) = value.filter(|v| !v.is_null()) {
                params.insert(key.to_string(), value);
            }
        }
        if let Some(Value::Object(extra)) = self.extra_body {
            params.extend(extra);
        }

        let model = self
            .model
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| default_model.to_string());

        ChatRequest {
            model,
            messages,
            params,
        }
    }
}

/// A validated chat request: the model, the starting history and pass-through parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub params: Map<String, Value>,
}

impl ChatRequest {
    pub fn new<S: Into<String>>(model: S, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            params: Map::new(),
        }
    }

    /// Same request against another model
    pub fn with_model<S: Into<String>>(&self, model: S) -> Self {
        Self {
            model: model.into(),
            ..self.clone()
        }
    }

    /// Build the upstream payload. `model`, `messages` and `stream` always come from the loop,
    /// even when `extra_body` tries to set them.
    pub fn payload(&self, messages: &[Message], stream: bool) -> Value {
        let mut payload = self.params.clone();
        payload.insert("model".to_string(), json!(self.model));
        payload.insert("messages".to_string(), json!(messages));
        if stream {
            payload.insert("stream".to_string(), json!(true));
        } else {
            payload.remove("stream");
        }
        Value::Object(payload)
    }
}

/// Final outcome of a chat exchange
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub output: String,
    pub raw: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

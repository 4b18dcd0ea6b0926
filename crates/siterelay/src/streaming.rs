//! Streamed chat completion chunks and tool call delta accumulation.
//!
//! In streaming mode the upstream sends tool calls as fragments spread over many
//! chunks, keyed by the call's `index`:
//!
//! ```text
//! {"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"web_search"}}]}}]}
//! {"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"query\":"}}]}}]}
//! {"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"rust\"}"}}]}}]}
//! {"choices":[{"delta":{},"finish_reason":"tool_calls"}]}
//! ```
//!
//! Content deltas are not buffered here; the agent forwards them to the client as
//! they arrive.
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::models::tool::ToolCall;

/// One `data:` frame of a streamed chat completion
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: Delta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolCallDelta {
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function: Option<FunctionDelta>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FunctionDelta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

impl ChatChunk {
    /// A chunk carrying only a piece of text
    pub fn content<S: Into<String>>(text: S) -> Self {
        ChatChunk {
            choices: vec![ChunkChoice {
                delta: Delta {
                    content: Some(text.into()),
                    tool_calls: None,
                },
                finish_reason: None,
            }],
        }
    }

    /// A chunk that only closes the generation
    pub fn finish<S: Into<String>>(reason: S) -> Self {
        ChatChunk {
            choices: vec![ChunkChoice {
                delta: Delta::default(),
                finish_reason: Some(reason.into()),
            }],
        }
    }

    /// The upstream only ever fills the first choice for our requests
    pub fn first_choice(&self) -> Option<&ChunkChoice> {
        self.choices.first()
    }
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

/// Assembles streamed tool call fragments into complete calls.
///
/// Calls are only released once the upstream reports `finish_reason == "tool_calls"`;
/// fragments seen in a generation that finishes any other way are discarded.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    calls: BTreeMap<u32, PartialToolCall>,
    finished_with_tool_calls: bool,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold the tool call deltas and finish reason of one choice into the accumulator
    pub fn observe(&mut self, choice: &ChunkChoice) {
        if let Some(deltas) = &choice.delta.tool_calls {
            for delta in deltas {
                let entry = self.calls.entry(delta.index.unwrap_or(0)).or_default();
                if let Some(id) = delta.id.as_ref().filter(|id| !id.is_empty()) {
                    entry.id = Some(id.clone());
                }
                if let Some(function) = &delta.function {
                    if let Some(name) = function.name.as_ref().filter(|n| !n.is_empty()) {
                        entry.name = Some(name.clone());
                    }
                    if let Some(arguments) = &function.arguments {
                        entry.arguments.push_str(arguments);
                    }
                }
            }
        }

        if choice.finish_reason.as_deref() == Some("tool_calls") {
            self.finished_with_tool_calls = true;
        }
    }

    /// The completed calls, in index order. Empty unless the generation finished with tool calls.
    pub fn into_tool_calls(self) -> Vec<ToolCall> {
        if !self.finished_with_tool_calls {
            return Vec::new();
        }

        self.calls
            .into_values()
            .enumerate()
            .map(|(position, partial)| {
                let arguments = if partial.arguments.is_empty() {
                    "{}".to_string()
                } else {
                    partial.arguments
                };
                ToolCall::new(
                    partial.id.unwrap_or_else(|| format!("call_{}", position)),
                    partial.name.unwrap_or_else(|| "unknown".to_string()),
                    arguments,
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn choice(value: serde_json::Value) -> ChunkChoice {
        let chunk: ChatChunk = serde_json::from_value(value).unwrap();
        chunk.choices.into_iter().next().unwrap()
    }

    #[test]
    fn test_fragments_concatenate_per_index() {
        let mut acc = ToolCallAccumulator::new();
        acc.observe(&choice(json!({"choices": [{"delta": {"tool_calls": [
            {"index": 1, "id": "call_b", "function": {"name": "current_time", "arguments": ""}},
            {"index": 0, "id": "call_a", "function": {"name": "web_search", "arguments": "{\"query\":"}}
        ]}}]})));
        acc.observe(&choice(json!({"choices": [{"delta": {"tool_calls": [
            {"index": 0, "function": {"arguments": "\"rust sse\"}"}}
        ]}}]})));
        acc.observe(&choice(json!({"choices": [{"delta": {}, "finish_reason": "tool_calls"}]})));

        let calls = acc.into_tool_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].id, "call_a");
        assert_eq!(calls[0].name(), "web_search");
        assert_eq!(
            calls[0].parse_arguments().unwrap(),
            json!({"query": "rust sse"})
        );
        assert_eq!(calls[1].name(), "current_time");
        assert_eq!(calls[1].function.arguments, "{}");
    }

    #[test]
    fn test_calls_held_back_without_tool_calls_finish() {
        let mut acc = ToolCallAccumulator::new();
        acc.observe(&choice(json!({"choices": [{"delta": {"tool_calls": [
            {"index": 0, "id": "call_a", "function": {"name": "current_time"}}
        ]}, "finish_reason": "stop"}]})));

        assert!(acc.into_tool_calls().is_empty());
    }

    #[test]
    fn test_missing_id_and_name_get_placeholders() {
        let mut acc = ToolCallAccumulator::new();
        acc.observe(&choice(json!({"choices": [{"delta": {"tool_calls": [
            {"function": {"arguments": "{}"}}
        ]}, "finish_reason": "tool_calls"}]})));

        let calls = acc.into_tool_calls();
        assert_eq!(calls[0].id, "call_0");
        assert_eq!(calls[0].name(), "unknown");
    }
}

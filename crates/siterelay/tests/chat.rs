use serde_json::{json, Value};
use siterelay::{
    agent::{Agent, BufferedSink, ReplySink},
    errors::AgentResult,
    models::{message::Message, request::ChatRequest, request::Reply},
    providers::{
        configs::OpenRouterProviderConfig, factory::get_provider, openrouter::build_client,
    },
    systems::{ToolDispatcher, WebSystem},
};
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn agent(server: &MockServer) -> Agent {
    let config = OpenRouterProviderConfig::new(server.uri(), Some("sk-test".to_string()));
    let client = build_client().unwrap();
    let provider = get_provider(config.into_provider_config(), client.clone());
    let tools = ToolDispatcher::new().with_system(Arc::new(WebSystem::new(
        client,
        format!("{}/html/", server.uri()),
    )));
    Agent::new(provider, "google/gemini-2.5-flash:free").with_tools(tools)
}

fn sse(frames: &[Value]) -> ResponseTemplate {
    let mut body: String = frames
        .iter()
        .map(|frame| format!("data: {}\n\n", frame))
        .collect();
    body.push_str("data: [DONE]\n\n");
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body)
}

#[derive(Default)]
struct CollectingSink {
    partials: Vec<String>,
    result: Option<AgentResult<Reply>>,
}

#[async_trait::async_trait]
impl ReplySink for CollectingSink {
    fn is_streaming(&self) -> bool {
        true
    }

    async fn send_partial(&mut self, delta: &str) -> AgentResult<()> {
        self.partials.push(delta.to_string());
        Ok(())
    }

    async fn complete(&mut self, result: AgentResult<Reply>) {
        self.result = Some(result);
    }
}

#[tokio::test]
async fn test_search_tool_round_over_http() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/html/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<a class="result__a" href="https://www.rust-lang.org/">Rust</a>"#,
        ))
        .mount(&server)
        .await;

    // Second round: the history now ends with the tool result
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"messages": [{}, {"role": "assistant"}, {"role": "tool"}]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "Rust lives at rust-lang.org"}, "finish_reason": "stop"}]
        })))
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "web_search", "arguments": "{\"query\":\"rust\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        })))
        .with_priority(2)
        .mount(&server)
        .await;

    let request = ChatRequest::new("meta/llama:free", vec![Message::user("Where is Rust?")]);
    let mut sink = BufferedSink::new();
    agent(&server).respond(&request, &mut sink).await;

    let reply = sink.into_result().unwrap();
    assert_eq!(reply.output, "Rust lives at rust-lang.org");
    assert!(reply.notice.is_none());
}

#[tokio::test]
async fn test_streamed_fallback_over_http() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"model": "paid/model"})))
        .respond_with(ResponseTemplate::new(402).set_body_string("Insufficient credits"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"model": "google/gemini-2.5-flash:free", "stream": true})))
        .respond_with(sse(&[
            json!({"choices": [{"delta": {"content": "Hi"}}]}),
            json!({"choices": [{"delta": {"content": "!"}, "finish_reason": "stop"}]}),
        ]))
        .mount(&server)
        .await;

    let request = ChatRequest::new("paid/model", vec![Message::user("hello")]);
    let mut sink = CollectingSink::default();
    agent(&server).respond(&request, &mut sink).await;

    assert_eq!(
        sink.partials,
        vec![
            "Switched to available free model: google/gemini-2.5-flash:free\n",
            "Hi",
            "!"
        ]
    );
    let reply = sink.result.unwrap().unwrap();
    assert_eq!(reply.model.as_deref(), Some("google/gemini-2.5-flash:free"));
}

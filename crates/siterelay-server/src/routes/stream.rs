use super::{chat::chat_request, method_not_allowed, parse_body, site_url};
use crate::{error::ApiError, state::AppState};
use async_trait::async_trait;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use bytes::Bytes;
use futures::Stream;
use serde_json::{json, Value};
use siterelay::{
    agent::ReplySink,
    errors::{AgentError, AgentResult},
    models::request::Reply,
};
use std::{
    convert::Infallible,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error};

// Server-sent events body fed from the agent task
pub struct SseResponse {
    rx: ReceiverStream<String>,
}

impl SseResponse {
    fn new(rx: ReceiverStream<String>) -> Self {
        Self { rx }
    }
}

impl Stream for SseResponse {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx)
            .poll_next(cx)
            .map(|opt| opt.map(|s| Ok(Bytes::from(s))))
    }
}

impl IntoResponse for SseResponse {
    fn into_response(self) -> Response {
        (
            [
                (header::CONTENT_TYPE, "text/event-stream; charset=utf-8"),
                (header::CACHE_CONTROL, "no-cache, no-transform"),
                (header::CONNECTION, "keep-alive"),
            ],
            Body::from_stream(self),
        )
            .into_response()
    }
}

fn frame(value: Value) -> String {
    format!("data: {}\n\n", value)
}

/// Writes the reply as `data:` frames: content deltas, an optional notice, then `done`
struct SseSink {
    tx: mpsc::Sender<String>,
}

impl SseSink {
    async fn send(&self, value: Value) -> AgentResult<()> {
        self.tx
            .send(frame(value))
            .await
            .map_err(|_| AgentError::Cancelled)
    }
}

#[async_trait]
impl ReplySink for SseSink {
    fn is_streaming(&self) -> bool {
        true
    }

    async fn send_partial(&mut self, delta: &str) -> AgentResult<()> {
        self.send(json!({"choices": [{"delta": {"content": delta}}]}))
            .await
    }

    async fn complete(&mut self, result: AgentResult<Reply>) {
        let sent = match result {
            Ok(reply) => {
                let notice = match reply.notice {
                    Some(notice) => self.send(json!({ "notice": notice })).await,
                    None => Ok(()),
                };
                match notice {
                    Ok(()) => self.send(json!({"done": true})).await,
                    err => err,
                }
            }
            Err(AgentError::Cancelled) => Err(AgentError::Cancelled),
            Err(err) => {
                error!("stream failed: {}", err);
                self.send(json!({ "error": err.to_string() })).await
            }
        };
        if sent.is_err() {
            debug!("client went away before the reply finished");
        }
    }
}

async fn handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<SseResponse, ApiError> {
    let request = chat_request(&state, parse_body(&body)?)?;
    let agent = state.agent(site_url(&headers, &state.settings));

    // Create channel for streaming
    let (tx, rx) = mpsc::channel(100);
    let stream = ReceiverStream::new(rx);

    tokio::spawn(async move {
        let mut sink = SseSink { tx: tx.clone() };
        tokio::select! {
            _ = agent.respond(&request, &mut sink) => {}
            // Stop waiting on upstream or tools as soon as the client disconnects
            _ = tx.closed() => debug!("client disconnected, abandoning reply"),
        }
    });

    Ok(SseResponse::new(stream))
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/ai-chat/stream", post(handler).fallback(method_not_allowed))
        .with_state(state)
}

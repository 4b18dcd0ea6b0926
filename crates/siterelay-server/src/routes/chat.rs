use super::{method_not_allowed, parse_body, site_url};
use crate::{error::ApiError, state::AppState};
use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use serde::Serialize;
use siterelay::{
    agent::BufferedSink,
    models::request::{ChatBody, ChatRequest, Reply},
};

#[derive(Debug, Serialize)]
struct ChatResponse {
    ok: bool,
    #[serde(flatten)]
    reply: Reply,
}

/// Validate a chat body against the configured default model. Without a key nothing
/// reaches the upstream, so an incomplete body still gets the demo answer.
pub fn chat_request(state: &AppState, body: ChatBody) -> Result<ChatRequest, ApiError> {
    let default_model = &state.settings.default_model;
    if state.is_demo() {
        Ok(body.into_request_lenient(default_model))
    } else {
        Ok(body.into_request(default_model)?)
    }
}

async fn handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ChatResponse>, ApiError> {
    let request = chat_request(&state, parse_body(&body)?)?;
    let agent = state.agent(site_url(&headers, &state.settings));

    let mut sink = BufferedSink::new();
    agent.respond(&request, &mut sink).await;
    let reply = sink.into_result()?;

    Ok(Json(ChatResponse { ok: true, reply }))
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/ai-chat", post(handler).fallback(method_not_allowed))
        .with_state(state)
}

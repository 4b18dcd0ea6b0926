use super::method_not_allowed;
use crate::state::AppState;
use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};
use siterelay::{
    errors::AgentError,
    models::{message::Message, request::ChatRequest},
    providers::base::Provider,
};
use std::time::Instant;

const PROBE_PROMPT: &str = "ping";
const ERROR_BODY_LIMIT: usize = 200;

fn describe(err: &AgentError) -> String {
    match err {
        AgentError::Upstream { status, body } if body.is_empty() => format!("HTTP {}", status),
        AgentError::Upstream { status, body } => format!(
            "HTTP {} {}",
            status,
            body.chars().take(ERROR_BODY_LIMIT).collect::<String>()
        ),
        other => other.to_string(),
    }
}

async fn probe_models(upstream: &dyn Provider) -> Value {
    match upstream.list_models().await {
        Ok(models) => json!({
            "ok": true,
            "count": models.len(),
            "pick": models.first().map(|m| m.id.clone()),
        }),
        Err(AgentError::Upstream { status, .. }) => {
            json!({"ok": false, "error": format!("HTTP {}", status)})
        }
        Err(err) => json!({"ok": false, "error": err.to_string()}),
    }
}

async fn probe_chat(upstream: &dyn Provider, model: &str) -> Value {
    let request = ChatRequest::new(model, vec![Message::user(PROBE_PROMPT)]);
    match upstream
        .complete(&request.payload(&request.messages, false))
        .await
    {
        Ok(_) => json!({"ok": true, "model": model}),
        Err(err) => json!({"ok": false, "model": model, "error": describe(&err)}),
    }
}

/// Reports whether a key is configured and, when it is, whether the upstream
/// lists models and answers a one-word chat.
async fn handler(State(state): State<AppState>) -> Json<Value> {
    let started = Instant::now();
    let present = !state.is_demo();

    let mut upstream = json!({});
    if present {
        let provider = state.upstream();
        let (models, chat) = tokio::join!(
            probe_models(provider.as_ref()),
            probe_chat(provider.as_ref(), &state.settings.default_model)
        );
        upstream = json!({"models": models, "chat": chat});
    }

    Json(json!({
        "ok": true,
        "env": {"present": present},
        "upstream": upstream,
        "durationMs": started.elapsed().as_millis() as u64,
    }))
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/ai-health", get(handler).fallback(method_not_allowed))
        .with_state(state)
}

use super::method_not_allowed;
use crate::{error::ApiError, state::AppState};
use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

// Definitions of the tools the server runs on the model's behalf
async fn handler(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let tools = state.tools().openai_tools()?;
    Ok(Json(json!({"ok": true, "data": tools})))
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/tools", get(handler).fallback(method_not_allowed))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_helpers::*;
    use crate::routes::test_helpers::get;
    use crate::state::test_support::settings;

    #[tokio::test]
    async fn test_lists_tool_definitions() {
        let app = routes(AppState::for_tests(settings("http://localhost:1", None)));
        let body = body_json(send(app, get("/api/tools")).await).await;

        let names: Vec<&str> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["function"]["name"].as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            [
                "fetch_url",
                "fetch_url_text",
                "http_get_json_path",
                "web_search",
                "current_time"
            ]
        );
        assert_eq!(body["data"][0]["type"], "function");
    }
}

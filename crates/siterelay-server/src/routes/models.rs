use super::method_not_allowed;
use crate::state::AppState;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use siterelay::providers::base::ModelInfo;
use tracing::warn;

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    ok: bool,
    data: Vec<ModelInfo>,
    default: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    notice: Option<&'static str>,
}

/// Free models offered when the upstream listing is unavailable
pub fn fallback_models() -> Vec<ModelInfo> {
    vec![
        ModelInfo::new("google/gemini-2.5-flash:free", "Gemini 2.5 Flash (free)"),
        ModelInfo::new(
            "google/gemini-2.5-flash-image-preview:free",
            "Gemini 2.5 Flash Image Preview (free)",
        ),
        ModelInfo::new("google/gemma-2-2b-it:free", "Gemma 2 2B IT (free)"),
    ]
}

async fn handler(State(state): State<AppState>) -> Json<ModelsResponse> {
    let (data, notice) = match state.upstream().list_models().await {
        Ok(models) if !models.is_empty() => (models, None),
        Ok(_) => (fallback_models(), Some("fallback")),
        Err(err) => {
            warn!("model listing failed: {}", err);
            (fallback_models(), Some("fallback"))
        }
    };

    Json(ModelsResponse {
        ok: true,
        data,
        default: state.settings.default_model.clone(),
        notice,
    })
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/models", get(handler).fallback(method_not_allowed))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_helpers::*;
    use crate::routes::test_helpers::get;
    use crate::state::test_support::settings;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_lists_upstream_models() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"id": "qwen/qwen-2.5-7b-instruct:free", "name": "Qwen", "context_length": 32768},
                    {"id": "openai/gpt-4o"}
                ]
            })))
            .mount(&server)
            .await;

        // The listing is public: no key needed
        let app = routes(AppState::for_tests(settings(&server.uri(), None)));
        let body = body_json(send(app, get("/api/models")).await).await;

        assert_eq!(body["ok"], true);
        assert_eq!(body["data"][0]["id"], "qwen/qwen-2.5-7b-instruct:free");
        assert_eq!(body["data"][0]["context_length"], 32768);
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
        assert_eq!(body["default"], "google/gemini-2.5-flash:free");
        assert!(body.get("notice").is_none());
    }

    #[tokio::test]
    async fn test_fallback_when_upstream_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let app = routes(AppState::for_tests(settings(&server.uri(), None)));
        let body = body_json(send(app, get("/api/models")).await).await;

        assert_eq!(body["ok"], true);
        assert_eq!(body["notice"], "fallback");
        assert_eq!(body["data"][0]["id"], "google/gemini-2.5-flash:free");
    }

    #[tokio::test]
    async fn test_fallback_when_listing_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        let app = routes(AppState::for_tests(settings(&server.uri(), None)));
        let body = body_json(send(app, get("/api/models")).await).await;

        assert_eq!(body["notice"], "fallback");
        assert_eq!(body["data"].as_array().unwrap().len(), 3);
    }
}

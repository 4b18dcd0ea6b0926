// Export route modules
pub mod chat;
pub mod contact;
pub mod health;
pub mod models;
pub mod stream;
pub mod tools;

use crate::{configuration::Settings, error::ApiError, state::AppState};
use axum::{
    body::Bytes,
    extract::DefaultBodyLimit,
    http::{header, HeaderMap},
    Router,
};
use siterelay::models::request::ChatBody;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Largest request body we accept
pub const BODY_LIMIT: usize = 5 * 1024 * 1024;

// Function to configure all routes
pub fn configure(state: AppState) -> Router {
    Router::new()
        .merge(chat::routes(state.clone()))
        .merge(stream::routes(state.clone()))
        .merge(models::routes(state.clone()))
        .merge(health::routes(state.clone()))
        .merge(tools::routes(state.clone()))
        .merge(contact::routes(state))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
}

/// The full application: routes plus CORS and request tracing
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    configure(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

fn header_str<'a>(headers: &'a HeaderMap, name: impl header::AsHeaderName) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Where the request says it comes from: the forwarded host, then Origin, then Referer,
/// then the configured SITE_URL.
pub fn site_url(headers: &HeaderMap, settings: &Settings) -> Option<String> {
    if let Some(host) = header_str(headers, "x-forwarded-host") {
        let proto = header_str(headers, "x-forwarded-proto").unwrap_or("https");
        return Some(format!("{}://{}", proto, host));
    }
    header_str(headers, header::ORIGIN)
        .or_else(|| header_str(headers, header::REFERER))
        .map(str::to_string)
        .or_else(|| settings.site_url.clone())
}

/// Parse a chat body. An empty body counts as `{}`; anything else must be JSON.
pub fn parse_body(body: &Bytes) -> Result<ChatBody, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ChatBody::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e)))
}

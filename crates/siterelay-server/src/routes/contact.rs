use super::{header_str, method_not_allowed};
use crate::{error::ApiError, state::AppState};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use siterelay::contact::{ContactForm, ContactMail, Provenance};

#[derive(Debug, Deserialize)]
struct VerifyQuery {
    verify: Option<String>,
}

fn provenance(headers: &HeaderMap) -> Provenance {
    let origin = header_str(headers, header::ORIGIN)
        .or_else(|| header_str(headers, header::REFERER))
        .unwrap_or_default();
    let ip = header_str(headers, "x-forwarded-for")
        .or_else(|| header_str(headers, "client-ip"))
        .unwrap_or_default();
    Provenance {
        origin: origin.to_string(),
        ip: ip.to_string(),
    }
}

/// `?verify=1` checks the SMTP connection; a plain GET is not allowed
async fn verify_handler(State(state): State<AppState>, Query(query): Query<VerifyQuery>) -> Response {
    if !matches!(query.verify.as_deref(), Some("1") | Some("true")) {
        return ApiError::MethodNotAllowed.into_response();
    }

    let verified = match state.mailer() {
        Ok(mailer) => mailer
            .verify()
            .await
            .map(|_| (mailer.recipient().to_string(), mailer.sender().to_string())),
        Err(err) => Err(err),
    };

    match verified {
        Ok((to, from)) => Json(json!({"ok": true, "verify": true, "to": to, "from": from})).into_response(),
        Err(err) => {
            tracing::warn!("smtp verification failed: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"ok": false, "verify": false, "error": err.to_string()})),
            )
                .into_response()
        }
    }
}

async fn send_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let form: ContactForm = if body.is_empty() {
        ContactForm::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e)))?
    };

    let mail = ContactMail::render(&form, &provenance(&headers))?;
    let mailer = state.mailer()?;
    mailer.verify().await?;
    mailer.send(&mail).await?;

    Ok(Json(json!({"ok": true})))
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/send-contact",
            get(verify_handler)
                .post(send_handler)
                .fallback(method_not_allowed),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_helpers::*;
    use crate::routes::test_helpers::get;
    use crate::state::test_support::settings;
    use async_trait::async_trait;
    use siterelay::contact::{ContactError, Mailer};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingMailer {
        refuse: bool,
        sent: Mutex<Vec<ContactMail>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        fn recipient(&self) -> &str {
            "owner@example.org"
        }

        fn sender(&self) -> &str {
            "bot@example.org"
        }

        async fn verify(&self) -> Result<(), ContactError> {
            if self.refuse {
                Err(ContactError::Smtp("535 authentication failed".to_string()))
            } else {
                Ok(())
            }
        }

        async fn send(&self, mail: &ContactMail) -> Result<(), ContactError> {
            self.sent.lock().unwrap().push(mail.clone());
            Ok(())
        }
    }

    fn form() -> serde_json::Value {
        json!({
            "name": "Ada",
            "email": "ada@example.com",
            "subject": "Quote",
            "message": "Hello"
        })
    }

    fn state_with(mailer: Arc<RecordingMailer>) -> AppState {
        AppState::for_tests(settings("http://localhost:1", None)).with_mailer(mailer)
    }

    #[tokio::test]
    async fn test_send_contact() {
        let mailer = Arc::new(RecordingMailer::default());
        let app = routes(state_with(mailer.clone()));

        let mut request = post_json("/api/send-contact", form());
        request
            .headers_mut()
            .insert("x-forwarded-for", "203.0.113.9".parse().unwrap());
        request
            .headers_mut()
            .insert("origin", "https://site.example".parse().unwrap());
        let response = send(app, request).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"ok": true}));

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "[Website contact] Quote - Ada");
        assert!(sent[0].text.contains("Origin: https://site.example | IP: 203.0.113.9"));
    }

    #[tokio::test]
    async fn test_missing_field_is_400() {
        let mailer = Arc::new(RecordingMailer::default());
        let app = routes(state_with(mailer.clone()));

        let mut body = form();
        body["message"] = json!("");
        let response = send(app, post_json("/api/send-contact", body)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["ok"], false);
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_mail_is_503() {
        let app = routes(AppState::for_tests(settings("http://localhost:1", None)));
        let response = send(app, post_json("/api/send-contact", form())).await;

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_smtp_failure_is_500() {
        let mailer = Arc::new(RecordingMailer {
            refuse: true,
            ..Default::default()
        });
        let app = routes(state_with(mailer));
        let response = send(app, post_json("/api/send-contact", form())).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("535"));
    }

    #[tokio::test]
    async fn test_verify() {
        let app = routes(state_with(Arc::new(RecordingMailer::default())));
        let body = body_json(send(app, get("/api/send-contact?verify=1")).await).await;
        assert_eq!(
            body,
            json!({"ok": true, "verify": true, "to": "owner@example.org", "from": "bot@example.org"})
        );

        let app = routes(AppState::for_tests(settings("http://localhost:1", None)));
        let response = send(app, get("/api/send-contact?verify=true")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["verify"], false);
    }

    #[tokio::test]
    async fn test_plain_get_is_405() {
        let app = routes(state_with(Arc::new(RecordingMailer::default())));
        let response = send(app, get("/api/send-contact")).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let app = routes(state_with(Arc::new(RecordingMailer::default())));
        let request = axum::http::Request::builder()
            .method("DELETE")
            .uri("/api/send-contact")
            .body(axum::body::Body::empty())
            .unwrap();
        let response = send(app, request).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}

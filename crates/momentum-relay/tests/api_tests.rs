//! Integration tests for the relay endpoints.
//!
//! Requests go through the `Router` with `tower::ServiceExt`, no TCP
//! listener involved.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use momentum_relay::{build_router, AppState, Email, LogMailer, MailError, Mailer};
use serde_json::{json, Value};
use tower::ServiceExt;

struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _email: &Email) -> Result<String, MailError> {
        Err(MailError::Other("smtp down".into()))
    }
}

fn state_with(mailer: Arc<dyn Mailer>) -> Arc<AppState> {
    Arc::new(AppState::new(mailer, "alarm@example.com"))
}

fn post_json(body: Value) -> Request<Body> {
    Request::post("/api/send-failure-email")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let router = build_router(state_with(Arc::new(LogMailer::new())));

    let response = router
        .oneshot(Request::get("/api/health-check").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["message"], "Server is running");
}

#[tokio::test]
async fn test_send_custom_message() {
    let mailer = Arc::new(LogMailer::new());
    let router = build_router(state_with(mailer.clone()));

    let response = router
        .oneshot(post_json(json!({
            "recipient": "friend@example.com",
            "customMessage": "Ich bin nicht aufgestanden.",
            "customSubject": "Wecker-Versagen",
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["success"], true);
    assert!(json["messageId"].is_string());
    assert!(json.get("error").is_none());

    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].from, "alarm@example.com");
    assert_eq!(sent[0].to, "friend@example.com");
    assert_eq!(sent[0].subject, "Wecker-Versagen");
    assert_eq!(sent[0].text, "Ich bin nicht aufgestanden.");
}

#[tokio::test]
async fn test_send_with_reason() {
    let mailer = Arc::new(LogMailer::new());
    let router = build_router(state_with(mailer.clone()));

    let response = router
        .oneshot(post_json(json!({
            "recipient": "friend@example.com",
            "reason": "ran out of time",
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let sent = mailer.sent();
    assert_eq!(sent[0].subject, "Momentum Maker - Wake Up Failure!");
    assert!(sent[0].text.contains("because you ran out of time."));
}

#[tokio::test]
async fn test_blank_recipient_is_bad_request() {
    let mailer = Arc::new(LogMailer::new());
    let router = build_router(state_with(mailer.clone()));

    let response = router
        .oneshot(post_json(json!({
            "recipient": " ",
            "customMessage": "x",
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "recipient is required");
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let router = build_router(state_with(Arc::new(LogMailer::new())));

    let response = router
        .oneshot(
            Request::post("/api/send-failure-email")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_mailer_failure_is_server_error() {
    let router = build_router(state_with(Arc::new(FailingMailer)));

    let response = router
        .oneshot(post_json(json!({
            "recipient": "friend@example.com",
            "customMessage": "x",
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "smtp down");
    assert!(json.get("messageId").is_none());
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let router = build_router(state_with(Arc::new(LogMailer::new())));

    let response = router
        .oneshot(Request::get("/api/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

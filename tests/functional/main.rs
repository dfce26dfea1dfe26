// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Functional tests for the webhook and health HTTP surfaces.
//!
//! Requests are driven straight into the axum routers with
//! `tower::ServiceExt::oneshot`, so no TLS certificates or sockets are needed.
//!
//! ```bash
//! cargo test --test functional
//! ```

mod webhook_tests;

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use tower::ServiceExt;

use image_policy_webhook::health::HealthState;
use image_policy_webhook::webhooks::create_webhook_router;
use image_policy_webhook::{RuleSet, WebhookState};

/// Webhook router over the built-in blacklist, plus its health state
pub fn webhook_app() -> (Router, Arc<HealthState>) {
    webhook_app_with(RuleSet::builtin())
}

pub fn webhook_app_with(rules: RuleSet) -> (Router, Arc<HealthState>) {
    let health = Arc::new(HealthState::new());
    let state = Arc::new(WebhookState::new(Arc::new(rules), health.clone()));
    (create_webhook_router(state), health)
}

pub async fn post_json(app: Router, uri: &str, body: impl Into<Body>) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    assert_eq!(response.status(), StatusCode::OK);
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Build an ImageReview body for the given images
pub fn review(images: &[&str]) -> String {
    let containers: Vec<_> = images
        .iter()
        .map(|image| serde_json::json!({ "image": image }))
        .collect();
    serde_json::json!({
        "apiVersion": "imagepolicy.k8s.io/v1alpha1",
        "kind": "ImageReview",
        "spec": { "containers": containers, "namespace": "default" }
    })
    .to_string()
}

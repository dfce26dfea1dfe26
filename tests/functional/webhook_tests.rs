//! `/scan` and `/health` on the TLS listener's router.

use axum::http::StatusCode;
use serde_json::json;

use image_policy_webhook::webhooks::policies::{PatternRule, VersionRangeRule};
use image_policy_webhook::{Rule, RuleSet};

use crate::{body_bytes, body_json, get, post_json, review, webhook_app, webhook_app_with};

#[tokio::test]
async fn test_allowed_review() {
    let (app, _) = webhook_app();
    let response = post_json(app, "/scan", review(&["nginx:1.20", "redis:6"])).await;

    let json = body_json(response).await;
    assert_eq!(json["apiVersion"], "imagepolicy.k8s.io/v1alpha1");
    assert_eq!(json["kind"], "ImageReview");
    assert_eq!(json["status"], json!({ "allowed": true }));
    assert_eq!(json["spec"]["containers"][0]["image"], "nginx:1.20");
    assert_eq!(json["spec"]["namespace"], "default");
}

#[tokio::test]
async fn test_denied_review() {
    let (app, _) = webhook_app();
    let response = post_json(app, "/scan", review(&["app:latest", "nginx:1.18"])).await;

    let json = body_json(response).await;
    assert_eq!(json["status"]["allowed"], false);
    let reason = json["status"]["reason"].as_str().unwrap();
    assert!(reason.starts_with("SECURITY: Image nginx:1.18 is forbidden"));
}

#[tokio::test]
async fn test_empty_container_list() {
    let (app, _) = webhook_app();
    let response = post_json(app, "/scan", review(&[])).await;

    let json = body_json(response).await;
    assert_eq!(json["status"]["allowed"], true);
}

#[tokio::test]
async fn test_short_circuit_cites_first_offender() {
    let rules = RuleSet::new(vec![
        Rule::new(PatternRule::new(":latest$").unwrap()).with_id("no-latest"),
        Rule::new(VersionRangeRule::new("nginx", "<1.20").unwrap()),
    ]);
    let (app, _) = webhook_app_with(rules);
    let response = post_json(app, "/scan", review(&["nginx:1.19", "busybox:latest"])).await;

    let json = body_json(response).await;
    let reason = json["status"]["reason"].as_str().unwrap();
    assert!(reason.contains("nginx:1.19"));
    assert!(reason.contains("nginx <1.20"));
    assert!(!reason.contains("busybox"));
}

#[tokio::test]
async fn test_malformed_payload_is_rejected() {
    for body in [
        "",
        "{",
        r#"{"kind": "ImageReview"}"#,
        r#"{"spec": {"containers": 7}}"#,
        r#"["v1", "ImageReview", {"containers": [{"image": "nginx:1.18"}]}]"#,
        r#"{"spec": [[["nginx:1.18"]]]}"#,
    ] {
        let (app, health) = webhook_app();
        let response = post_json(app, "/scan", body.to_string()).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(body_bytes(response).await, b"Invalid request");
        assert!(
            health
                .metrics
                .encode()
                .contains("image_policy_reviews_total{verdict=\"invalid\"} 1")
        );
    }
}

#[tokio::test]
async fn test_null_fields_are_treated_as_absent() {
    let (app, _) = webhook_app();
    let body = r#"{
        "apiVersion": null,
        "kind": "ImageReview",
        "spec": {"containers": [{"image": null}, {"image": "nginx:1.18"}], "annotations": null}
    }"#;
    let json = body_json(post_json(app, "/scan", body.to_string()).await).await;

    assert_eq!(json["apiVersion"], "");
    assert_eq!(json["status"]["allowed"], false);

    let (app, _) = webhook_app();
    let json = body_json(post_json(app, "/scan", r#"{"spec": {"containers": null}}"#).await).await;
    assert_eq!(json["status"]["allowed"], true);
}

#[tokio::test]
async fn test_decisions_are_counted() {
    let (app, health) = webhook_app();
    post_json(app.clone(), "/scan", review(&["nginx:1.20"])).await;
    post_json(app.clone(), "/scan", review(&["ubuntu:18.04"])).await;
    post_json(app, "/scan", review(&["ubuntu:18.04"])).await;

    let metrics = health.metrics.encode();
    assert!(metrics.contains("image_policy_reviews_total{verdict=\"allowed\"} 1"));
    assert!(metrics.contains("image_policy_reviews_total{verdict=\"denied\"} 2"));
    assert!(metrics.contains("image_policy_denials_total{rule=\"ubuntu:18.04\"} 2"));
}

#[tokio::test]
async fn test_scan_requires_post() {
    let (app, _) = webhook_app();
    let response = get(app, "/scan").await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_health_on_webhook_listener() {
    let (app, _) = webhook_app();
    let response = get(app, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"OK");
}

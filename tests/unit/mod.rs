// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Unit tests for image-policy-webhook.
//!
//! These tests exercise the public API without any network: payload in,
//! verdict and response envelope out.

use image_policy_webhook::{ContainerSpec, RuleSet, Verdict, evaluate, parse};

/// The blacklist the webhook has always shipped with
fn blacklist() -> RuleSet {
    RuleSet::from_tokens(["nginx:1.19", "nginx:1.18", "ubuntu:18.04"])
}

fn containers(images: &[&str]) -> Vec<ContainerSpec> {
    images.iter().map(|image| ContainerSpec::new(*image)).collect()
}

mod scenario_tests {
    use super::*;

    #[test]
    fn test_current_images_are_allowed() {
        let verdict = evaluate(&containers(&["nginx:1.20", "redis:6"]), &blacklist());
        assert_eq!(verdict, Verdict::Allowed);
    }

    #[test]
    fn test_blacklisted_sidecar_is_denied() {
        let verdict = evaluate(&containers(&["app:latest", "nginx:1.18"]), &blacklist());
        assert!(!verdict.is_allowed());
        assert!(verdict.reason().unwrap().contains("nginx:1.18"));
    }

    #[test]
    fn test_empty_containers_with_any_rule_set() {
        assert!(evaluate(&[], &blacklist()).is_allowed());
        assert!(evaluate(&[], &RuleSet::default()).is_allowed());
        assert!(evaluate(&[], &RuleSet::from_tokens([""])).is_allowed());
    }

    #[test]
    fn test_substring_match_across_registry_and_suffix() {
        let verdict = evaluate(
            &containers(&["registry.io/nginx:1.19-alpine"]),
            &RuleSet::from_tokens(["nginx:1.19"]),
        );
        assert!(!verdict.is_allowed());
    }

    #[test]
    fn test_reason_cites_first_offending_container() {
        let verdict = evaluate(&containers(&["ubuntu:18.04", "nginx:1.19"]), &blacklist());
        let violation = verdict.violation().unwrap();
        assert_eq!(violation.image, "ubuntu:18.04");
        assert!(violation.reason.contains("ubuntu:18.04"));
        assert!(!violation.reason.contains("nginx:1.19"));
    }

    #[test]
    fn test_empty_image_is_not_denied() {
        assert!(evaluate(&containers(&[""]), &blacklist()).is_allowed());
    }
}

mod envelope_tests {
    use super::*;

    #[test]
    fn test_review_round_trip() {
        let body = br#"{
            "apiVersion": "imagepolicy.k8s.io/v1alpha1",
            "kind": "ImageReview",
            "spec": { "containers": [ { "image": "app:latest" }, { "image": "nginx:1.18" } ] }
        }"#;

        let request = parse(body).unwrap();
        let verdict = evaluate(&request.spec.containers, &blacklist());
        let response = request.into_response(&verdict);

        assert_eq!(response.api_version, "imagepolicy.k8s.io/v1alpha1");
        assert_eq!(response.kind, "ImageReview");
        assert!(!response.status.allowed);
        assert!(response.status.reason.unwrap().contains("nginx:1.18"));
    }

    #[test]
    fn test_opaque_version_and_kind_are_echoed() {
        let request = parse(br#"{"apiVersion": "custom/v9", "kind": "Whatever", "spec": {}}"#)
            .unwrap();
        let response = request.into_response(&Verdict::Allowed);
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["apiVersion"], "custom/v9");
        assert_eq!(json["kind"], "Whatever");
        assert_eq!(json["status"], serde_json::json!({ "allowed": true }));
    }

    #[test]
    fn test_unparsable_payload_never_reaches_engine() {
        assert!(parse(b"{\"kind\": \"ImageReview\"}").is_err());
        assert!(parse(b"<ImageReview/>").is_err());
    }
}

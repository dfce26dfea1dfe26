// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::string_slice
)]

//! Property-based tests for image-policy-webhook.
//!
//! Uses proptest to generate random images and rule sets and verify the
//! evaluation invariants.

use proptest::prelude::*;

use image_policy_webhook::review::{ImageReviewSpec, ReviewRequest};
use image_policy_webhook::{ContainerSpec, RuleSet, evaluate, parse};

/// Strategy for generating plausible image references.
fn image() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{1,8}(:[0-9]{1,2}\\.[0-9]{1,2})?",
        "[a-z]{2,6}\\.io/[a-z]{1,8}:[a-z0-9.-]{1,10}",
        "[a-z]{1,8}@sha256:[0-9a-f]{8}",
        Just(String::new()),
    ]
}

/// Strategy for generating container lists.
fn containers() -> impl Strategy<Value = Vec<ContainerSpec>> {
    prop::collection::vec(image().prop_map(ContainerSpec::new), 0..8)
}

/// Strategy for generating non-empty blacklist tokens.
fn tokens() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z0-9:.]{1,6}", 0..6)
}

proptest! {
    /// Property: An empty container list is always allowed.
    #[test]
    fn prop_empty_containers_allowed(tokens in tokens()) {
        let verdict = evaluate(&[], &RuleSet::from_tokens(tokens));
        prop_assert!(verdict.is_allowed());
        prop_assert!(verdict.reason().is_none());
    }

    /// Property: Evaluation is deterministic.
    #[test]
    fn prop_evaluation_is_idempotent(containers in containers(), tokens in tokens()) {
        let rules = RuleSet::from_tokens(tokens);
        prop_assert_eq!(evaluate(&containers, &rules), evaluate(&containers, &rules));
    }

    /// Property: Denied iff some image contains some token, and a reason
    /// exists exactly when denied.
    #[test]
    fn prop_denial_matches_containment(containers in containers(), tokens in tokens()) {
        let rules = RuleSet::from_tokens(tokens.clone());
        let verdict = evaluate(&containers, &rules);

        let any_match = containers
            .iter()
            .any(|c| tokens.iter().any(|t| c.image.contains(t.as_str())));
        prop_assert_eq!(!verdict.is_allowed(), any_match);
        prop_assert_eq!(verdict.reason().is_some(), any_match);
    }

    /// Property: A denial cites the first container with a matching image.
    #[test]
    fn prop_first_offender_is_cited(containers in containers(), tokens in tokens()) {
        let rules = RuleSet::from_tokens(tokens.clone());
        let verdict = evaluate(&containers, &rules);

        let first = containers
            .iter()
            .find(|c| tokens.iter().any(|t| c.image.contains(t.as_str())));
        match (first, verdict.violation()) {
            (Some(container), Some(violation)) => {
                prop_assert_eq!(&violation.image, &container.image);
                prop_assert!(!violation.reason.is_empty());
                prop_assert!(violation.reason.contains(container.image.as_str()));
                prop_assert!(container.image.contains(violation.rule_id.as_str()));
            }
            (None, None) => {}
            (expected, actual) => prop_assert!(false, "expected {:?}, got {:?}", expected, actual),
        }
    }

    /// Property: apiVersion and kind survive parse and response unchanged.
    #[test]
    fn prop_envelope_round_trip(
        api_version in "[ -~]{0,24}",
        kind in "[ -~]{0,16}",
        containers in containers(),
    ) {
        let request = ReviewRequest {
            api_version: api_version.clone(),
            kind: kind.clone(),
            spec: ImageReviewSpec { containers, ..Default::default() },
        };
        let body = serde_json::to_vec(&request).unwrap();

        let parsed = parse(&body).unwrap();
        prop_assert_eq!(&parsed, &request);

        let verdict = evaluate(&parsed.spec.containers, &RuleSet::builtin());
        let response = parsed.into_response(&verdict);
        prop_assert_eq!(response.api_version, api_version);
        prop_assert_eq!(response.kind, kind);
    }
}

//! image-policy-webhook library crate
//!
//! Exports the review model, the policy engine, configuration, and the HTTP
//! servers that wrap them.

pub mod config;
pub mod health;
pub mod review;
pub mod webhooks;

pub use config::{ConfigError, WebhookConfig};
pub use health::HealthState;
pub use review::{ContainerSpec, ParseError, ReviewRequest, ReviewResponse, parse};
pub use webhooks::{
    ImageMatcher, Rule, RuleSet, Verdict, Violation, WebhookError, WebhookState, evaluate,
    run_webhook_server,
};

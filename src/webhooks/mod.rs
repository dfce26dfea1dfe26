//! Image policy admission webhook.
//!
//! `server` hosts the HTTP surface and `certificate` checks the serving
//! certificate before it starts. `policies` holds the rule variants and the
//! evaluation engine, which is pure and knows nothing about HTTP.

pub mod certificate;
pub mod policies;
mod server;

pub use policies::{ImageMatcher, Rule, RuleSet, Verdict, Violation, evaluate};
pub use server::{
    REQUEST_TIMEOUT_SECS, WebhookError, WebhookState, create_webhook_router, run_webhook_server,
};

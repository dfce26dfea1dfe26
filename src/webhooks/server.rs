//! Image review webhook server.
//!
//! Serves the API server's ImagePolicyWebhook backend over TLS:
//! - `POST /scan` - evaluates an ImageReview and returns it with `status` filled in
//! - `GET /health` - plain liveness check on the TLS listener
//!
//! Undecodable payloads are rejected with 400 before the policy engine runs.
//! Requests that take longer than [`REQUEST_TIMEOUT_SECS`] to read and answer
//! are cut off with 408.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    BoxError, Json, Router,
    body::Bytes,
    error_handling::HandleErrorLayer,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_server::tls_rustls::RustlsConfig;
use thiserror::Error;
use tower::ServiceBuilder;
use tracing::{debug, error, info, warn};

use crate::health::HealthState;
use crate::review;
use crate::webhooks::certificate;
use crate::webhooks::policies::{RuleSet, Verdict, evaluate};

/// Upper bound on reading, evaluating and answering a single request
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Shared state for webhook handlers
pub struct WebhookState {
    /// Immutable rule set, built once at startup
    pub rules: Arc<RuleSet>,
    pub health: Arc<HealthState>,
}

impl WebhookState {
    pub fn new(rules: Arc<RuleSet>, health: Arc<HealthState>) -> Self {
        Self { rules, health }
    }
}

/// Create the webhook router
pub fn create_webhook_router(state: Arc<WebhookState>) -> Router {
    let router = Router::new()
        .route("/scan", post(scan))
        .route("/health", get(health))
        .with_state(state);
    with_request_timeout(router, Duration::from_secs(REQUEST_TIMEOUT_SECS))
}

/// Bound every request on `router` by `timeout`.
///
/// `HandleErrorLayer` sits outside the timeout so the elapsed error becomes a response.
fn with_request_timeout(router: Router, timeout: Duration) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(HandleErrorLayer::new(handle_timeout))
            .timeout(timeout),
    )
}

async fn handle_timeout(err: BoxError) -> (StatusCode, String) {
    if err.is::<tower::timeout::error::Elapsed>() {
        warn!("Request timed out");
        (StatusCode::REQUEST_TIMEOUT, "Request timed out".to_string())
    } else {
        error!(error = %err, "Unhandled middleware error");
        (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Evaluate an image review
async fn scan(State(state): State<Arc<WebhookState>>, body: Bytes) -> Response {
    debug!(bytes = body.len(), "Received image review request");

    let request = match review::parse(&body) {
        Ok(request) => request,
        Err(e) => {
            error!(error = %e, "Failed to decode image review");
            state.health.metrics.record_invalid();
            return (StatusCode::BAD_REQUEST, "Invalid request").into_response();
        }
    };

    for image in request.images() {
        debug!(image = %image, "Checking image");
    }

    let started = Instant::now();
    let verdict = evaluate(&request.spec.containers, &state.rules);
    state
        .health
        .metrics
        .record_verdict(&verdict, started.elapsed().as_secs_f64());

    match &verdict {
        Verdict::Allowed => info!(
            containers = request.spec.containers.len(),
            namespace = ?request.spec.namespace,
            "Image review allowed"
        ),
        Verdict::Denied(violation) => warn!(
            image = %violation.image,
            rule = %violation.rule_id,
            namespace = ?request.spec.namespace,
            "Image review denied"
        ),
    }

    (StatusCode::OK, Json(request.into_response(&verdict))).into_response()
}

/// Errors that can occur when running the webhook server
#[derive(Error, Debug)]
pub enum WebhookError {
    /// TLS configuration error
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),
    /// Server error
    #[error("Webhook server error: {0}")]
    Server(String),
}

/// Run the webhook server with TLS
///
/// Binds to 0.0.0.0 on `port`. The certificate's validity window is checked
/// first; readiness flips to true once the certificate and key have been loaded.
///
/// # Arguments
/// * `state` - Rule set and health state shared with handlers
/// * `cert_path` - Path to TLS certificate file (PEM format)
/// * `key_path` - Path to TLS private key file (PEM format)
/// * `port` - Listener port
pub async fn run_webhook_server(
    state: Arc<WebhookState>,
    cert_path: &Path,
    key_path: &Path,
    port: u16,
) -> Result<(), WebhookError> {
    let health = state.health.clone();
    let app = create_webhook_router(state);

    certificate::validate_certificate(cert_path).await?;

    let config = RustlsConfig::from_pem_file(cert_path, key_path)
        .await
        .map_err(|e| WebhookError::TlsConfig(e.to_string()))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(port, "Webhook server listening with TLS");
    health.set_ready(true).await;

    axum_server::bind_rustls(addr, config)
        .serve(app.into_make_service())
        .await
        .map_err(|e| WebhookError::Server(e.to_string()))?;

    Ok(())
}

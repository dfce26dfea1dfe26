//! Health server for Kubernetes probes and Prometheus metrics.
//!
//! Provides:
//! - `/healthz` - Liveness probe (always returns 200 if server is running)
//! - `/readyz` - Readiness probe (returns 200 once the TLS listener is configured)
//! - `/metrics` - Prometheus metrics endpoint

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::{EncodeLabel, EncodeLabelSet, LabelSetEncoder};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use tokio::sync::RwLock;
use tracing::info;

use crate::webhooks::policies::Verdict;

/// Labels for review outcome metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct OutcomeLabels {
    pub verdict: &'static str,
}

impl EncodeLabelSet for OutcomeLabels {
    fn encode(&self, mut encoder: LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("verdict", self.verdict).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Labels for per-rule denial metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct RuleLabels {
    pub rule: String,
}

impl EncodeLabelSet for RuleLabels {
    fn encode(&self, mut encoder: LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("rule", self.rule.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Shared metrics for the webhook
pub struct Metrics {
    /// Reviews by outcome (allowed, denied, invalid)
    pub reviews_total: Family<OutcomeLabels, Counter>,
    /// Denials by violated rule
    pub denials_total: Family<RuleLabels, Counter>,
    /// Number of rules in the active rule set
    pub rules_loaded: Gauge,
    /// Policy evaluation duration
    pub evaluation_duration_seconds: Histogram,
    /// Prometheus registry
    registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new metrics instance with registered metrics
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let reviews_total = Family::<OutcomeLabels, Counter>::default();
        registry.register(
            "image_policy_reviews",
            "Total number of image reviews by verdict",
            reviews_total.clone(),
        );

        let denials_total = Family::<RuleLabels, Counter>::default();
        registry.register(
            "image_policy_denials",
            "Total number of denied image reviews by rule",
            denials_total.clone(),
        );

        let rules_loaded = Gauge::default();
        registry.register(
            "image_policy_rules_loaded",
            "Number of rules in the active rule set",
            rules_loaded.clone(),
        );

        let evaluation_duration_seconds = Histogram::new(exponential_buckets(0.000_001, 4.0, 12));
        registry.register(
            "image_policy_evaluation_duration_seconds",
            "Duration of policy evaluation in seconds",
            evaluation_duration_seconds.clone(),
        );

        Self {
            reviews_total,
            denials_total,
            rules_loaded,
            evaluation_duration_seconds,
            registry,
        }
    }

    /// Record an evaluated review
    pub fn record_verdict(&self, verdict: &Verdict, duration_secs: f64) {
        self.evaluation_duration_seconds.observe(duration_secs);
        match verdict.violation() {
            None => {
                self.reviews_total
                    .get_or_create(&OutcomeLabels { verdict: "allowed" })
                    .inc();
            }
            Some(violation) => {
                self.reviews_total
                    .get_or_create(&OutcomeLabels { verdict: "denied" })
                    .inc();
                self.denials_total
                    .get_or_create(&RuleLabels {
                        rule: violation.rule_id.clone(),
                    })
                    .inc();
            }
        }
    }

    /// Record a review rejected before evaluation
    pub fn record_invalid(&self) {
        self.reviews_total
            .get_or_create(&OutcomeLabels { verdict: "invalid" })
            .inc();
    }

    /// Update the loaded rule count
    pub fn set_rules_loaded(&self, count: usize) {
        self.rules_loaded
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Encode metrics to Prometheus text format
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        if encode(&mut buffer, &self.registry).is_err() {
            tracing::error!("Failed to encode metrics");
            return "# Error encoding metrics".to_string();
        }
        buffer
    }
}

/// Shared state for the health server
pub struct HealthState {
    /// Whether the webhook listener is configured and serving
    ready: RwLock<bool>,
    /// Metrics registry
    pub metrics: Metrics,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Create a new health state (starts as not ready)
    pub fn new() -> Self {
        Self {
            ready: RwLock::new(false),
            metrics: Metrics::new(),
        }
    }

    /// Mark the webhook as ready or not ready
    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    /// Check if the webhook is ready
    pub async fn is_ready(&self) -> bool {
        *self.ready.read().await
    }
}

/// Liveness probe handler
///
/// Returns 200 OK if the process is alive.
async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Readiness probe handler
///
/// Returns 200 OK if the webhook is ready to serve.
/// Returns 503 Service Unavailable if not ready.
async fn readyz(State(state): State<Arc<HealthState>>) -> Response {
    if state.is_ready().await {
        (StatusCode::OK, "ready").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready").into_response()
    }
}

/// Metrics handler
async fn metrics_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let body = state.metrics.encode();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// Create the health server router
pub fn create_router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Run the health server
///
/// Binds to 0.0.0.0 on `port` and serves health/metrics endpoints over plain HTTP.
pub async fn run_health_server(state: Arc<HealthState>, port: u16) -> Result<(), std::io::Error> {
    let app = create_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!(port, "Starting health server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

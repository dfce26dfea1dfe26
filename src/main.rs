//! image-policy-webhook - ImagePolicyWebhook backend that denies blacklisted images.
//!
//! This is the main entry point that:
//! - Initializes structured logging
//! - Loads configuration and the rule set (fatal on any error)
//! - Starts the health server and the TLS webhook server

use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tracing::{error, info};

use image_policy_webhook::health::{HealthState, run_health_server};
use image_policy_webhook::{WebhookConfig, WebhookState, run_webhook_server};

/// Grace period for in-flight reviews to complete during shutdown
const SHUTDOWN_GRACE_PERIOD_SECS: u64 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("image_policy_webhook=info".parse()?),
        )
        .json()
        .init();

    info!("Starting image-policy-webhook");

    // Configuration errors are fatal: never serve with an ambiguous policy
    let config = WebhookConfig::from_env().inspect_err(|e| {
        error!(error = %e, "Invalid configuration");
    })?;
    let rules = Arc::new(config.load_rules().inspect_err(|e| {
        error!(error = %e, "Failed to load image policy rules");
    })?);

    info!(
        rules = rules.len(),
        source = %config
            .rules_path
            .as_ref()
            .map_or_else(|| "built-in".to_string(), |p| p.display().to_string()),
        "Loaded image policy rules"
    );

    // Create shared health state
    let health_state = Arc::new(HealthState::new());
    health_state.metrics.set_rules_loaded(rules.len());

    // Start health server immediately so liveness works while TLS loads
    let health_handle = {
        let health_state = health_state.clone();
        let port = config.health_port;
        tokio::spawn(async move { run_health_server(health_state, port).await })
    };

    let webhook_handle = {
        let state = Arc::new(WebhookState::new(rules, health_state.clone()));
        let config = config.clone();
        tokio::spawn(async move {
            run_webhook_server(state, &config.cert_path, &config.key_path, config.webhook_port)
                .await
        })
    };

    // Wait for either server to exit, or shutdown signal
    tokio::select! {
        result = webhook_handle => {
            match result {
                Ok(Ok(())) => info!("Webhook server exited"),
                Ok(Err(e)) => {
                    error!(error = %e, "Webhook server failed");
                    return Err(e.into());
                }
                Err(e) => {
                    error!("Webhook server task panicked: {}", e);
                    return Err(e.into());
                }
            }
        }
        result = health_handle => {
            match result {
                Ok(Ok(())) => info!("Health server exited"),
                Ok(Err(e)) => {
                    error!(error = %e, "Health server failed");
                    return Err(e.into());
                }
                Err(e) => {
                    error!("Health server task panicked: {}", e);
                    return Err(e.into());
                }
            }
        }
        // Handle graceful shutdown on SIGTERM or SIGINT
        _ = shutdown_signal() => {
            info!("Received shutdown signal, initiating graceful shutdown...");

            // Mark as not ready to stop receiving new reviews
            health_state.set_ready(false).await;
            info!("Marked webhook as not ready");

            info!(
                "Waiting {}s for in-flight reviews to complete...",
                SHUTDOWN_GRACE_PERIOD_SECS
            );
            tokio::time::sleep(Duration::from_secs(SHUTDOWN_GRACE_PERIOD_SECS)).await;

            info!("Grace period complete, shutting down");
        }
    }

    info!("Webhook stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
///
/// Note: Signal handler setup failures are fatal - the webhook cannot shut down
/// gracefully without them. Using expect() here is intentional.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

//! Gravnet API server.
//!
//! Starts a registry with a live scheduler and serves the REST/websocket
//! API until interrupted. Nodes created through the API self-tick in the
//! background; shutdown cancels every tick loop and waits for quiescence.

use std::time::Duration;

use gravnet::api;
use gravnet::registry::Registry;
use gravnet::telemetry::{self, LogDestination};

/// Twice the largest tick interval: every loop observes cancellation at
/// its next sleep boundary well within this.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    let _guard = telemetry::init(LogDestination::from_env());

    let registry = Registry::with_scheduler();
    let bind_addr =
        std::env::var("GRAVNET_BIND").unwrap_or_else(|_| "127.0.0.1:8401".to_string());

    tracing::info!("gravnet starting");

    tokio::select! {
        result = api::serve(registry.clone(), &bind_addr) => {
            if let Err(err) = result {
                tracing::error!(error = %err, "API server exited");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received, cancelling node tasks");
        }
    }

    let leaked = registry.cancel_all(SHUTDOWN_GRACE).await;
    if leaked > 0 {
        tracing::warn!(leaked, "tick loops still running at exit");
    }
    tracing::info!("gravnet stopped");
}

//! HTTP event harness
//!
//! Receives budget notices from a Pub/Sub push subscription (or a background
//! function trigger forwarding the same envelope) and runs one invocation per
//! request. Status codes drive redelivery: anything but 2xx is retried by
//! Pub/Sub, so payloads that can never succeed are acknowledged with 200.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use cost_sentry_common::decode_envelope;
use tracing::{error, info, warn};

use crate::config::{GcpSettings, SentryConfig};
use crate::sentry::report::render_chain;
use crate::sentry::{InvocationError, InvocationReport, Orchestrator};

/// Shared handler state
#[derive(Debug)]
pub struct AppState {
    pub config: SentryConfig,
    pub gcp: GcpSettings,
}

/// Build the harness router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(event_handler))
        .route("/healthz", get(health_handler))
        .with_state(state)
}

/// Serve the harness until interrupted.
pub async fn run(state: AppState, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!(
        addr = %addr,
        project = %state.config.project,
        label = %state.config.label,
        "Event harness listening"
    );

    axum::serve(listener, router(Arc::new(state)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Event harness stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn event_handler(State(state): State<Arc<AppState>>, body: Bytes) -> (StatusCode, String) {
    let payload = match decode_envelope(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "Acknowledging undecodable envelope");
            return (StatusCode::OK, format!("ignored: {e}"));
        }
    };

    // Clients are built per event so credentials are never reused across
    // invocations.
    let gcp = match state.gcp.connect().await {
        Ok(gcp) => gcp,
        Err(e) => {
            error!(error = ?e, "Cannot initialize GCP clients");
            return (StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"));
        }
    };

    let orchestrator = Orchestrator::new(
        state.config.clone(),
        gcp.compute_client(),
        gcp.run_client(),
    );
    response_for(&orchestrator.handle_event(&payload).await)
}

/// Map an invocation result to the response returned to the push sender.
pub fn response_for(result: &Result<InvocationReport, InvocationError>) -> (StatusCode, String) {
    match result {
        Ok(report) => (StatusCode::OK, report.to_string()),
        Err(e) if !e.is_redeliverable() => {
            (StatusCode::OK, format!("ignored: {}", render_chain(e)))
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, render_chain(e)),
    }
}

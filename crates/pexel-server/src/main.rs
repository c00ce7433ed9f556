// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pexel server binary.  Reads `PEXEL_*` settings (and `.env`), opens the
// artifact store, starts the expiry sweep and serves the HTTP API until
// Ctrl+C or SIGTERM, then purges every remaining artifact.

mod error;
mod routes;
mod state;

use std::process::ExitCode;

use pexel_core::ServiceConfig;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use crate::state::AppState;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match ServiceConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        storage_dir = %config.storage_dir.display(),
        default_ttl_secs = config.default_ttl_secs,
        deletion_grace_secs = config.deletion_grace().as_secs(),
        "Starting Pexel"
    );

    let state = match AppState::initialise(config).await {
        Ok(state) => state,
        Err(err) => {
            tracing::error!(error = %err, "Failed to open artifact store");
            return ExitCode::FAILURE;
        }
    };
    state.start_expiry();

    let addr = state.config.bind_address();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(%addr, error = %err, "Failed to bind");
            state.shutdown().await;
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(%addr, "Pexel listening");

    let served = axum::serve(listener, routes::router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    let purged = state.shutdown().await;
    tracing::info!(purged, "Server shutdown complete");

    match served {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "Server error");
            ExitCode::FAILURE
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::warn!(error = %err, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}

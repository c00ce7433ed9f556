// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Router assembly.

pub mod artifacts;
pub mod health;
pub mod operations;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Files accepted in one multipart request.
pub const MAX_FILES_PER_REQUEST: u64 = 20;

pub fn router(state: AppState) -> Router {
    let body_limit = usize::try_from(
        state
            .config
            .max_upload_bytes
            .saturating_mul(MAX_FILES_PER_REQUEST),
    )
    .unwrap_or(usize::MAX);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/operations", get(operations::list))
        .route("/api/operations/{name}", post(operations::execute))
        .route("/api/artifacts", post(artifacts::upload))
        .route(
            "/api/artifacts/{handle}",
            get(artifacts::download).delete(artifacts::remove),
        )
        .route("/api/{name}", post(operations::one_shot))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP error mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pexel_core::PexelError;
use pexel_core::report::{ErrorClass, describe};
use serde::Serialize;
use thiserror::Error;

/// Errors a handler can return.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Pexel(#[from] PexelError),

    /// Malformed HTTP input that never reached the pipeline.
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    suggestion: String,
    /// Whether repeating the same request later may succeed.
    retriable: bool,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Pexel(err) => {
                let report = describe(err);
                let status = match (report.class, err) {
                    (_, PexelError::UploadTooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
                    (ErrorClass::Client, _) => StatusCode::BAD_REQUEST,
                    (ErrorClass::NotFound, _) => StatusCode::NOT_FOUND,
                    (ErrorClass::Capacity, _) => StatusCode::INSUFFICIENT_STORAGE,
                    (ErrorClass::Processing, _) => StatusCode::UNPROCESSABLE_ENTITY,
                    (ErrorClass::Internal, _) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status.is_server_error() {
                    tracing::error!(code = report.code, error = %err, "Request failed");
                } else {
                    tracing::debug!(code = report.code, error = %err, "Request rejected");
                }
                (
                    status,
                    ErrorBody {
                        retriable: report.retriable(),
                        error: report.code,
                        message: report.message,
                        suggestion: report.suggestion,
                    },
                )
            }
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: "BAD_REQUEST",
                    message: message.clone(),
                    suggestion: "Check the request format and try again.".to_string(),
                    retriable: false,
                },
            ),
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        error: "INTERNAL_ERROR",
                        message: "An internal error occurred".to_string(),
                        suggestion: "Try again later.".to_string(),
                        retriable: true,
                    },
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Operation endpoints: the catalog listing, handle-based execution and the
// one-shot multipart form that uploads, runs and streams in one request.

use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::response::{IntoResponse, Response};
use pexel_core::{ArtifactHandle, ArtifactReceipt, OperationResult, StructuredData};
use pexel_pipeline::{Operation, OperationDescriptor, Parameters, describe_all};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::routes::MAX_FILES_PER_REQUEST;
use crate::routes::artifacts::{
    ArtifactView, UploadedFile, detect_media_type, multipart_error, stream_artifact,
};
use crate::state::AppState;

/// GET /api/operations
pub async fn list() -> Json<Vec<OperationDescriptor>> {
    Json(describe_all())
}

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub inputs: Vec<ArtifactHandle>,
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecuteResponse {
    Artifact {
        #[serde(flatten)]
        view: ArtifactView,
        input_bytes: u64,
    },
    Data(StructuredData),
}

/// POST /api/operations/{name}
pub async fn execute(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<ExecuteRequest>,
) -> Result<Json<ExecuteResponse>, ApiError> {
    let parameters = Parameters::from_json(request.parameters)?;
    let result = state
        .pipeline
        .execute(&name, &request.inputs, &parameters)
        .await?;
    Ok(Json(match result {
        OperationResult::Artifact(receipt) => ExecuteResponse::Artifact {
            view: ArtifactView::from(&receipt.artifact),
            input_bytes: receipt.input_bytes,
        },
        OperationResult::Data(data) => ExecuteResponse::Data(data),
    }))
}

/// POST /api/{name}
///
/// Multipart form with one or more `file`/`files` parts; every other part
/// is an operation parameter.  Inputs are discarded once the operation has
/// run, whatever the outcome.
pub async fn one_shot(
    State(state): State<AppState>,
    Path(name): Path<String>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let operation: Operation = name.parse()?;
    let (files, parameters) = read_form(multipart).await?;

    let mut inputs = Vec::with_capacity(files.len());
    let mut outcome = Ok(());
    for file in files {
        match state
            .pipeline
            .ingest(&file.bytes, file.media_type, file.file_name)
            .await
        {
            Ok(artifact) => inputs.push(artifact.handle),
            Err(err) => {
                outcome = Err(err);
                break;
            }
        }
    }
    let result = match outcome {
        Ok(()) => {
            state
                .pipeline
                .execute(operation.name(), &inputs, &parameters)
                .await
        }
        Err(err) => Err(err),
    };

    for handle in inputs {
        if let Err(err) = state.store.discard(handle).await {
            tracing::warn!(%handle, error = %err, "Failed to discard one-shot input");
        }
    }

    match result? {
        OperationResult::Artifact(receipt) => {
            let lease = state.store.get(receipt.artifact.handle)?;
            let extra = if operation == Operation::Compress {
                compression_headers(&receipt)
            } else {
                Vec::new()
            };
            stream_artifact(lease, extra).await
        }
        OperationResult::Data(data) => Ok(Json(data).into_response()),
    }
}

async fn read_form(mut multipart: Multipart) -> Result<(Vec<UploadedFile>, Parameters), ApiError> {
    let mut files = Vec::new();
    let mut parameters = Parameters::new();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" || name == "files" {
            if files.len() as u64 >= MAX_FILES_PER_REQUEST {
                return Err(ApiError::BadRequest(format!(
                    "at most {MAX_FILES_PER_REQUEST} files per request"
                )));
            }
            let file_name = field.file_name().map(str::to_string);
            let media_type = detect_media_type(field.content_type(), file_name.as_deref());
            let bytes = field.bytes().await.map_err(multipart_error)?;
            files.push(UploadedFile {
                file_name,
                media_type,
                bytes,
            });
        } else {
            let value = field.text().await.map_err(multipart_error)?;
            parameters.insert(name, value);
        }
    }
    Ok((files, parameters))
}

/// `X-Original-Size`, `X-Compressed-Size` and `X-Compression-Ratio` (the
/// percentage saved, one decimal).
fn compression_headers(receipt: &ArtifactReceipt) -> Vec<(&'static str, String)> {
    let original = receipt.input_bytes;
    let compressed = receipt.artifact.size_bytes;
    let saved = if original == 0 {
        0.0
    } else {
        (1.0 - compressed as f64 / original as f64) * 100.0
    };
    vec![
        ("x-original-size", original.to_string()),
        ("x-compressed-size", compressed.to_string()),
        ("x-compression-ratio", format!("{saved:.1}%")),
    ]
}

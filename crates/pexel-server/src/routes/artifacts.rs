// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Artifact endpoints: upload, streamed download, early delete.

use axum::Json;
use axum::body::{Body, Bytes};
use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use futures::Stream;
use pexel_core::{Artifact, ArtifactHandle, MediaType, PexelError};
use pexel_store::ArtifactLease;
use serde::Serialize;
use tokio::io::AsyncReadExt;

use crate::error::ApiError;
use crate::state::AppState;

const CHUNK_SIZE: usize = 64 * 1024;

/// Client view of a stored artifact.
#[derive(Debug, Serialize)]
pub struct ArtifactView {
    pub handle: ArtifactHandle,
    pub media_type: MediaType,
    pub size_bytes: u64,
    pub file_name: Option<String>,
    pub digest: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub download_url: String,
}

impl From<&Artifact> for ArtifactView {
    fn from(artifact: &Artifact) -> Self {
        Self {
            handle: artifact.handle,
            media_type: artifact.media_type,
            size_bytes: artifact.size_bytes,
            file_name: artifact.file_name.clone(),
            digest: artifact.digest.clone(),
            created_at: artifact.created_at,
            expires_at: artifact.expires_at(),
            download_url: format!("/api/artifacts/{}", artifact.handle),
        }
    }
}

/// An uploaded file before it is stored.
pub(crate) struct UploadedFile {
    pub file_name: Option<String>,
    pub media_type: MediaType,
    pub bytes: Bytes,
}

/// Media type from the part's declared content type, falling back to the
/// file name's extension.
pub(crate) fn detect_media_type(content_type: Option<&str>, file_name: Option<&str>) -> MediaType {
    content_type
        .and_then(MediaType::from_mime)
        .filter(|media_type| *media_type != MediaType::OctetStream)
        .or_else(|| file_name.and_then(MediaType::from_file_name))
        .unwrap_or(MediaType::OctetStream)
}

pub(crate) fn parse_handle(raw: &str) -> Result<ArtifactHandle, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::Pexel(PexelError::NotFound(raw.to_string())))
}

pub(crate) fn multipart_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::BadRequest(format!("invalid multipart body: {err}"))
}

/// POST /api/artifacts
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ArtifactView>), ApiError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            return Err(ApiError::BadRequest(format!(
                "unexpected field {:?}",
                field.name().unwrap_or_default()
            )));
        }
        if upload.is_some() {
            return Err(ApiError::BadRequest("exactly one file is accepted".into()));
        }
        let file_name = field.file_name().map(str::to_string);
        let media_type = detect_media_type(field.content_type(), file_name.as_deref());
        let bytes = field.bytes().await.map_err(multipart_error)?;
        upload = Some(UploadedFile {
            file_name,
            media_type,
            bytes,
        });
    }

    let upload = upload.ok_or_else(|| ApiError::BadRequest("missing \"file\" field".into()))?;
    let artifact = state
        .pipeline
        .ingest(&upload.bytes, upload.media_type, upload.file_name)
        .await?;
    tracing::info!(handle = %artifact.handle, size = artifact.size_bytes, "Artifact uploaded");
    Ok((StatusCode::CREATED, Json(ArtifactView::from(&artifact))))
}

/// GET /api/artifacts/{handle}
pub async fn download(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Response, ApiError> {
    let handle = parse_handle(&raw)?;
    let lease = state.store.get(handle)?;
    stream_artifact(lease, Vec::new()).await
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    deleted: bool,
}

/// DELETE /api/artifacts/{handle}
///
/// An artifact still being downloaded is reported deleted: it is hidden at
/// once and its file goes with the first sweep after the download ends.
pub async fn remove(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let handle = parse_handle(&raw)?;
    let deleted = state.store.discard(handle).await?;
    Ok(Json(DeleteResponse { deleted }))
}

/// Build a streaming response that holds `lease` until the last byte is
/// sent or the client goes away.
pub(crate) async fn stream_artifact(
    lease: ArtifactLease,
    extra_headers: Vec<(&'static str, String)>,
) -> Result<Response, ApiError> {
    let artifact = lease.artifact().clone();
    let file = lease.open_file().await?;

    let file_name = artifact
        .file_name
        .clone()
        .unwrap_or_else(|| format!("{}.{}", artifact.handle, artifact.media_type.extension()))
        .replace(['"', '\\', '\r', '\n'], "_");

    let mut response = Body::from_stream(lease_stream(file, lease)).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(artifact.media_type.mime_type()),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(artifact.size_bytes));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    for (name, value) in [
        (
            "content-disposition",
            format!("attachment; filename=\"{file_name}\""),
        ),
        ("etag", format!("\"{}\"", artifact.digest)),
        ("x-expires-at", artifact.expires_at().to_rfc3339()),
    ]
    .into_iter()
    .chain(extra_headers)
    {
        let value = HeaderValue::from_str(&value)
            .map_err(|err| ApiError::Internal(format!("header {name}: {err}")))?;
        headers.insert(name, value);
    }
    Ok(response)
}

fn lease_stream(
    file: tokio::fs::File,
    lease: ArtifactLease,
) -> impl Stream<Item = std::io::Result<Bytes>> + Send + 'static {
    futures::stream::unfold(Some((file, lease)), |state| async move {
        let (mut file, lease) = state?;
        let mut buffer = vec![0u8; CHUNK_SIZE];
        match file.read(&mut buffer).await {
            Ok(0) => None,
            Ok(read) => {
                buffer.truncate(read);
                Some((Ok(Bytes::from(buffer)), Some((file, lease))))
            }
            Err(err) => {
                tracing::warn!(handle = %lease.handle(), error = %err, "Artifact stream failed");
                Some((Err(err), None))
            }
        }
    })
}

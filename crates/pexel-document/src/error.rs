// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Failures raised by the document engine.

use thiserror::Error;

/// Errors from the document-manipulation layer.
///
/// These never cross the pipeline boundary as-is: the pipeline wraps them
/// into `PexelError::OperationFailed` with the message as the cause.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("wrong password")]
    WrongPassword,

    #[error("document is encrypted; unlock it first")]
    Encrypted,

    #[error("corrupt document: {0}")]
    Corrupt(String),

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("image error: {0}")]
    Image(String),

    #[error("archive error: {0}")]
    Archive(String),
}

impl From<lopdf::Error> for EngineError {
    fn from(err: lopdf::Error) -> Self {
        Self::Pdf(err.to_string())
    }
}

impl From<image::ImageError> for EngineError {
    fn from(err: image::ImageError) -> Self {
        Self::Image(err.to_string())
    }
}

impl From<zip::result::ZipError> for EngineError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Archive(err.to_string())
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

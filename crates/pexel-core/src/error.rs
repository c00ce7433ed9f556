// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error taxonomy for Pexel.

use thiserror::Error;

/// Top-level error type for all Pexel operations.
///
/// Grammar and validation variants carry the offending value verbatim.
/// Transformation failures are flattened into [`PexelError::OperationFailed`]
/// so no library-specific error type escapes the pipeline.
#[derive(Debug, Error)]
pub enum PexelError {
    // -- Page-range grammar --
    #[error("page selection is empty")]
    EmptySelection,

    #[error("malformed page token {0:?}")]
    MalformedToken(String),

    #[error("page {index} is out of range (document has {page_count} pages)")]
    OutOfRange { index: u32, page_count: u32 },

    #[error("inverted page range {start}-{end}")]
    InvertedRange { start: u32, end: u32 },

    // -- Artifact store --
    #[error("artifact {0} not found")]
    NotFound(String),

    #[error("artifact storage is full: {0}")]
    StorageFull(String),

    #[error("upload of {size} bytes exceeds the {max} byte limit")]
    UploadTooLarge { size: u64, max: u64 },

    // -- Pipeline --
    #[error("unknown operation {0:?}")]
    UnknownOperation(String),

    #[error("invalid parameter {name:?}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("{operation} failed: {cause}")]
    OperationFailed { operation: String, cause: String },

    // -- Infrastructure --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PexelError {
    /// Shorthand for building an [`PexelError::InvalidParameter`].
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Stable machine-readable code for this error.
    ///
    /// Codes are part of the public contract and never change once released.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptySelection => "EMPTY_SELECTION",
            Self::MalformedToken(_) => "MALFORMED_TOKEN",
            Self::OutOfRange { .. } => "OUT_OF_RANGE",
            Self::InvertedRange { .. } => "INVERTED_RANGE",
            Self::NotFound(_) => "NOT_FOUND",
            Self::StorageFull(_) => "STORAGE_FULL",
            Self::UploadTooLarge { .. } => "UPLOAD_TOO_LARGE",
            Self::UnknownOperation(_) => "UNKNOWN_OPERATION",
            Self::InvalidParameter { .. } => "INVALID_PARAMETER",
            Self::OperationFailed { .. } => "OPERATION_FAILED",
            Self::Io(_) => "IO_ERROR",
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PexelError>;

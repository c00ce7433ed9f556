// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Caller-facing error reports.
//
// Every error is mapped to a stable code, a plain-English message and an
// actionable suggestion.  The class decides how an outer surface presents
// it (HTTP status, exit code, ...).

use serde::Serialize;

use crate::error::PexelError;

/// Who is expected to act on an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// The request itself is wrong; retrying unchanged will fail again.
    Client,
    /// The named artifact does not exist or has expired.
    NotFound,
    /// The service is out of room; retrying later may succeed.
    Capacity,
    /// The document could not be transformed.
    Processing,
    /// Something broke on the service side.
    Internal,
}

/// A serialisable description of an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub code: &'static str,
    pub message: String,
    pub suggestion: String,
    #[serde(skip)]
    pub class: ErrorClass,
}

impl ErrorReport {
    fn new(err: &PexelError, class: ErrorClass, suggestion: impl Into<String>) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
            suggestion: suggestion.into(),
            class,
        }
    }

    /// Whether the same request could succeed if repeated later.
    pub fn retriable(&self) -> bool {
        matches!(self.class, ErrorClass::Capacity | ErrorClass::Internal)
    }
}

/// Describe `err` for a caller.
pub fn describe(err: &PexelError) -> ErrorReport {
    match err {
        // -- Page selection --
        PexelError::EmptySelection => ErrorReport::new(
            err,
            ErrorClass::Client,
            "Name at least one page, e.g. \"1\", \"2-4\" or \"all\".",
        ),
        PexelError::MalformedToken(_) => ErrorReport::new(
            err,
            ErrorClass::Client,
            "Use comma-separated page numbers and ranges such as \"1-3,5,7-9\".",
        ),
        PexelError::OutOfRange { page_count, .. } => ErrorReport::new(
            err,
            ErrorClass::Client,
            format!("Pick pages between 1 and {page_count}."),
        ),
        PexelError::InvertedRange { start, end } => ErrorReport::new(
            err,
            ErrorClass::Client,
            format!("Write the range low-to-high, e.g. \"{end}-{start}\"."),
        ),

        // -- Artifacts --
        PexelError::NotFound(_) => ErrorReport::new(
            err,
            ErrorClass::NotFound,
            "Artifacts are deleted automatically after a few minutes. Upload the file again.",
        ),
        PexelError::StorageFull(_) => ErrorReport::new(
            err,
            ErrorClass::Capacity,
            "The service is holding too many files right now. Try again shortly.",
        ),
        PexelError::UploadTooLarge { max, .. } => ErrorReport::new(
            err,
            ErrorClass::Client,
            format!("Upload a file no larger than {max} bytes."),
        ),

        // -- Operations --
        PexelError::UnknownOperation(_) => ErrorReport::new(
            err,
            ErrorClass::Client,
            "List the available operations with GET /api/operations.",
        ),
        PexelError::InvalidParameter { .. } => ErrorReport::new(
            err,
            ErrorClass::Client,
            "Check the parameter against the operation's documented values.",
        ),
        PexelError::OperationFailed { cause, .. } => {
            let lower = cause.to_ascii_lowercase();
            let suggestion = if lower.contains("password") {
                "Check the password and try again."
            } else if lower.contains("encrypted") {
                "Unlock the document first, then repeat the operation."
            } else if lower.contains("image") {
                "The image may be damaged or in an unusual format. Try PNG or JPEG."
            } else {
                "The file may be damaged. Try opening it in a PDF viewer to check it works."
            };
            ErrorReport::new(err, ErrorClass::Processing, suggestion)
        }

        // -- Infrastructure --
        PexelError::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::PermissionDenied => ErrorReport::new(
                err,
                ErrorClass::Internal,
                "The service cannot write to its storage directory.",
            ),
            _ => ErrorReport::new(err, ErrorClass::Internal, "Try again in a moment."),
        },
    }
}

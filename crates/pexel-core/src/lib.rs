// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pexel: Core types, error taxonomy, configuration, and the page-range
// grammar shared across all crates.

pub mod config;
pub mod error;
pub mod page_range;
pub mod report;
pub mod types;

pub use config::ServiceConfig;
pub use error::PexelError;
pub use page_range::{PageRangeSpec, resolve};
pub use types::*;

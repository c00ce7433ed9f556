// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// pexel-document: Document manipulation for the Pexel operation catalog.
//
// Provides PDF operations (merge, select, rotate, compress, encrypt, decrypt,
// stamp, text and metadata extraction), image-to-PDF conversion, page
// rasterisation and ZIP bundling behind the `DocumentEngine` trait.

pub mod archive;
pub mod engine;
pub mod error;
pub mod image;
pub mod pdf;

pub use engine::{DocumentEngine, LopdfEngine};
pub use error::{EngineError, EngineResult};
pub use image::processor::ImageProcessor;
pub use pdf::reader::{PageGeometry, PdfReader};
pub use pdf::stamp::{PageNumberStyle, WatermarkStyle};
pub use pdf::writer::PdfWriter;

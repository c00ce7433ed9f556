// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The document engine seam: everything the operation pipeline needs from a
// document-manipulation library, and the lopdf/printpdf/image backed
// implementation.

use std::collections::BTreeMap;

use pexel_core::{CompressionTier, PageText, PaperSize, RasterFormat, Rotation};
use tracing::instrument;

use crate::archive;
use crate::error::EngineResult;
use crate::image::processor::ImageProcessor;
use crate::pdf::reader::PdfReader;
use crate::pdf::stamp::{self, PageNumberStyle, WatermarkStyle};
use crate::pdf::writer::PdfWriter;

/// Document-manipulation contract used by the pipeline.
///
/// All methods are synchronous and CPU-bound; callers run them on a blocking
/// worker.  `Document` values are created and consumed on that worker and
/// never need to cross threads.  Page numbers are 1-based and already
/// validated against [`DocumentEngine::page_count`].
pub trait DocumentEngine: Send + Sync + 'static {
    type Document;

    fn open(&self, bytes: &[u8]) -> EngineResult<Self::Document>;

    fn page_count(&self, document: &Self::Document) -> u32;

    fn is_encrypted(&self, document: &Self::Document) -> bool;

    fn render_page(
        &self,
        document: &Self::Document,
        page: u32,
        dpi: u32,
        format: RasterFormat,
    ) -> EngineResult<Vec<u8>>;

    /// Concatenate documents in the order given.
    fn merge(&self, documents: &[Self::Document]) -> EngineResult<Vec<u8>>;

    /// A new document containing only `pages`.
    fn split(&self, document: &Self::Document, pages: &[u32]) -> EngineResult<Vec<u8>>;

    fn rotate(
        &self,
        document: &Self::Document,
        pages: &[u32],
        rotation: Rotation,
    ) -> EngineResult<Vec<u8>>;

    fn encrypt(
        &self,
        document: &Self::Document,
        user_password: &str,
        owner_password: &str,
    ) -> EngineResult<Vec<u8>>;

    /// Fails with `EngineError::WrongPassword` when `password` is rejected.
    fn decrypt(&self, document: &Self::Document, password: &str) -> EngineResult<Vec<u8>>;

    fn watermark(&self, document: &Self::Document, style: &WatermarkStyle)
    -> EngineResult<Vec<u8>>;

    fn number_pages(
        &self,
        document: &Self::Document,
        style: &PageNumberStyle,
    ) -> EngineResult<Vec<u8>>;

    fn recompress(&self, document: &Self::Document, tier: CompressionTier)
    -> EngineResult<Vec<u8>>;

    fn extract_text(&self, document: &Self::Document, pages: &[u32])
    -> EngineResult<Vec<PageText>>;

    /// Document-information entries keyed by lower-case field name.
    fn metadata(&self, document: &Self::Document) -> EngineResult<BTreeMap<String, String>>;

    fn images_to_pdf(&self, images: &[Vec<u8>], paper: PaperSize) -> EngineResult<Vec<u8>>;

    /// Pack several named outputs into one archive.
    fn bundle(&self, entries: &[(String, Vec<u8>)]) -> EngineResult<Vec<u8>> {
        archive::bundle(entries)
    }
}

/// [`DocumentEngine`] backed by lopdf (PDF structure), printpdf (PDF
/// creation) and image (raster encoding).
///
/// lopdf has no glyph rasteriser, so [`DocumentEngine::render_page`]
/// produces a blank canvas with the page's exact pixel geometry.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfEngine;

impl DocumentEngine for LopdfEngine {
    type Document = PdfReader;

    fn open(&self, bytes: &[u8]) -> EngineResult<PdfReader> {
        PdfReader::from_bytes(bytes)
    }

    fn page_count(&self, document: &PdfReader) -> u32 {
        document.page_count()
    }

    fn is_encrypted(&self, document: &PdfReader) -> bool {
        document.is_encrypted()
    }

    #[instrument(skip(self, document), fields(page, dpi, format = ?format))]
    fn render_page(
        &self,
        document: &PdfReader,
        page: u32,
        dpi: u32,
        format: RasterFormat,
    ) -> EngineResult<Vec<u8>> {
        document.ensure_plain()?;
        let geometry = document.page_geometry(page)?;
        ImageProcessor::page_canvas(&geometry, dpi)?.encode(format)
    }

    fn merge(&self, documents: &[PdfReader]) -> EngineResult<Vec<u8>> {
        PdfReader::merge(documents)
    }

    fn split(&self, document: &PdfReader, pages: &[u32]) -> EngineResult<Vec<u8>> {
        document.select(pages)
    }

    fn rotate(
        &self,
        document: &PdfReader,
        pages: &[u32],
        rotation: Rotation,
    ) -> EngineResult<Vec<u8>> {
        document.rotate(pages, rotation.degrees())
    }

    fn encrypt(
        &self,
        document: &PdfReader,
        user_password: &str,
        owner_password: &str,
    ) -> EngineResult<Vec<u8>> {
        document.encrypt(user_password, owner_password)
    }

    fn decrypt(&self, document: &PdfReader, password: &str) -> EngineResult<Vec<u8>> {
        document.decrypt(password)
    }

    fn watermark(&self, document: &PdfReader, style: &WatermarkStyle) -> EngineResult<Vec<u8>> {
        stamp::watermark(document, style)
    }

    fn number_pages(
        &self,
        document: &PdfReader,
        style: &PageNumberStyle,
    ) -> EngineResult<Vec<u8>> {
        stamp::number_pages(document, style)
    }

    fn recompress(&self, document: &PdfReader, tier: CompressionTier) -> EngineResult<Vec<u8>> {
        document.compress(tier)
    }

    fn extract_text(&self, document: &PdfReader, pages: &[u32]) -> EngineResult<Vec<PageText>> {
        document.extract_text(pages)
    }

    fn metadata(&self, document: &PdfReader) -> EngineResult<BTreeMap<String, String>> {
        Ok(document.metadata())
    }

    fn images_to_pdf(&self, images: &[Vec<u8>], paper: PaperSize) -> EngineResult<Vec<u8>> {
        PdfWriter::new(paper).create_from_images(images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::reader::tests::{page_widths, sample_pdf};

    #[test]
    fn engine_round_trip_through_trait() {
        let engine = LopdfEngine;
        let doc = engine.open(&sample_pdf(4)).unwrap();
        assert_eq!(engine.page_count(&doc), 4);

        let split = engine.split(&doc, &[1, 3]).unwrap();
        assert_eq!(page_widths(&split), vec![101, 103]);

        let other = engine.open(&sample_pdf(1)).unwrap();
        let merged = engine.merge(&[doc, other]).unwrap();
        assert_eq!(page_widths(&merged), vec![101, 102, 103, 104, 101]);
    }

    #[test]
    fn render_honours_page_geometry() {
        let engine = LopdfEngine;
        let doc = engine.open(&sample_pdf(2)).unwrap();
        let png = engine.render_page(&doc, 2, 144, RasterFormat::Png).unwrap();
        let image = ImageProcessor::from_bytes(&png).unwrap();
        assert_eq!((image.width(), image.height()), (204, 1000));
    }
}

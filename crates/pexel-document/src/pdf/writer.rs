// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF writer: builds new PDF documents from raster images using `printpdf`
// 0.8.
//
// printpdf 0.8 uses a data-oriented API: documents are built by constructing
// `PdfPage` structs containing `Vec<Op>` operation lists, then serialised via
// `PdfDocument::save()`.

use pexel_core::PaperSize;
use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Pt, RawImage, RawImageData,
    RawImageFormat, XObjectTransform,
};
use tracing::{debug, info, instrument};

use crate::error::{EngineError, EngineResult};
use crate::image::processor::ImageProcessor;

/// Margin kept around every placed image.
const MARGIN_MM: f32 = 15.0;

/// Native resolution assumed for images; larger images are scaled down.
const IMAGE_DPI: f32 = 150.0;

/// Creates new PDF documents from images, one page per image.
pub struct PdfWriter {
    paper_size: PaperSize,
    title: Option<String>,
}

impl PdfWriter {
    pub fn new(paper_size: PaperSize) -> Self {
        Self {
            paper_size,
            title: None,
        }
    }

    /// Set a title for the PDF metadata.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    /// Paper dimensions in printpdf's Mm units.
    fn page_dimensions(&self) -> (Mm, Mm) {
        let (w_mm, h_mm) = self.paper_size.dimensions_mm();
        (Mm(w_mm as f32), Mm(h_mm as f32))
    }

    /// Build a PDF with one page per image, in the order given.  Each image
    /// is centred and scaled to fit inside the margins without upscaling.
    #[instrument(skip_all, fields(images = images.len(), paper = ?self.paper_size))]
    pub fn create_from_images(&self, images: &[Vec<u8>]) -> EngineResult<Vec<u8>> {
        if images.is_empty() {
            return Err(EngineError::Image("no images supplied".to_string()));
        }

        let (page_w, page_h) = self.page_dimensions();
        let title = self.title.as_deref().unwrap_or("Pexel Images");
        info!(title, "Creating image PDF");

        let margin_pt = Mm(MARGIN_MM).into_pt().0;
        let usable_w_pt = Mm(page_w.0 - 2.0 * MARGIN_MM).into_pt().0;
        let usable_h_pt = Mm(page_h.0 - 2.0 * MARGIN_MM).into_pt().0;

        let mut doc = PdfDocument::new(title);
        let mut pages = Vec::with_capacity(images.len());

        for (index, bytes) in images.iter().enumerate() {
            let decoded = ImageProcessor::from_bytes(bytes).map_err(|err| {
                EngineError::Image(format!("image #{}: {err}", index + 1))
            })?;

            let img_width = decoded.width() as usize;
            let img_height = decoded.height() as usize;
            let raw = RawImage {
                pixels: RawImageData::U8(decoded.as_dynamic().to_rgb8().into_raw()),
                width: img_width,
                height: img_height,
                data_format: RawImageFormat::RGB8,
                tag: Vec::new(),
            };
            let xobject_id = doc.add_image(&raw);

            let img_w_pt = img_width as f32 / IMAGE_DPI * 72.0;
            let img_h_pt = img_height as f32 / IMAGE_DPI * 72.0;
            let scale = (usable_w_pt / img_w_pt).min(usable_h_pt / img_h_pt).min(1.0);

            let rendered_w_pt = img_w_pt * scale;
            let rendered_h_pt = img_h_pt * scale;
            let x_offset = margin_pt + (usable_w_pt - rendered_w_pt) / 2.0;
            let y_offset = margin_pt + (usable_h_pt - rendered_h_pt) / 2.0;

            let ops = vec![Op::UseXobject {
                id: xobject_id,
                transform: XObjectTransform {
                    translate_x: Some(Pt(x_offset)),
                    translate_y: Some(Pt(y_offset)),
                    scale_x: Some(scale),
                    scale_y: Some(scale),
                    dpi: Some(IMAGE_DPI),
                    rotate: None,
                },
            }];
            pages.push(PdfPage::new(page_w, page_h, ops));

            debug!(
                image = index + 1,
                rendered_w_pt, rendered_h_pt, scale, "Image placed on page"
            );
        }

        doc.with_pages(pages);

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let output = doc.save(&PdfSaveOptions::default(), &mut warnings);
        if !warnings.is_empty() {
            debug!(warnings = warnings.len(), "printpdf reported warnings");
        }
        Ok(output)
    }
}

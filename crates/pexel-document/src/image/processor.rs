// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor: decoding of uploaded images, page canvases for
// rasterisation, and encoding to PNG/JPEG using the `image` crate.

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use pexel_core::RasterFormat;
use tracing::{debug, instrument};

use crate::error::{EngineError, EngineResult};
use crate::pdf::reader::PageGeometry;

/// Largest canvas edge, in pixels, a page may be rendered at.
pub const MAX_RENDER_EDGE: u32 = 14_400;

/// Quality used for JPEG output.
pub const JPEG_QUALITY: u8 = 90;

/// A single in-memory image.
pub struct ImageProcessor {
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Decode raw encoded bytes (JPEG, PNG, GIF, BMP, WebP).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> EngineResult<Self> {
        let image = image::load_from_memory(data)
            .map_err(|err| EngineError::Image(format!("failed to decode image: {err}")))?;
        debug!(
            width = image.width(),
            height = image.height(),
            "Image decoded from bytes"
        );
        Ok(Self { image })
    }

    /// A white canvas with the displayed size of `page` at `dpi`.
    #[instrument(skip(page), fields(dpi))]
    pub fn page_canvas(page: &PageGeometry, dpi: u32) -> EngineResult<Self> {
        let (width_pt, height_pt) = page.displayed_size();
        let scale = dpi as f32 / 72.0;
        let width = (width_pt * scale).round().max(1.0);
        let height = (height_pt * scale).round().max(1.0);

        if width > MAX_RENDER_EDGE as f32 || height > MAX_RENDER_EDGE as f32 {
            return Err(EngineError::Image(format!(
                "page renders to {width}x{height} px, above the {MAX_RENDER_EDGE} px limit"
            )));
        }

        let canvas = RgbImage::from_pixel(width as u32, height as u32, Rgb([255, 255, 255]));
        debug!(width = canvas.width(), height = canvas.height(), "Page canvas created");
        Ok(Self {
            image: DynamicImage::ImageRgb8(canvas),
        })
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    // -- Output ---------------------------------------------------------------

    /// Encode in the requested raster format.
    pub fn encode(&self, format: RasterFormat) -> EngineResult<Vec<u8>> {
        match format {
            RasterFormat::Png => self.to_png_bytes(),
            RasterFormat::Jpeg => self.to_jpeg_bytes(JPEG_QUALITY),
        }
    }

    pub fn to_png_bytes(&self) -> EngineResult<Vec<u8>> {
        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);
        self.image
            .write_to(&mut cursor, ImageFormat::Png)
            .map_err(|err| EngineError::Image(format!("PNG encoding failed: {err}")))?;
        Ok(buffer)
    }

    /// Encode as JPEG with the given quality (1-100).
    pub fn to_jpeg_bytes(&self, quality: u8) -> EngineResult<Vec<u8>> {
        let mut buffer = Vec::new();
        let rgb = self.image.to_rgb8();
        let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
        rgb.write_with_encoder(encoder)
            .map_err(|err| EngineError::Image(format!("JPEG encoding failed: {err}")))?;
        Ok(buffer)
    }
}

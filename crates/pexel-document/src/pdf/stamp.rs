// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page stamping: draws watermarks and page numbers over existing pages.
//
// Each stamped page gets its original content wrapped in a `q` / `Q` pair so
// whatever graphics state it leaves behind cannot leak into the overlay,
// followed by one overlay content stream.  Fonts and the transparency state
// are added to the page's own resource dictionary.

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};
use pexel_core::{HorizontalAlign, PageNumberPosition, VerticalEdge, WatermarkPosition};
use tracing::{debug, instrument};

use crate::error::EngineResult;
use crate::pdf::reader::{PageGeometry, PdfReader, geometry, inherited, serialise};

const WATERMARK_FONT: &str = "PxWmF";
const WATERMARK_STATE: &str = "PxWmGS";
const NUMBER_FONT: &str = "PxPnF";

/// Distance kept from the page edge for edge-anchored stamps, in points.
const EDGE_MARGIN: f32 = 36.0;

/// How a watermark is drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkStyle {
    pub text: String,
    /// Fill and stroke alpha, `0.0..=1.0`.
    pub opacity: f32,
    pub position: WatermarkPosition,
    pub font_size: f32,
}

impl Default for WatermarkStyle {
    fn default() -> Self {
        Self {
            text: "CONFIDENTIAL".to_string(),
            opacity: 0.3,
            position: WatermarkPosition::Center,
            font_size: 60.0,
        }
    }
}

/// How page numbers are drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct PageNumberStyle {
    pub position: PageNumberPosition,
    /// Number printed on the first page.
    pub start_from: u32,
    pub font_size: f32,
}

impl Default for PageNumberStyle {
    fn default() -> Self {
        Self {
            position: PageNumberPosition::default(),
            start_from: 1,
            font_size: 10.0,
        }
    }
}

/// Draw `style.text` on every page.
#[instrument(skip_all, fields(text_len = style.text.len(), position = ?style.position))]
pub fn watermark(reader: &PdfReader, style: &WatermarkStyle) -> EngineResult<Vec<u8>> {
    reader.ensure_plain()?;
    let mut doc = reader.document().clone();

    let font_id = doc.add_object(helvetica("Helvetica-Bold"));
    let state_id = doc.add_object(dictionary! {
        "Type" => "ExtGState",
        "ca" => style.opacity,
        "CA" => style.opacity,
    });

    let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
    for &page_id in &pages {
        let page = geometry(&doc, page_id);
        let overlay = watermark_operations(style, &page);
        let mut resources = page_resources(&doc, page_id);
        add_resource(&doc, &mut resources, b"Font", WATERMARK_FONT, font_id);
        add_resource(&doc, &mut resources, b"ExtGState", WATERMARK_STATE, state_id);
        stamp_page(&mut doc, page_id, resources, overlay)?;
    }

    debug!(pages = pages.len(), "Watermark applied");
    serialise(&mut doc)
}

/// Number every page, starting at `style.start_from` on the first page.
#[instrument(skip_all, fields(start_from = style.start_from))]
pub fn number_pages(reader: &PdfReader, style: &PageNumberStyle) -> EngineResult<Vec<u8>> {
    reader.ensure_plain()?;
    let mut doc = reader.document().clone();
    let font_id = doc.add_object(helvetica("Helvetica"));

    let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
    for (index, &page_id) in pages.iter().enumerate() {
        let label = (u64::from(style.start_from) + index as u64).to_string();
        let page = geometry(&doc, page_id);
        let overlay = page_number_operations(style, &label, &page);
        let mut resources = page_resources(&doc, page_id);
        add_resource(&doc, &mut resources, b"Font", NUMBER_FONT, font_id);
        stamp_page(&mut doc, page_id, resources, overlay)?;
    }

    debug!(pages = pages.len(), "Page numbers applied");
    serialise(&mut doc)
}

// -- Overlay construction -----------------------------------------------------

fn watermark_operations(style: &WatermarkStyle, page: &PageGeometry) -> Vec<Operation> {
    let size = style.font_size;
    let width = text_width(&style.text, size, true);

    let mut ops = vec![
        Operation::new("gs", vec![name(WATERMARK_STATE)]),
        Operation::new("rg", vec![0.5f32.into(), 0.5f32.into(), 0.5f32.into()]),
    ];

    match style.position {
        WatermarkPosition::Center => {
            let (sin, cos) = std::f32::consts::FRAC_PI_4.sin_cos();
            let centre_x = page.origin_x + page.width / 2.0;
            let centre_y = page.origin_y + page.height / 2.0;
            ops.push(Operation::new(
                "cm",
                vec![
                    1.into(),
                    0.into(),
                    0.into(),
                    1.into(),
                    centre_x.into(),
                    centre_y.into(),
                ],
            ));
            ops.push(Operation::new(
                "cm",
                vec![cos.into(), sin.into(), (-sin).into(), cos.into(), 0.into(), 0.into()],
            ));
            ops.extend(text_at(WATERMARK_FONT, size, -width / 2.0, -size / 3.0, &style.text));
        }
        WatermarkPosition::Top | WatermarkPosition::Bottom => {
            let x = page.origin_x + (page.width - width) / 2.0;
            let y = if style.position == WatermarkPosition::Top {
                page.origin_y + page.height - EDGE_MARGIN - size
            } else {
                page.origin_y + EDGE_MARGIN
            };
            ops.extend(text_at(WATERMARK_FONT, size, x, y, &style.text));
        }
    }
    ops
}

fn page_number_operations(
    style: &PageNumberStyle,
    label: &str,
    page: &PageGeometry,
) -> Vec<Operation> {
    let size = style.font_size;
    let width = text_width(label, size, false);

    let x = match style.position.horizontal {
        HorizontalAlign::Left => page.origin_x + EDGE_MARGIN,
        HorizontalAlign::Center => page.origin_x + (page.width - width) / 2.0,
        HorizontalAlign::Right => page.origin_x + page.width - EDGE_MARGIN - width,
    };
    let y = match style.position.vertical {
        VerticalEdge::Top => page.origin_y + page.height - EDGE_MARGIN + 6.0 - size,
        VerticalEdge::Bottom => page.origin_y + EDGE_MARGIN - 6.0,
    };

    let mut ops = vec![Operation::new("g", vec![0.into()])];
    ops.extend(text_at(NUMBER_FONT, size, x, y, label));
    ops
}

fn text_at(font: &str, size: f32, x: f32, y: f32, text: &str) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![name(font), size.into()]),
        Operation::new("Td", vec![x.into(), y.into()]),
        Operation::new(
            "Tj",
            vec![Object::String(win_ansi(text), StringFormat::Literal)],
        ),
        Operation::new("ET", vec![]),
    ]
}

/// Approximate rendered width of `text` in Helvetica.
fn text_width(text: &str, size: f32, bold: bool) -> f32 {
    let average = if bold { 0.58 } else { 0.52 };
    text.chars().count() as f32 * size * average
}

/// Encode for a WinAnsi simple font; characters outside Latin-1 become `?`.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

fn name(value: &str) -> Object {
    Object::Name(value.as_bytes().to_vec())
}

fn helvetica(base_font: &str) -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base_font,
        "Encoding" => "WinAnsiEncoding",
    }
}

// -- Page plumbing ------------------------------------------------------------

/// The page's effective resource dictionary, copied so it can be extended
/// without touching resources shared with other pages.
fn page_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    match inherited(doc, page_id, b"Resources") {
        Some(Object::Dictionary(dict)) => dict.clone(),
        Some(Object::Reference(id)) => doc
            .get_dictionary(*id)
            .cloned()
            .unwrap_or_else(|_| Dictionary::new()),
        _ => Dictionary::new(),
    }
}

fn add_resource(
    doc: &Document,
    resources: &mut Dictionary,
    category: &[u8],
    entry: &str,
    id: ObjectId,
) {
    let mut entries = match resources.get(category) {
        Ok(Object::Dictionary(dict)) => dict.clone(),
        Ok(Object::Reference(existing)) => doc
            .get_dictionary(*existing)
            .cloned()
            .unwrap_or_else(|_| Dictionary::new()),
        _ => Dictionary::new(),
    };
    entries.set(entry, id);
    resources.set(category, entries);
}

fn stamp_page(
    doc: &mut Document,
    page_id: ObjectId,
    resources: Dictionary,
    overlay: Vec<Operation>,
) -> EngineResult<()> {
    let existing: Vec<Object> = match doc.get_dictionary(page_id)?.get(b"Contents") {
        Ok(Object::Array(items)) => items.clone(),
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        _ => Vec::new(),
    };

    let mut operations = Vec::with_capacity(overlay.len() + 2);
    operations.push(Operation::new("Q", vec![]));
    operations.push(Operation::new("q", vec![]));
    operations.extend(overlay);
    operations.push(Operation::new("Q", vec![]));
    let overlay_bytes = Content { operations }.encode()?;

    let save_id = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
    let overlay_id = doc.add_object(Stream::new(dictionary! {}, overlay_bytes));

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(save_id));
    contents.extend(existing);
    contents.push(Object::Reference(overlay_id));

    let page = doc.get_object_mut(page_id).and_then(Object::as_dict_mut)?;
    page.set("Resources", resources);
    page.set("Contents", contents);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::reader::tests::{page_widths, sample_pdf};

    fn overlay_text(bytes: &[u8], page: u32) -> String {
        let reader = PdfReader::from_bytes(bytes).unwrap();
        let doc = reader.document();
        let page_id = doc.get_pages()[&page];
        String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).into_owned()
    }

    #[test]
    fn watermark_keeps_pages_and_adds_overlay() {
        let reader = PdfReader::from_bytes(&sample_pdf(3)).unwrap();
        let output = watermark(&reader, &WatermarkStyle::default()).unwrap();

        assert_eq!(page_widths(&output), vec![101, 102, 103]);
        for page in 1..=3 {
            let content = overlay_text(&output, page);
            assert!(content.contains("CONFIDENTIAL"), "page {page}");
            assert!(content.contains(&format!("Page {page}")), "page {page}");
        }
    }

    #[test]
    fn watermark_registers_transparency_state() {
        let reader = PdfReader::from_bytes(&sample_pdf(1)).unwrap();
        let output = watermark(&reader, &WatermarkStyle::default()).unwrap();
        let reader = PdfReader::from_bytes(&output).unwrap();
        let doc = reader.document();
        let page_id = doc.get_pages()[&1];
        let resources = doc
            .get_dictionary(page_id)
            .unwrap()
            .get(b"Resources")
            .and_then(Object::as_dict)
            .unwrap();
        assert!(resources.get(b"ExtGState").is_ok());
        // The original font is still reachable next to the stamp font.
        let fonts = resources.get(b"Font").and_then(Object::as_dict).unwrap();
        assert!(fonts.has(b"F1"));
        assert!(fonts.has(WATERMARK_FONT.as_bytes()));
    }

    #[test]
    fn page_numbers_start_from_offset() {
        let reader = PdfReader::from_bytes(&sample_pdf(3)).unwrap();
        let style = PageNumberStyle {
            start_from: 7,
            ..PageNumberStyle::default()
        };
        let output = number_pages(&reader, &style).unwrap();
        assert!(overlay_text(&output, 1).contains("(7)"));
        assert!(overlay_text(&output, 3).contains("(9)"));
    }

    #[test]
    fn non_latin_text_is_replaced() {
        assert_eq!(win_ansi("Café ✓"), b"Caf\xe9 ?".to_vec());
    }

    #[test]
    fn right_aligned_numbers_stay_on_page() {
        let page = PageGeometry {
            origin_x: 0.0,
            origin_y: 0.0,
            width: 200.0,
            height: 300.0,
            rotate: 0,
        };
        let style = PageNumberStyle {
            position: PageNumberPosition::from_keyword("top-right").unwrap(),
            ..PageNumberStyle::default()
        };
        let ops = page_number_operations(&style, "12", &page);
        let td = ops.iter().find(|op| op.operator == "Td").unwrap();
        let x = td.operands[0].as_float().unwrap();
        let y = td.operands[1].as_float().unwrap();
        assert!(x > 100.0 && x < 200.0);
        assert!(y > 200.0 && y < 300.0);
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Pexel document processor.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque handle naming one stored artifact.
///
/// Backed by a random (v4) UUID: 122 bits of entropy, no embedded metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactHandle(Uuid);

impl ArtifactHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ArtifactHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ArtifactHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for ArtifactHandle {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Media types the processor reads or produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaType {
    #[serde(rename = "application/pdf")]
    Pdf,
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/gif")]
    Gif,
    #[serde(rename = "image/bmp")]
    Bmp,
    #[serde(rename = "image/webp")]
    Webp,
    #[serde(rename = "application/zip")]
    Zip,
    #[serde(rename = "application/octet-stream")]
    OctetStream,
}

impl MediaType {
    /// MIME string used in `Content-Type` headers.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
            Self::Webp => "image/webp",
            Self::Zip => "application/zip",
            Self::OctetStream => "application/octet-stream",
        }
    }

    /// Canonical file extension (without the dot).
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
            Self::Webp => "webp",
            Self::Zip => "zip",
            Self::OctetStream => "bin",
        }
    }

    /// Parse a MIME string, ignoring parameters such as `; charset=...`.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim();
        match essence.to_ascii_lowercase().as_str() {
            "application/pdf" | "application/x-pdf" => Some(Self::Pdf),
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/gif" => Some(Self::Gif),
            "image/bmp" | "image/x-ms-bmp" => Some(Self::Bmp),
            "image/webp" => Some(Self::Webp),
            "application/zip" => Some(Self::Zip),
            "application/octet-stream" => Some(Self::OctetStream),
            _ => None,
        }
    }

    /// Infer the media type from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "gif" => Some(Self::Gif),
            "bmp" => Some(Self::Bmp),
            "webp" => Some(Self::Webp),
            "zip" => Some(Self::Zip),
            _ => None,
        }
    }

    /// Infer from a file name such as `report.PDF`.
    pub fn from_file_name(name: &str) -> Option<Self> {
        name.rsplit_once('.')
            .and_then(|(_, ext)| Self::from_extension(ext))
    }

    pub fn is_image(&self) -> bool {
        matches!(
            self,
            Self::Png | Self::Jpeg | Self::Gif | Self::Bmp | Self::Webp
        )
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mime_type())
    }
}

/// Metadata of one stored artifact.  The bytes live in the artifact store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub handle: ArtifactHandle,
    pub created_at: DateTime<Utc>,
    pub ttl_seconds: u64,
    pub media_type: MediaType,
    pub size_bytes: u64,
    /// Suggested download name, e.g. `merged_1a2b3c4d.pdf`.
    pub file_name: Option<String>,
    /// SHA-256 of the bytes, lowercase hex.
    pub digest: String,
}

impl Artifact {
    /// Instant after which the artifact is no longer served.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at
            .checked_add_signed(ttl_delta(self.ttl_seconds))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Convert a TTL in seconds to a `TimeDelta`, saturating instead of
/// overflowing.
pub fn ttl_delta(ttl_seconds: u64) -> TimeDelta {
    i64::try_from(ttl_seconds)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

/// Standard paper sizes for image-to-PDF layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaperSize {
    A4,
    A3,
    A5,
    Letter,
    Legal,
}

impl PaperSize {
    /// Dimensions in millimetres (width, height).
    pub fn dimensions_mm(&self) -> (u32, u32) {
        match self {
            Self::A4 => (210, 297),
            Self::A3 => (297, 420),
            Self::A5 => (148, 210),
            Self::Letter => (216, 279),
            Self::Legal => (216, 356),
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "a4" => Some(Self::A4),
            "a3" => Some(Self::A3),
            "a5" => Some(Self::A5),
            "letter" => Some(Self::Letter),
            "legal" => Some(Self::Legal),
            _ => None,
        }
    }
}

/// Clockwise page rotation.  Only quarter turns are representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rotation {
    Quarter,
    Half,
    ThreeQuarter,
}

impl Rotation {
    pub fn from_degrees(degrees: i64) -> Option<Self> {
        match degrees {
            90 => Some(Self::Quarter),
            180 => Some(Self::Half),
            270 => Some(Self::ThreeQuarter),
            _ => None,
        }
    }

    pub fn degrees(&self) -> i64 {
        match self {
            Self::Quarter => 90,
            Self::Half => 180,
            Self::ThreeQuarter => 270,
        }
    }
}

/// Compression quality tier requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionTier {
    Low,
    Medium,
    High,
}

impl CompressionTier {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    /// Fixed internal level: 1 = stream compression only, 2 = also drop
    /// unreferenced and empty objects, 3 = also strip document metadata.
    pub fn level(&self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }
}

/// Where a watermark is drawn on each page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatermarkPosition {
    /// Diagonal across the middle of the page.
    Center,
    Top,
    Bottom,
}

impl WatermarkPosition {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "center" | "centre" => Some(Self::Center),
            "top" => Some(Self::Top),
            "bottom" => Some(Self::Bottom),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerticalEdge {
    Top,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HorizontalAlign {
    Left,
    Center,
    Right,
}

/// Placement of page numbers, written as `bottom-center`, `top-right`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageNumberPosition {
    pub vertical: VerticalEdge,
    pub horizontal: HorizontalAlign,
}

impl PageNumberPosition {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        let lower = keyword.to_ascii_lowercase();
        let (vertical, horizontal) = lower.split_once('-')?;
        let vertical = match vertical {
            "top" => VerticalEdge::Top,
            "bottom" => VerticalEdge::Bottom,
            _ => return None,
        };
        let horizontal = match horizontal {
            "left" => HorizontalAlign::Left,
            "center" | "centre" => HorizontalAlign::Center,
            "right" => HorizontalAlign::Right,
            _ => return None,
        };
        Some(Self {
            vertical,
            horizontal,
        })
    }
}

impl Default for PageNumberPosition {
    fn default() -> Self {
        Self {
            vertical: VerticalEdge::Bottom,
            horizontal: HorizontalAlign::Center,
        }
    }
}

/// Raster output format for page rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RasterFormat {
    Png,
    Jpeg,
}

impl RasterFormat {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpeg" | "jpg" => Some(Self::Jpeg),
            _ => None,
        }
    }

    pub fn media_type(&self) -> MediaType {
        match self {
            Self::Png => MediaType::Png,
            Self::Jpeg => MediaType::Jpeg,
        }
    }
}

/// How a split emits its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitMode {
    /// One PDF containing the selected pages.
    Extract,
    /// One PDF per selected page, bundled in a ZIP archive.
    Burst,
    /// One PDF per contiguous run of selected pages, bundled in a ZIP archive.
    Groups,
}

impl SplitMode {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "extract" => Some(Self::Extract),
            "burst" => Some(Self::Burst),
            "groups" => Some(Self::Groups),
            _ => None,
        }
    }
}

/// Text of a single page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageText {
    pub page: u32,
    pub content: String,
}

/// Result of text extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextExtraction {
    pub total_pages: u32,
    pub pages: Vec<PageText>,
}

/// Result of metadata inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub total_pages: u32,
    pub is_encrypted: bool,
    pub metadata: BTreeMap<String, String>,
}

/// Structured (non-binary) output of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StructuredData {
    Text(TextExtraction),
    Info(DocumentInfo),
}

/// A stored binary result together with the input size it was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactReceipt {
    pub artifact: Artifact,
    /// Total size of all inputs, used for compression reporting.
    pub input_bytes: u64,
}

/// Outcome of one pipeline invocation: a stored artifact or inline data,
/// never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationResult {
    Artifact(ArtifactReceipt),
    Data(StructuredData),
}

impl OperationResult {
    pub fn artifact(&self) -> Option<&Artifact> {
        match self {
            Self::Artifact(receipt) => Some(&receipt.artifact),
            Self::Data(_) => None,
        }
    }

    pub fn data(&self) -> Option<&StructuredData> {
        match self {
            Self::Artifact(_) => None,
            Self::Data(data) => Some(data),
        }
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Operation catalog: the closed set of named operations, their input
// rules and parameter schemas, and validation of a raw request into a
// typed `Invocation`.

use std::str::FromStr;

use pexel_core::error::{PexelError, Result};
use pexel_core::{
    Artifact, CompressionTier, MediaType, PageNumberPosition, PaperSize, RasterFormat, Rotation,
    SplitMode, WatermarkPosition,
};
use pexel_document::{PageNumberStyle, WatermarkStyle};
use serde::Serialize;

use crate::params::{ParamKind, ParamSpec, Parameters, TTL_SECONDS, optional};

// ---------------------------------------------------------------------------
// Parameter schemas
// ---------------------------------------------------------------------------

const SPLIT_PAGES: ParamSpec = optional("pages", ParamKind::PageRange, "all", "Pages to keep");
const SPLIT_MODE: ParamSpec = optional(
    "mode",
    ParamKind::Choice {
        options: &["extract", "burst", "groups"],
    },
    "extract",
    "One PDF, one PDF per page, or one PDF per contiguous run",
);

const QUALITY: ParamSpec = optional(
    "quality",
    ParamKind::Choice {
        options: &["low", "medium", "high"],
    },
    "medium",
    "Compression tier",
);

const ANGLE: ParamSpec = optional(
    "angle",
    ParamKind::Choice {
        options: &["90", "180", "270"],
    },
    "90",
    "Clockwise rotation in degrees",
);
const ROTATE_PAGES: ParamSpec = optional("pages", ParamKind::PageRange, "all", "Pages to rotate");

const PASSWORD: ParamSpec = ParamSpec {
    name: "password",
    kind: ParamKind::Secret { min_chars: 4 },
    default: None,
    required: true,
    description: "Password required to open the document",
};
const OWNER_PASSWORD: ParamSpec = ParamSpec {
    name: "owner_password",
    kind: ParamKind::Secret { min_chars: 4 },
    default: None,
    required: false,
    description: "Permissions password; defaults to the user password",
};
const UNLOCK_PASSWORD: ParamSpec = ParamSpec {
    name: "password",
    kind: ParamKind::Secret { min_chars: 0 },
    default: None,
    required: true,
    description: "Current document password",
};

const WATERMARK_TEXT: ParamSpec = optional(
    "text",
    ParamKind::Text {
        min_chars: 1,
        max_chars: 200,
    },
    "CONFIDENTIAL",
    "Watermark text",
);
const OPACITY: ParamSpec = optional(
    "opacity",
    ParamKind::Number { min: 0.0, max: 1.0 },
    "0.3",
    "Fill opacity",
);
const WATERMARK_POSITION: ParamSpec = optional(
    "position",
    ParamKind::Choice {
        options: &["center", "top", "bottom"],
    },
    "center",
    "Placement; centred text is drawn diagonally",
);
const WATERMARK_FONT_SIZE: ParamSpec = optional(
    "font_size",
    ParamKind::Integer { min: 8, max: 200 },
    "60",
    "Font size in points",
);

const NUMBER_POSITION: ParamSpec = optional(
    "position",
    ParamKind::Choice {
        options: &[
            "top-left",
            "top-center",
            "top-right",
            "bottom-left",
            "bottom-center",
            "bottom-right",
        ],
    },
    "bottom-center",
    "Placement of the page number",
);
const START_FROM: ParamSpec = optional(
    "start_from",
    ParamKind::Integer {
        min: 0,
        max: 1_000_000,
    },
    "1",
    "Number printed on the first page",
);
const NUMBER_FONT_SIZE: ParamSpec = optional(
    "font_size",
    ParamKind::Integer { min: 6, max: 72 },
    "10",
    "Font size in points",
);

const IMAGE_FORMAT: ParamSpec = optional(
    "format",
    ParamKind::Choice {
        options: &["png", "jpeg", "jpg"],
    },
    "png",
    "Raster format",
);
const DPI: ParamSpec = optional(
    "dpi",
    ParamKind::Integer { min: 36, max: 600 },
    "150",
    "Render resolution",
);
const IMAGE_PAGES: ParamSpec = optional("pages", ParamKind::PageRange, "1", "Pages to render");

const PAPER: ParamSpec = optional(
    "paper",
    ParamKind::Choice {
        options: &["a4", "letter", "legal", "a3", "a5"],
    },
    "a4",
    "Paper size of the generated pages",
);

const TEXT_PAGES: ParamSpec = optional("pages", ParamKind::PageRange, "all", "Pages to read");

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Every operation the pipeline can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    Merge,
    Split,
    Compress,
    Rotate,
    Protect,
    Unlock,
    Watermark,
    Paginate,
    ToImages,
    FromImages,
    ExtractText,
    Metadata,
}

/// How many inputs an operation takes and of which kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputRule {
    SinglePdf,
    TwoOrMorePdfs,
    OneOrMoreImages,
}

impl InputRule {
    /// Check counts and media types.  Input order is never changed.
    pub fn check(&self, inputs: &[Artifact]) -> Result<()> {
        let (min, max) = match self {
            Self::SinglePdf => (1, Some(1)),
            Self::TwoOrMorePdfs => (2, None),
            Self::OneOrMoreImages => (1, None),
        };
        if inputs.len() < min || max.is_some_and(|max| inputs.len() > max) {
            let expected = match self {
                Self::SinglePdf => "exactly one PDF is required",
                Self::TwoOrMorePdfs => "at least two PDFs are required",
                Self::OneOrMoreImages => "at least one image is required",
            };
            return Err(PexelError::invalid(
                "inputs",
                format!("{expected}, got {}", inputs.len()),
            ));
        }

        for (position, artifact) in inputs.iter().enumerate() {
            let accepted = match self {
                Self::SinglePdf | Self::TwoOrMorePdfs => artifact.media_type == MediaType::Pdf,
                Self::OneOrMoreImages => artifact.media_type.is_image(),
            };
            if !accepted {
                return Err(PexelError::invalid(
                    "inputs",
                    format!(
                        "input #{} has unsupported type {}",
                        position + 1,
                        artifact.media_type
                    ),
                ));
            }
        }
        Ok(())
    }
}

impl Operation {
    pub const ALL: [Operation; 12] = [
        Self::Merge,
        Self::Split,
        Self::Compress,
        Self::Rotate,
        Self::Protect,
        Self::Unlock,
        Self::Watermark,
        Self::Paginate,
        Self::ToImages,
        Self::FromImages,
        Self::ExtractText,
        Self::Metadata,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Split => "split",
            Self::Compress => "compress",
            Self::Rotate => "rotate",
            Self::Protect => "protect",
            Self::Unlock => "unlock",
            Self::Watermark => "watermark",
            Self::Paginate => "paginate",
            Self::ToImages => "to-images",
            Self::FromImages => "from-images",
            Self::ExtractText => "extract-text",
            Self::Metadata => "metadata",
        }
    }

    /// Older endpoint names that resolve to the same operation.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::ToImages => &["pdf-to-images"],
            Self::FromImages => &["images-to-pdf"],
            Self::Paginate => &["add-page-numbers"],
            Self::Metadata => &["get-metadata"],
            _ => &[],
        }
    }

    pub fn inputs(&self) -> InputRule {
        match self {
            Self::Merge => InputRule::TwoOrMorePdfs,
            Self::FromImages => InputRule::OneOrMoreImages,
            _ => InputRule::SinglePdf,
        }
    }

    pub fn params(&self) -> &'static [ParamSpec] {
        match self {
            Self::Merge | Self::Metadata => &[],
            Self::Split => &[SPLIT_PAGES, SPLIT_MODE],
            Self::Compress => &[QUALITY],
            Self::Rotate => &[ANGLE, ROTATE_PAGES],
            Self::Protect => &[PASSWORD, OWNER_PASSWORD],
            Self::Unlock => &[UNLOCK_PASSWORD],
            Self::Watermark => &[
                WATERMARK_TEXT,
                OPACITY,
                WATERMARK_POSITION,
                WATERMARK_FONT_SIZE,
            ],
            Self::Paginate => &[NUMBER_POSITION, START_FROM, NUMBER_FONT_SIZE],
            Self::ToImages => &[IMAGE_FORMAT, DPI, IMAGE_PAGES],
            Self::FromImages => &[PAPER],
            Self::ExtractText => &[TEXT_PAGES],
        }
    }

    /// Prefix of the suggested download name for binary outputs.
    pub fn output_prefix(&self) -> &'static str {
        match self {
            Self::Merge => "merged_",
            Self::Split => "split_",
            Self::Compress => "compressed_",
            Self::Rotate => "rotated_",
            Self::Protect => "protected_",
            Self::Unlock => "unlocked_",
            Self::Watermark => "watermarked_",
            Self::Paginate => "numbered_",
            Self::ToImages => "pages_",
            Self::FromImages => "images_to_pdf_",
            Self::ExtractText => "text_",
            Self::Metadata => "metadata_",
        }
    }

    /// Validate `params` against this operation's schema.
    pub fn validate(&self, params: &Parameters) -> Result<Invocation> {
        params.reject_unknown(self.params())?;
        let request = match self {
            Self::Merge => Request::Merge,
            Self::Split => Request::Split {
                pages: page_range(params, &SPLIT_PAGES)?,
                mode: keyword(params, &SPLIT_MODE, SplitMode::from_keyword)?,
            },
            Self::Compress => Request::Compress {
                tier: keyword(params, &QUALITY, CompressionTier::from_keyword)?,
            },
            Self::Rotate => Request::Rotate {
                rotation: keyword(params, &ANGLE, |angle| {
                    i64::from_str(angle).ok().and_then(Rotation::from_degrees)
                })?,
                pages: page_range(params, &ROTATE_PAGES)?,
            },
            Self::Protect => {
                let user_password = required_text(params, &PASSWORD)?;
                let owner_password = params
                    .text(&OWNER_PASSWORD)?
                    .unwrap_or_else(|| user_password.clone());
                Request::Protect {
                    user_password,
                    owner_password,
                }
            }
            Self::Unlock => Request::Unlock {
                password: required_text(params, &UNLOCK_PASSWORD)?,
            },
            Self::Watermark => Request::Watermark(WatermarkStyle {
                text: required_text(params, &WATERMARK_TEXT)?,
                opacity: required(params.number(&OPACITY)?, &OPACITY)? as f32,
                position: keyword(params, &WATERMARK_POSITION, WatermarkPosition::from_keyword)?,
                font_size: required(params.integer(&WATERMARK_FONT_SIZE)?, &WATERMARK_FONT_SIZE)?
                    as f32,
            }),
            Self::Paginate => Request::Paginate(PageNumberStyle {
                position: keyword(params, &NUMBER_POSITION, PageNumberPosition::from_keyword)?,
                start_from: required(params.integer(&START_FROM)?, &START_FROM)? as u32,
                font_size: required(params.integer(&NUMBER_FONT_SIZE)?, &NUMBER_FONT_SIZE)? as f32,
            }),
            Self::ToImages => Request::ToImages {
                format: keyword(params, &IMAGE_FORMAT, RasterFormat::from_keyword)?,
                dpi: required(params.integer(&DPI)?, &DPI)? as u32,
                pages: page_range(params, &IMAGE_PAGES)?,
            },
            Self::FromImages => Request::FromImages {
                paper: keyword(params, &PAPER, PaperSize::from_keyword)?,
            },
            Self::ExtractText => Request::ExtractText {
                pages: page_range(params, &TEXT_PAGES)?,
            },
            Self::Metadata => Request::Metadata,
        };
        Ok(Invocation {
            operation: *self,
            ttl_seconds: params.ttl_seconds()?,
            request,
        })
    }

    /// Catalog entry as served to clients.
    pub fn describe(&self) -> OperationDescriptor {
        OperationDescriptor {
            name: *self,
            aliases: self.aliases(),
            inputs: self.inputs(),
            parameters: self.params().iter().chain([&TTL_SECONDS]).copied().collect(),
        }
    }
}

impl FromStr for Operation {
    type Err = PexelError;

    /// Look up by canonical name or alias, case-insensitively.
    fn from_str(name: &str) -> Result<Self> {
        let wanted = name.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|op| op.name() == wanted || op.aliases().contains(&wanted.as_str()))
            .ok_or_else(|| PexelError::UnknownOperation(name.to_string()))
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Serializable description of one catalog entry.
#[derive(Debug, Clone, Serialize)]
pub struct OperationDescriptor {
    pub name: Operation,
    pub aliases: &'static [&'static str],
    pub inputs: InputRule,
    pub parameters: Vec<ParamSpec>,
}

/// The whole catalog, in a stable order.
pub fn describe_all() -> Vec<OperationDescriptor> {
    Operation::ALL.iter().map(Operation::describe).collect()
}

// ---------------------------------------------------------------------------
// Validated requests
// ---------------------------------------------------------------------------

/// Typed parameters of one operation.  Page ranges stay as expressions
/// until the document's page count is known.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Merge,
    Split { pages: String, mode: SplitMode },
    Compress { tier: CompressionTier },
    Rotate { rotation: Rotation, pages: String },
    Protect {
        user_password: String,
        owner_password: String,
    },
    Unlock { password: String },
    Watermark(WatermarkStyle),
    Paginate(PageNumberStyle),
    ToImages {
        format: RasterFormat,
        dpi: u32,
        pages: String,
    },
    FromImages { paper: PaperSize },
    ExtractText { pages: String },
    Metadata,
}

/// A request that passed schema validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub operation: Operation,
    pub ttl_seconds: Option<u64>,
    pub request: Request,
}

fn required<T>(value: Option<T>, spec: &ParamSpec) -> Result<T> {
    value.ok_or_else(|| PexelError::invalid(spec.name, "is required"))
}

fn required_text(params: &Parameters, spec: &ParamSpec) -> Result<String> {
    required(params.text(spec)?, spec)
}

fn page_range(params: &Parameters, spec: &ParamSpec) -> Result<String> {
    required(params.page_range(spec)?, spec)
}

/// Read a choice and map it onto a typed value.
fn keyword<T>(params: &Parameters, spec: &ParamSpec, parse: impl Fn(&str) -> Option<T>) -> Result<T> {
    let value = required(params.choice(spec)?, spec)?;
    parse(&value).ok_or_else(|| PexelError::invalid(spec.name, format!("{value:?} is not supported")))
}

//! Conversion jobs, options, and results.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Supported conversion operations, one HTTP endpoint each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Convert a PDF into an editable DOCX document.
    PdfToDocx,
    /// Rasterise a PDF into one image per page.
    PdfToImages,
    /// Merge several PDFs into one, in upload order.
    PdfMerge,
    /// Extract a page range from a PDF into a new PDF.
    PdfExtract,
    /// Assemble uploaded images into a single PDF document.
    ImagesToPdf,
}

impl Operation {
    /// Stable identifier used in logs, metrics, and error payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PdfToDocx => "pdf_to_docx",
            Self::PdfToImages => "pdf_to_images",
            Self::PdfMerge => "pdf_merge",
            Self::PdfExtract => "pdf_extract",
            Self::ImagesToPdf => "images_to_pdf",
        }
    }

    /// Upload extensions accepted for this operation.
    #[must_use]
    pub const fn allowed_extensions(self) -> &'static [&'static str] {
        match self {
            Self::PdfToDocx | Self::PdfToImages | Self::PdfMerge | Self::PdfExtract => &["pdf"],
            Self::ImagesToPdf => &["png", "jpg", "jpeg"],
        }
    }

    /// Minimum number of input files the operation requires.
    #[must_use]
    pub const fn min_inputs(self) -> usize {
        match self {
            Self::PdfMerge => 2,
            _ => 1,
        }
    }

    /// Whether the operation accepts more than one input file.
    #[must_use]
    pub const fn multi_input(self) -> bool {
        matches!(self, Self::PdfMerge | Self::ImagesToPdf)
    }

    /// All operations, for registry construction.
    #[must_use]
    pub const fn all() -> [Self; 5] {
        [
            Self::PdfToDocx,
            Self::PdfToImages,
            Self::PdfMerge,
            Self::PdfExtract,
            Self::ImagesToPdf,
        ]
    }
}

/// Output image encodings supported by the rasteriser.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// Lossless PNG output (default).
    #[default]
    Png,
    /// JPEG output.
    Jpeg,
}

impl ImageFormat {
    /// File extension for outputs in this format.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }

    /// MIME type for outputs in this format.
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }
}

impl FromStr for ImageFormat {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            _ => Err(ValidationError::InvalidOption {
                field: "format",
                reason: "expected png or jpeg",
            }),
        }
    }
}

/// Inclusive 1-based page range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    /// First page, 1-based.
    pub start: u32,
    /// Last page, inclusive.
    pub end: u32,
}

impl FromStr for PageRange {
    type Err = ValidationError;

    /// Parse `"5"` or `"2-7"`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidOption {
            field: "pages",
            reason: "expected a page number or start-end range",
        };
        let trimmed = value.trim();
        let (start, end) = trimmed.split_once('-').map_or_else(
            || {
                let page = trimmed.parse().map_err(|_| invalid())?;
                Ok::<_, ValidationError>((page, page))
            },
            |(lhs, rhs)| {
                Ok((
                    lhs.trim().parse().map_err(|_| invalid())?,
                    rhs.trim().parse().map_err(|_| invalid())?,
                ))
            },
        )?;
        if start == 0 || end < start {
            return Err(invalid());
        }
        Ok(Self { start, end })
    }
}

/// Options accepted alongside an upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOptions {
    /// Rasterisation DPI; the configured default applies when absent.
    pub dpi: Option<u32>,
    /// Page range for extraction or rasterisation.
    pub pages: Option<PageRange>,
    /// Output encoding for rasterised pages.
    pub image_format: ImageFormat,
}

/// Validated record of one staged input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadDescriptor {
    /// Filename exactly as supplied by the client.
    pub original_name: String,
    /// Sanitized stem used to derive output names.
    pub stem: String,
    /// Lowercased extension.
    pub extension: String,
    /// Content type declared by the transport, if any.
    pub declared_mime: Option<String>,
    /// Upload size in bytes.
    pub size_bytes: u64,
    /// Absolute path of the staged copy, inside the request workspace.
    pub staged_path: PathBuf,
}

/// One requested transform: operation, ordered inputs, options.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    /// Selected operation.
    pub operation: Operation,
    /// Staged inputs in upload order.
    pub inputs: Vec<UploadDescriptor>,
    /// Operation options.
    pub options: JobOptions,
}

impl ConversionJob {
    /// Sanitized stem of the first input, used to derive output filenames.
    #[must_use]
    pub fn output_stem(&self) -> &str {
        self.inputs.first().map_or("output", |input| &input.stem)
    }
}

/// Output artifact(s) of a completed job, still inside the workspace.
#[derive(Debug, Clone)]
pub struct ConversionResult {
    /// Output files in page/upload order.
    pub outputs: Vec<PathBuf>,
    /// MIME type of each output file.
    pub mime: &'static str,
    /// Extension of each output file.
    pub extension: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_identifiers_are_stable() {
        assert_eq!(Operation::PdfToDocx.as_str(), "pdf_to_docx");
        assert_eq!(Operation::ImagesToPdf.as_str(), "images_to_pdf");
    }

    #[test]
    fn merge_requires_two_inputs() {
        assert_eq!(Operation::PdfMerge.min_inputs(), 2);
        assert!(Operation::PdfMerge.multi_input());
        assert!(!Operation::PdfToDocx.multi_input());
    }

    #[test]
    fn page_range_parses_single_pages_and_spans() {
        assert_eq!(
            "5".parse::<PageRange>().expect("single"),
            PageRange { start: 5, end: 5 }
        );
        assert_eq!(
            "2-7".parse::<PageRange>().expect("span"),
            PageRange { start: 2, end: 7 }
        );
        assert!("0".parse::<PageRange>().is_err());
        assert!("7-2".parse::<PageRange>().is_err());
        assert!("abc".parse::<PageRange>().is_err());
    }

    #[test]
    fn image_format_parses_aliases() {
        assert_eq!("png".parse::<ImageFormat>().expect("png"), ImageFormat::Png);
        assert_eq!(
            "JPEG".parse::<ImageFormat>().expect("jpeg"),
            ImageFormat::Jpeg
        );
        assert!("webp".parse::<ImageFormat>().is_err());
    }

    #[test]
    fn job_output_stem_falls_back_when_empty() {
        let job = ConversionJob {
            operation: Operation::PdfMerge,
            inputs: Vec::new(),
            options: JobOptions::default(),
        };
        assert_eq!(job.output_stem(), "output");
    }
}

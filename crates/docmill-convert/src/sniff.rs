//! Magic-byte content inspection.
//!
//! Client-supplied MIME headers are never trusted alone; the first bytes of
//! an upload identify the real container format.

/// Content kinds the sniffer can identify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedKind {
    /// `%PDF` document.
    Pdf,
    /// PNG raster image.
    Png,
    /// JPEG raster image.
    Jpeg,
    /// TIFF raster image (either byte order).
    Tiff,
    /// ZIP container (covers OOXML documents such as DOCX/PPTX).
    Zip,
}

impl DetectedKind {
    /// Stable label for logs and error payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Tiff => "tiff",
            Self::Zip => "zip",
        }
    }

    /// Whether this kind is plausible for the given lowercased extension.
    #[must_use]
    pub fn matches_extension(self, extension: &str) -> bool {
        match self {
            Self::Pdf => extension == "pdf",
            Self::Png => extension == "png",
            Self::Jpeg => matches!(extension, "jpg" | "jpeg"),
            Self::Tiff => matches!(extension, "tif" | "tiff"),
            Self::Zip => matches!(extension, "docx" | "pptx" | "xlsx" | "zip"),
        }
    }
}

const PDF_MAGIC: &[u8] = b"%PDF";
const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";
const JPEG_MAGIC: &[u8] = b"\xff\xd8\xff";
const TIFF_LE_MAGIC: &[u8] = b"II*\x00";
const TIFF_BE_MAGIC: &[u8] = b"MM\x00*";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Identify the content kind from the first bytes of an upload.
#[must_use]
pub fn sniff(bytes: &[u8]) -> Option<DetectedKind> {
    if bytes.starts_with(PDF_MAGIC) {
        Some(DetectedKind::Pdf)
    } else if bytes.starts_with(PNG_MAGIC) {
        Some(DetectedKind::Png)
    } else if bytes.starts_with(JPEG_MAGIC) {
        Some(DetectedKind::Jpeg)
    } else if bytes.starts_with(TIFF_LE_MAGIC) || bytes.starts_with(TIFF_BE_MAGIC) {
        Some(DetectedKind::Tiff)
    } else if bytes.starts_with(ZIP_MAGIC) {
        Some(DetectedKind::Zip)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_magics_are_detected() {
        assert_eq!(sniff(b"%PDF-1.7 rest"), Some(DetectedKind::Pdf));
        assert_eq!(
            sniff(b"\x89PNG\r\n\x1a\n\x00\x00"),
            Some(DetectedKind::Png)
        );
        assert_eq!(sniff(b"\xff\xd8\xff\xe0JFIF"), Some(DetectedKind::Jpeg));
        assert_eq!(sniff(b"II*\x00data"), Some(DetectedKind::Tiff));
        assert_eq!(sniff(b"MM\x00*data"), Some(DetectedKind::Tiff));
        assert_eq!(sniff(b"PK\x03\x04docx"), Some(DetectedKind::Zip));
    }

    #[test]
    fn unknown_content_yields_none() {
        assert_eq!(sniff(b"hello world"), None);
        assert_eq!(sniff(b""), None);
    }

    #[test]
    fn extension_matching_covers_aliases() {
        assert!(DetectedKind::Jpeg.matches_extension("jpg"));
        assert!(DetectedKind::Jpeg.matches_extension("jpeg"));
        assert!(!DetectedKind::Jpeg.matches_extension("png"));
        assert!(DetectedKind::Zip.matches_extension("docx"));
        assert!(!DetectedKind::Pdf.matches_extension("docx"));
    }
}

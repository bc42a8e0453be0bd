/*!
 * Document format detection.
 *
 * Maps a file path to one of the supported container formats. Detection is
 * purely extension based, case-insensitive; no content sniffing is performed.
 */

use std::fmt;
use std::path::Path;

use crate::errors::DocumentError;

/// Supported document formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// Newline-delimited plain text
    PlainText,
    /// Office Open XML word-processing container
    Docx,
    /// EPUB e-book container
    Epub,
    /// PDF, handled through external conversion to DOCX
    Pdf,
}

impl DocumentFormat {
    /// Detect the format from a file path's extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, DocumentError> {
        let ext = path
            .as_ref()
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "txt" => Ok(Self::PlainText),
            "docx" => Ok(Self::Docx),
            "epub" => Ok(Self::Epub),
            "pdf" => Ok(Self::Pdf),
            _ => Err(DocumentError::UnsupportedFormat(ext)),
        }
    }

    /// Canonical file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            Self::PlainText => "txt",
            Self::Docx => "docx",
            Self::Epub => "epub",
            Self::Pdf => "pdf",
        }
    }

    /// Whether this format is a ZIP-based container with rich text members
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Docx | Self::Epub)
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

use std::fmt;

// @module: Translatable segment data model

/// Maximum segment size in bytes (8MB for safety margin under the 10MB engine limit)
pub const MAX_SEGMENT_SIZE: usize = 8 * 1024 * 1024;

// @struct: Single translatable segment
#[derive(Debug, Clone)]
pub struct Segment {
    // @field: Text to translate
    pub text: String,

    // @field: Stable key for reassembly (chapter member path, `segment_<n>`, ...)
    pub identifier: String,

    // @field: Order index within the document
    pub index: usize,

    // @field: Size in bytes before translation
    pub original_size: usize,

    // @field: Untouched chapter markup, kept for structure-preserving reconstruction.
    // Only present for EPUB chapters, and only on the first part of an
    // over-sized chapter that had to be split further.
    pub original_markup: Option<String>,
}

impl Segment {
    /// Create a new segment from extracted text
    pub fn new(text: String, identifier: String, index: usize) -> Self {
        let original_size = text.len();
        Segment {
            text,
            identifier,
            index,
            original_size,
            original_markup: None,
        }
    }

    /// Attach the original chapter markup
    pub fn with_markup(mut self, markup: String) -> Self {
        self.original_markup = Some(markup);
        self
    }

    /// Whether this segment exceeds the size ceiling (a single indivisible
    /// paragraph may; it is emitted rather than truncated)
    pub fn is_oversized(&self) -> bool {
        self.text.len() > MAX_SEGMENT_SIZE
    }

    /// The container member this segment belongs to, with any `_part<N>`
    /// suffix removed, together with the part number (0 when unsuffixed).
    pub fn member_and_part(&self) -> (&str, usize) {
        if let Some(pos) = self.identifier.rfind("_part") {
            if let Ok(part) = self.identifier[pos + 5..].parse::<usize>() {
                return (&self.identifier[..pos], part);
            }
        }
        (&self.identifier, 0)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "segment {} ({}, {} bytes)",
            self.index, self.identifier, self.original_size
        )
    }
}

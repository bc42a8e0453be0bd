/*!
 * Document segmentation.
 *
 * Splits a document into ordered, size-bounded translatable segments while
 * retaining enough structural context to rebuild the container afterwards.
 * Plain text is split directly on paragraph boundaries; DOCX and EPUB are
 * opened as ZIP archives and their text-bearing XML members are stream-parsed;
 * PDF is first converted to DOCX through LibreOffice.
 */

use std::fs;
use std::io::Read;
use std::path::Path;

use log::{debug, warn};
use quick_xml::Reader;
use quick_xml::events::{BytesText, Event};
use zip::ZipArchive;

use crate::converter;
use crate::document_format::DocumentFormat;
use crate::errors::{AppError, DocumentError};
use crate::segment::{MAX_SEGMENT_SIZE, Segment};

// @struct: Document segmentation operations
pub struct Segmenter;

impl Segmenter {
    /// Split a document into translatable segments.
    ///
    /// The format drives the extraction strategy; the returned segments carry
    /// ascending indices reproducing document order.
    pub async fn segment<P: AsRef<Path>>(path: P) -> Result<Vec<Segment>, AppError> {
        let path = path.as_ref();
        let format = DocumentFormat::from_path(path).map_err(AppError::Document)?;

        match format {
            DocumentFormat::PlainText => Self::segment_txt(path).map_err(AppError::Document),
            DocumentFormat::Docx => Self::segment_docx(path).map_err(AppError::Document),
            DocumentFormat::Epub => Self::segment_epub(path).map_err(AppError::Document),
            DocumentFormat::Pdf => Self::segment_pdf(path).await,
        }
    }

    /// Whether a document's on-disk size exceeds a single segment
    pub fn needs_splitting<P: AsRef<Path>>(path: P) -> bool {
        fs::metadata(path)
            .map(|m| m.len() as usize > MAX_SEGMENT_SIZE)
            .unwrap_or(false)
    }

    /// Full plain text of a document, one line per extracted paragraph
    pub async fn extract_text<P: AsRef<Path>>(path: P) -> Result<String, AppError> {
        let segments = Self::segment(path).await?;
        let mut full_text = String::new();
        for seg in &segments {
            full_text.push_str(&seg.text);
            full_text.push('\n');
        }
        Ok(full_text.trim().to_string())
    }

    /// Split a text stream into segments on paragraph boundaries.
    ///
    /// Paragraphs are accumulated into a running buffer; the buffer is closed
    /// as one segment whenever appending the next paragraph would push it over
    /// `max_size` bytes. A single paragraph larger than `max_size` is emitted
    /// as its own oversized segment rather than truncated.
    pub fn split_text_by_paragraphs(text: &str, max_size: usize) -> Vec<Segment> {
        let mut segments: Vec<Segment> = Vec::new();
        let mut current = String::new();
        let mut index = 0;

        for para in text.split('\n') {
            // Byte length the buffer would have with this paragraph appended
            let potential_len = if current.is_empty() {
                para.len()
            } else {
                current.len() + 1 + para.len()
            };

            if potential_len > max_size && !current.is_empty() {
                segments.push(Segment::new(
                    std::mem::take(&mut current),
                    format!("segment_{}", index),
                    index,
                ));
                index += 1;
                current.push_str(para);
            } else {
                if !current.is_empty() {
                    current.push('\n');
                }
                current.push_str(para);
            }
        }

        // Don't forget the last chunk
        if !current.is_empty() {
            segments.push(Segment::new(current, format!("segment_{}", index), index));
        }

        segments
    }

    fn segment_txt(path: &Path) -> Result<Vec<Segment>, DocumentError> {
        let full_text = fs::read_to_string(path)
            .map_err(|e| DocumentError::Open(format!("{}: {}", path.display(), e)))?;

        let segments = Self::split_text_by_paragraphs(&full_text, MAX_SEGMENT_SIZE);
        if segments.is_empty() {
            return Err(DocumentError::NoContent);
        }
        Ok(segments)
    }

    fn segment_docx(path: &Path) -> Result<Vec<Segment>, DocumentError> {
        debug!("Start splitting DOCX: {}", path.display());

        let file = fs::File::open(path)
            .map_err(|e| DocumentError::Open(format!("{}: {}", path.display(), e)))?;
        let mut archive = ZipArchive::new(file)
            .map_err(|e| DocumentError::Open(format!("invalid archive: {}", e)))?;

        let mut content = Vec::new();
        {
            let mut entry = archive
                .by_name("word/document.xml")
                .map_err(|_| DocumentError::Parse("word/document.xml not found".to_string()))?;
            entry
                .read_to_end(&mut content)
                .map_err(|e| DocumentError::Parse(format!("word/document.xml: {}", e)))?;
        }

        let full_text = Self::extract_docx_text(&content);
        debug!("Extracted {} bytes of text from DOCX", full_text.len());

        let segments = Self::split_text_by_paragraphs(&full_text, MAX_SEGMENT_SIZE);
        if segments.is_empty() {
            return Err(DocumentError::NoContent);
        }
        Ok(segments)
    }

    /// Extract the body text of a DOCX document member, one line per paragraph.
    ///
    /// All text runs inside a paragraph element are concatenated; the logical
    /// line is closed at the paragraph's end tag.
    fn extract_docx_text(xml: &[u8]) -> String {
        let mut reader = Reader::from_reader(xml);
        let mut buf = Vec::new();

        let mut full_text = String::new();
        let mut current_para = String::new();
        let mut in_text_run = false;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    if e.local_name().as_ref() == b"t" {
                        in_text_run = true;
                    }
                }
                Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                    b"t" => in_text_run = false,
                    b"p" => {
                        if !current_para.is_empty() {
                            full_text.push_str(&current_para);
                            full_text.push('\n');
                            current_para.clear();
                        }
                    }
                    _ => {}
                },
                Ok(Event::Text(ref t)) => {
                    if in_text_run {
                        current_para.push_str(&text_content(t));
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!("XML parse error in document body: {}", e);
                    break;
                }
            }
            buf.clear();
        }

        full_text
    }

    fn segment_epub(path: &Path) -> Result<Vec<Segment>, DocumentError> {
        debug!("Start splitting EPUB: {}", path.display());

        // First pass: collect chapter members in archive order
        let file = fs::File::open(path)
            .map_err(|e| DocumentError::Open(format!("{}: {}", path.display(), e)))?;
        let mut archive = ZipArchive::new(file)
            .map_err(|e| DocumentError::Open(format!("invalid archive: {}", e)))?;

        let mut chapter_members: Vec<String> = Vec::new();
        for i in 0..archive.len() {
            let entry = archive
                .by_index(i)
                .map_err(|e| DocumentError::Parse(format!("archive entry {}: {}", i, e)))?;
            let name = entry.name().to_string();
            if name.ends_with(".xhtml") || name.ends_with(".html") {
                debug!("Found chapter: {}", name);
                chapter_members.push(name);
            }
        }

        if chapter_members.is_empty() {
            return Err(DocumentError::NoContent);
        }

        // Second pass: re-open and extract each chapter's content
        let file = fs::File::open(path)
            .map_err(|e| DocumentError::Open(format!("{}: {}", path.display(), e)))?;
        let mut archive = ZipArchive::new(file)
            .map_err(|e| DocumentError::Open(format!("invalid archive: {}", e)))?;

        let mut segments: Vec<Segment> = Vec::new();
        let mut segment_index = 0;

        for name in &chapter_members {
            let mut content = Vec::new();
            match archive.by_name(name) {
                Ok(mut entry) => {
                    if let Err(e) = entry.read_to_end(&mut content) {
                        warn!("Error reading chapter {}: {}", name, e);
                        continue;
                    }
                }
                Err(e) => {
                    warn!("Error re-opening chapter {}: {}", name, e);
                    continue;
                }
            }

            let original_markup = String::from_utf8_lossy(&content).into_owned();
            let chapter_text = Self::extract_chapter_text(&content);

            if chapter_text.is_empty() {
                continue;
            }

            if chapter_text.len() > MAX_SEGMENT_SIZE {
                // Chapter itself is over the ceiling; split it further. Only
                // the first part keeps the chapter markup, later parts are
                // rebuilt from bare text at reconstruction time.
                debug!(
                    "Chapter {} too large ({} bytes), splitting by paragraphs",
                    name,
                    chapter_text.len()
                );
                let parts = Self::split_text_by_paragraphs(&chapter_text, MAX_SEGMENT_SIZE);
                for (part, mut seg) in parts.into_iter().enumerate() {
                    seg.identifier = format!("{}_part{}", name, part);
                    seg.index = segment_index;
                    segment_index += 1;
                    if part == 0 {
                        seg.original_markup = Some(original_markup.clone());
                    }
                    segments.push(seg);
                }
            } else {
                let seg = Segment::new(
                    chapter_text.trim().to_string(),
                    name.clone(),
                    segment_index,
                )
                .with_markup(original_markup);
                segment_index += 1;
                segments.push(seg);
            }
        }

        debug!("Finished processing EPUB, {} segments", segments.len());
        if segments.is_empty() {
            return Err(DocumentError::NoContent);
        }
        Ok(segments)
    }

    /// Extract one logical text line per visual block (`p`, `h1`..`h6`) from a
    /// chapter document.
    fn extract_chapter_text(xml: &[u8]) -> String {
        let mut reader = Reader::from_reader(xml);
        let mut buf = Vec::new();

        let mut chapter_text = String::new();
        let mut current_para = String::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Text(ref t)) => {
                    let text = text_content(t);
                    let trimmed = text.trim();
                    if !trimmed.is_empty() {
                        current_para.push_str(trimmed);
                        current_para.push(' ');
                    }
                }
                Ok(Event::End(ref e)) => {
                    if is_block_tag(e.local_name().as_ref()) && !current_para.trim().is_empty() {
                        chapter_text.push_str(current_para.trim());
                        chapter_text.push('\n');
                        current_para.clear();
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    // Chapter markup is frequently not well-formed XML; salvage
                    // what was read so far.
                    debug!("XML parse error in chapter: {}", e);
                    break;
                }
            }
            buf.clear();
        }

        if !current_para.trim().is_empty() {
            chapter_text.push_str(current_para.trim());
            chapter_text.push('\n');
        }

        chapter_text
    }

    async fn segment_pdf(path: &Path) -> Result<Vec<Segment>, AppError> {
        // Temporary conversion directory is removed when `converted` drops,
        // on the error paths as well.
        let converted = converter::convert_pdf_to_docx(path)
            .await
            .map_err(AppError::Conversion)?;

        let mut segments =
            Self::segment_docx(converted.docx_path()).map_err(AppError::Document)?;

        for seg in &mut segments {
            seg.identifier = format!("pdf_converted_{}", seg.identifier);
        }

        Ok(segments)
    }
}

/// Block-level tags that close a logical line in chapter markup
fn is_block_tag(name: &[u8]) -> bool {
    matches!(name, b"p" | b"h1" | b"h2" | b"h3" | b"h4" | b"h5" | b"h6")
}

/// Text of an XML text event, tolerating entities quick-xml does not know
/// (chapter markup routinely uses HTML entities like `&nbsp;`).
fn text_content(t: &BytesText) -> String {
    match t.unescape() {
        Ok(cow) => cow.into_owned(),
        Err(_) => String::from_utf8_lossy(t).into_owned(),
    }
}

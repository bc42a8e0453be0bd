/*!
 * Document reconstruction.
 *
 * Rewrites a container's text-bearing members with translated content while
 * copying every other member through unchanged. The XML members are rewritten
 * over a parsed event stream, so paragraph and text-run boundaries are
 * structurally guaranteed; attribute values are carried as raw
 * (already-escaped) bytes to survive round-tripping of entity references.
 */

use std::collections::HashMap;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use log::{debug, warn};
use quick_xml::Reader;
use quick_xml::events::Event;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::document_format::DocumentFormat;
use crate::errors::DocumentError;
use crate::segment::Segment;

// @struct: Document reconstruction operations
pub struct Reconstructor;

impl Reconstructor {
    /// Rebuild the output document from translated segments.
    ///
    /// `original_segments` supply the structural context captured at
    /// segmentation time; `translated_segments` supply the text. Members the
    /// pipeline never touched are copied byte for byte.
    pub fn reconstruct(
        format: DocumentFormat,
        original_path: &Path,
        original_segments: &[Segment],
        translated_segments: &[Segment],
        output_path: &Path,
    ) -> Result<(), DocumentError> {
        match format {
            DocumentFormat::PlainText => Self::merge_to_txt(translated_segments, output_path),
            DocumentFormat::Docx => {
                Self::merge_to_docx(original_path, translated_segments, output_path)
            }
            DocumentFormat::Epub => Self::merge_to_epub(
                original_path,
                original_segments,
                translated_segments,
                output_path,
            ),
            DocumentFormat::Pdf => {
                // PDF output is not supported; the closest available output is
                // a DOCX rebuilt from the converted intermediate.
                if !output_path
                    .extension()
                    .map(|e| e.eq_ignore_ascii_case("docx"))
                    .unwrap_or(false)
                {
                    warn!("Saving PDF translation as DOCX (PDF export not supported)");
                }
                Self::merge_to_docx(original_path, translated_segments, output_path)
            }
        }
    }

    /// Plain text: segments sorted by index, joined by newline, single write
    fn merge_to_txt(
        translated_segments: &[Segment],
        output_path: &Path,
    ) -> Result<(), DocumentError> {
        let mut sorted: Vec<&Segment> = translated_segments.iter().collect();
        sorted.sort_by_key(|s| s.index);

        let joined = sorted
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        fs::write(output_path, joined)
            .map_err(|e| DocumentError::Reconstruction(format!("{}: {}", output_path.display(), e)))
    }

    /// DOCX: copy the archive, rewriting only the document body member
    fn merge_to_docx(
        original_path: &Path,
        translated_segments: &[Segment],
        output_path: &Path,
    ) -> Result<(), DocumentError> {
        let mut sorted: Vec<&Segment> = translated_segments.iter().collect();
        sorted.sort_by_key(|s| s.index);

        let mut full_translation = String::new();
        for seg in &sorted {
            full_translation.push_str(&seg.text);
            full_translation.push('\n');
        }

        let translated_lines: Vec<&str> = full_translation
            .split('\n')
            .filter(|l| !l.is_empty())
            .collect();

        copy_archive_with_rewrites(original_path, output_path, |name, data| {
            if name == "word/document.xml" {
                match rewrite_docx_body(data, &translated_lines) {
                    Ok(rewritten) => Some(rewritten),
                    Err(e) => {
                        warn!("Could not rewrite document body structurally: {}", e);
                        None
                    }
                }
            } else {
                None
            }
        })
    }

    /// EPUB: copy the archive, rewriting each chapter that produced segments
    fn merge_to_epub(
        original_path: &Path,
        original_segments: &[Segment],
        translated_segments: &[Segment],
        output_path: &Path,
    ) -> Result<(), DocumentError> {
        let translations: HashMap<&str, &str> = translated_segments
            .iter()
            .map(|s| (s.identifier.as_str(), s.text.as_str()))
            .collect();
        let markups: HashMap<&str, &str> = original_segments
            .iter()
            .filter_map(|s| {
                s.original_markup
                    .as_deref()
                    .map(|m| (s.identifier.as_str(), m))
            })
            .collect();

        copy_archive_with_rewrites(original_path, output_path, |name, _data| {
            let part0 = format!("{}_part0", name);
            if !translations.contains_key(name) && !translations.contains_key(part0.as_str()) {
                return None;
            }

            // Reassemble the chapter's text from its parts, in part order
            let (translated, markup) = if let Some(text) = translations.get(name) {
                (text.to_string(), markups.get(name).copied())
            } else {
                let mut text = String::new();
                let mut markup = None;
                for part in 0.. {
                    let key = format!("{}_part{}", name, part);
                    match translations.get(key.as_str()) {
                        Some(part_text) => {
                            text.push_str(part_text);
                            text.push(' ');
                            if part == 0 {
                                markup = markups.get(key.as_str()).copied();
                            }
                        }
                        None => break,
                    }
                }
                (text, markup)
            };

            let new_chapter = match markup {
                Some(markup) => rewrite_chapter_markup(markup, &translated),
                // Tail parts of an over-split chapter carry no markup; emit a
                // minimal document instead
                None => fallback_chapter(&translated),
            };

            debug!("Rewrote chapter {}", name);
            Some(new_chapter.into_bytes())
        })
    }
}

/// Copy every archive member from `original_path` to `output_path`, letting
/// `rewrite` substitute the content of text-bearing members. Returning `None`
/// keeps the original bytes.
fn copy_archive_with_rewrites(
    original_path: &Path,
    output_path: &Path,
    mut rewrite: impl FnMut(&str, &[u8]) -> Option<Vec<u8>>,
) -> Result<(), DocumentError> {
    let file = fs::File::open(original_path)
        .map_err(|e| DocumentError::Open(format!("{}: {}", original_path.display(), e)))?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| DocumentError::Open(format!("invalid archive: {}", e)))?;

    let out = fs::File::create(output_path)
        .map_err(|e| DocumentError::Reconstruction(format!("{}: {}", output_path.display(), e)))?;
    let mut writer = ZipWriter::new(out);

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| DocumentError::Reconstruction(format!("archive entry {}: {}", i, e)))?;
        let name = entry.name().to_string();

        let mut options = SimpleFileOptions::default()
            .compression_method(entry.compression())
            .last_modified_time(entry.last_modified().unwrap_or_default());
        if let Some(mode) = entry.unix_mode() {
            options = options.unix_permissions(mode);
        }

        if entry.is_dir() {
            writer
                .add_directory(&name, options)
                .map_err(|e| DocumentError::Reconstruction(format!("{}: {}", name, e)))?;
            continue;
        }

        let mut data = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut data)
            .map_err(|e| DocumentError::Reconstruction(format!("{}: {}", name, e)))?;

        let data = rewrite(&name, &data).unwrap_or(data);

        writer
            .start_file(&name, options)
            .map_err(|e| DocumentError::Reconstruction(format!("{}: {}", name, e)))?;
        writer
            .write_all(&data)
            .map_err(|e| DocumentError::Reconstruction(format!("{}: {}", name, e)))?;
    }

    writer
        .finish()
        .map_err(|e| DocumentError::Reconstruction(format!("finish archive: {}", e)))?;
    Ok(())
}

/// Owned XML event, keeping attribute values as raw (already-escaped) bytes
/// so re-serialization does not normalize entity references away
#[derive(Debug, Clone)]
enum MarkupEvent {
    /// Opening tag
    Start {
        name: String,
        attrs: Vec<(String, String)>,
    },
    /// Self-closing tag
    Empty {
        name: String,
        attrs: Vec<(String, String)>,
    },
    /// Closing tag
    End { name: String },
    /// Unescaped character data (re-escaped on write)
    Text(String),
    /// Declaration, comment, CDATA, PI, doctype serialized verbatim
    Verbatim(String),
}

/// Parse an XML member into an owned event list
fn parse_markup(xml: &[u8]) -> Result<Vec<MarkupEvent>, DocumentError> {
    let mut reader = Reader::from_reader(xml);
    // Chapter markup is frequently HTML-ish; do not insist on matching tags
    reader.config_mut().check_end_names = false;

    let mut events = Vec::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => events.push(MarkupEvent::Start {
                name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                attrs: collect_attrs(&e)?,
            }),
            Ok(Event::Empty(e)) => events.push(MarkupEvent::Empty {
                name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                attrs: collect_attrs(&e)?,
            }),
            Ok(Event::End(e)) => events.push(MarkupEvent::End {
                name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
            }),
            Ok(Event::Text(t)) => {
                let text = match t.unescape() {
                    Ok(cow) => cow.into_owned(),
                    Err(_) => String::from_utf8_lossy(&t).into_owned(),
                };
                events.push(MarkupEvent::Text(text));
            }
            Ok(Event::CData(c)) => events.push(MarkupEvent::Verbatim(format!(
                "<![CDATA[{}]]>",
                bytes_to_string(c.into_inner())
            ))),
            Ok(Event::Comment(c)) => events.push(MarkupEvent::Verbatim(format!(
                "<!--{}-->",
                bytes_to_string(c.into_inner())
            ))),
            Ok(Event::Decl(d)) => {
                let version = d
                    .version()
                    .map(|v| String::from_utf8_lossy(&v).into_owned())
                    .unwrap_or_else(|_| "1.0".to_string());
                let encoding = d
                    .encoding()
                    .and_then(|r| r.ok())
                    .map(|v| String::from_utf8_lossy(&v).into_owned());
                let standalone = d
                    .standalone()
                    .and_then(|r| r.ok())
                    .map(|v| String::from_utf8_lossy(&v).into_owned());

                let mut decl = format!("<?xml version=\"{}\"", version);
                if let Some(encoding) = encoding {
                    decl.push_str(&format!(" encoding=\"{}\"", encoding));
                }
                if let Some(standalone) = standalone {
                    decl.push_str(&format!(" standalone=\"{}\"", standalone));
                }
                decl.push_str("?>");
                events.push(MarkupEvent::Verbatim(decl));
            }
            Ok(Event::PI(pi)) => {
                let target = bytes_to_string(pi.target());
                let content = bytes_to_string(pi.content());
                events.push(MarkupEvent::Verbatim(format!("<?{}{}?>", target, content)));
            }
            Ok(Event::DocType(t)) => events.push(MarkupEvent::Verbatim(format!(
                "<!DOCTYPE {}>",
                bytes_to_string(t.into_inner()).trim_start()
            ))),
            Ok(Event::Eof) => break,
            Err(e) => return Err(DocumentError::Parse(e.to_string())),
        }
        buf.clear();
    }
    Ok(events)
}

/// Attribute pairs with values kept as raw bytes; unescaping and re-escaping
/// them would normalize character references (newlines in attribute values
/// become spaces) and corrupt embedded payloads
fn collect_attrs(
    e: &quick_xml::events::BytesStart<'_>,
) -> Result<Vec<(String, String)>, DocumentError> {
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| DocumentError::Parse(e.to_string()))?;
        attrs.push((
            bytes_to_string(attr.key.as_ref()),
            bytes_to_string(attr.value.as_ref()),
        ));
    }
    Ok(attrs)
}

fn bytes_to_string(bytes: impl AsRef<[u8]>) -> String {
    String::from_utf8_lossy(bytes.as_ref()).into_owned()
}

fn push_tag(out: &mut String, name: &str, attrs: &[(String, String)], empty: bool) {
    out.push('<');
    out.push_str(name);
    for (key, value) in attrs {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(value);
        out.push('"');
    }
    if empty {
        out.push_str("/>");
    } else {
        out.push('>');
    }
}

/// Serialize an event list, skipping events flagged for removal and placing
/// `insertions` text right after the event at the paired index
fn write_markup(
    events: &[MarkupEvent],
    skip: &[bool],
    insertions: &HashMap<usize, String>,
) -> String {
    let mut out = String::new();
    for (i, event) in events.iter().enumerate() {
        if !skip[i] {
            match event {
                MarkupEvent::Start { name, attrs } => push_tag(&mut out, name, attrs, false),
                MarkupEvent::Empty { name, attrs } => push_tag(&mut out, name, attrs, true),
                MarkupEvent::End { name } => {
                    out.push_str("</");
                    out.push_str(name);
                    out.push('>');
                }
                MarkupEvent::Text(text) => out.push_str(&escape_xml_text(text)),
                MarkupEvent::Verbatim(raw) => out.push_str(raw),
            }
        }
        if let Some(text) = insertions.get(&i) {
            out.push_str(&escape_xml_text(text));
        }
    }
    out
}

/// Spans of elements accepted by `matches`: (start, end) event index pairs,
/// outermost occurrences only, in document order
fn element_spans(events: &[MarkupEvent], matches: impl Fn(&str) -> bool) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut open: Option<(usize, usize)> = None; // (start index, nesting depth)

    for (i, event) in events.iter().enumerate() {
        match event {
            MarkupEvent::Start { name, .. } if matches(name) => match &mut open {
                Some((_, depth)) => *depth += 1,
                None => open = Some((i, 0)),
            },
            MarkupEvent::End { name } if matches(name) => {
                if let Some((start, depth)) = &mut open {
                    if *depth == 0 {
                        spans.push((*start, i));
                        open = None;
                    } else {
                        *depth -= 1;
                    }
                }
            }
            _ => {}
        }
    }
    spans
}

/// Concatenated character data strictly inside a span
fn span_text(events: &[MarkupEvent], start: usize, end: usize) -> String {
    let mut text = String::new();
    for event in &events[start + 1..end] {
        if let MarkupEvent::Text(t) = event {
            text.push_str(t);
        }
    }
    text
}

fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

/// Rewrite a DOCX document body, pairing each translated line against the
/// next paragraph that has a non-empty text run.
///
/// In a paired paragraph the first non-empty text run receives the whole
/// translated line; every text-run node after it is removed, and the
/// paragraph's own properties stay untouched. Paragraphs without text runs,
/// and paragraphs left over once the lines are consumed, pass through.
fn rewrite_docx_body(xml: &[u8], translated_lines: &[&str]) -> Result<Vec<u8>, DocumentError> {
    let mut events = parse_markup(xml)?;
    let mut skip = vec![false; events.len()];

    let paragraphs = element_spans(&events, |name| local_name(name) == "p");
    let mut next_line = 0usize;

    for (p_start, p_end) in paragraphs {
        if next_line >= translated_lines.len() {
            break;
        }

        // Text runs of this paragraph, with whether they carry any text
        let runs: Vec<(usize, usize, bool)> =
            element_spans(&events[p_start + 1..p_end], |name| local_name(name) == "t")
                .into_iter()
                .map(|(s, e)| {
                    let (s, e) = (p_start + 1 + s, p_start + 1 + e);
                    let has_text = !span_text(&events, s, e).is_empty();
                    (s, e, has_text)
                })
                .collect();

        let Some(first) = runs.iter().position(|(_, _, has_text)| *has_text) else {
            // Pure formatting paragraph, copied through without consuming a line
            continue;
        };

        let line = translated_lines[next_line];
        next_line += 1;

        // First text run takes the whole line; whitespace must survive
        let (run_start, run_end, _) = runs[first];
        if let MarkupEvent::Start { attrs, .. } = &mut events[run_start] {
            *attrs = vec![("xml:space".to_string(), "preserve".to_string())];
        }
        let mut replaced = false;
        for i in run_start + 1..run_end {
            match &mut events[i] {
                MarkupEvent::Text(text) if !replaced => {
                    *text = line.to_string();
                    replaced = true;
                }
                _ => skip[i] = true,
            }
        }

        // Remaining text-run nodes in the paragraph are dropped
        for &(s, e, _) in &runs[first + 1..] {
            for flag in skip.iter_mut().take(e + 1).skip(s) {
                *flag = true;
            }
        }
    }

    Ok(write_markup(&events, &skip, &HashMap::new()).into_bytes())
}

/// Rewrite a chapter's markup, replacing the inner content of each block
/// element (`p`, `h1`..`h6`) that has extractable text with one translated
/// line. Inline tags inside replaced blocks are not carried over.
///
/// Falls back to a minimal document when the stored markup cannot be parsed.
fn rewrite_chapter_markup(markup: &str, translated: &str) -> String {
    if translated.trim().is_empty() {
        return markup.to_string();
    }

    let translated_lines: Vec<&str> = translated.split('\n').filter(|l| !l.is_empty()).collect();

    let events = match parse_markup(markup.as_bytes()) {
        Ok(events) => events,
        Err(e) => {
            warn!("Chapter markup not parseable, emitting plain chapter: {}", e);
            return fallback_chapter(translated);
        }
    };
    let mut skip = vec![false; events.len()];
    let mut insertions: HashMap<usize, String> = HashMap::new();

    let blocks = element_spans(&events, |name| {
        matches!(name, "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
    });
    let mut next_line = 0usize;

    for (b_start, b_end) in blocks {
        if next_line >= translated_lines.len() {
            break;
        }
        // Elements with no extractable text keep their structure
        if span_text(&events, b_start, b_end).trim().is_empty() {
            continue;
        }

        let mut line = translated_lines[next_line].trim();
        next_line += 1;
        if line.is_empty() {
            line = " "; // keep the block, insert a space
        }

        // Drop the original inner content, insert the translated line right
        // after the opening tag
        for flag in skip.iter_mut().take(b_end).skip(b_start + 1) {
            *flag = true;
        }
        insertions.insert(b_start, line.to_string());
    }

    write_markup(&events, &skip, &insertions)
}

/// Minimal chapter document for segments that carry no stored markup
fn fallback_chapter(translated: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <!DOCTYPE html>\n\
         <html xmlns=\"http://www.w3.org/1999/xhtml\">\n\
         <body><p>{}</p></body></html>",
        escape_xml_text(translated)
    )
}

/// Escape markup-significant characters in character data
fn escape_xml_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

/*!
 * Tests for document segmentation functionality
 */

use std::fs;

use doctrans::errors::{AppError, DocumentError};
use doctrans::segment::MAX_SEGMENT_SIZE;
use doctrans::segmenter::Segmenter;
use tempfile::tempdir;

use crate::common;

/// Test that concatenating all segments reproduces the input exactly
#[test]
fn test_split_text_withMultipleParagraphs_shouldReproduceInputWhenJoined() {
    let text = "First paragraph.\nSecond paragraph.\n\nFourth line after an empty one.";
    let segments = Segmenter::split_text_by_paragraphs(text, MAX_SEGMENT_SIZE);

    let joined = segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    assert_eq!(joined, text);
}

/// Test segment metadata assignment
#[test]
fn test_split_text_withSmallLimit_shouldAssignSequentialIndices() {
    let text = "aaaa\nbbbb\ncccc\ndddd";
    // Every paragraph forces a split at this limit
    let segments = Segmenter::split_text_by_paragraphs(text, 5);

    assert_eq!(segments.len(), 4);
    for (i, seg) in segments.iter().enumerate() {
        assert_eq!(seg.index, i);
        assert_eq!(seg.identifier, format!("segment_{}", i));
        assert_eq!(seg.original_size, seg.text.len());
        assert!(seg.original_markup.is_none());
    }

    let joined = segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    assert_eq!(joined, text);
}

/// Test that empty input produces no segments
#[test]
fn test_split_text_withEmptyInput_shouldProduceNoSegments() {
    assert!(Segmenter::split_text_by_paragraphs("", MAX_SEGMENT_SIZE).is_empty());
}

/// Test that a single indivisible oversized paragraph is emitted, not truncated
#[test]
fn test_split_text_withOversizedParagraph_shouldEmitItWhole() {
    let big = "x".repeat(50);
    let text = format!("{}\nsmall", big);
    let segments = Segmenter::split_text_by_paragraphs(&text, 10);

    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].text, big);
    assert!(segments[0].text.len() > 10);
    assert_eq!(segments[1].text, "small");
}

/// Test the documented 3 MiB / 4 MiB / 2 MiB paragraph scenario: the first
/// two paragraphs fit together under the ceiling, the third forces a split
#[test]
fn test_split_text_withNineMebibyteDocument_shouldProduceTwoSegments() {
    let mib = 1024 * 1024;
    let text = format!(
        "{}\n{}\n{}",
        "a".repeat(3 * mib),
        "b".repeat(4 * mib),
        "c".repeat(2 * mib)
    );

    let segments = Segmenter::split_text_by_paragraphs(&text, MAX_SEGMENT_SIZE);

    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].text.len(), 3 * mib + 1 + 4 * mib);
    assert_eq!(segments[1].text.len(), 2 * mib);
    assert!(segments.iter().all(|s| s.text.len() <= MAX_SEGMENT_SIZE));
}

/// Test plain text segmentation from a file
#[tokio::test]
async fn test_segment_withTxtFile_shouldReproduceContent() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("input.txt");
    let content = "Hello there.\nThis is a second paragraph.";
    fs::write(&path, content).unwrap();

    let segments = Segmenter::segment(&path).await.unwrap();
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].text, content);
    assert_eq!(segments[0].identifier, "segment_0");
}

/// Test that an empty text file yields no content
#[tokio::test]
async fn test_segment_withEmptyTxtFile_shouldFailWithNoContent() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("empty.txt");
    fs::write(&path, "").unwrap();

    let err = Segmenter::segment(&path).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Document(DocumentError::NoContent)
    ));
}

/// Test that a missing file fails with an open error
#[tokio::test]
async fn test_segment_withMissingFile_shouldFailWithOpenError() {
    let err = Segmenter::segment("does_not_exist.txt").await.unwrap_err();
    assert!(matches!(err, AppError::Document(DocumentError::Open(_))));
}

/// Test that an unknown extension is rejected
#[tokio::test]
async fn test_segment_withUnknownExtension_shouldFailWithUnsupportedFormat() {
    let err = Segmenter::segment("notes.md").await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Document(DocumentError::UnsupportedFormat(_))
    ));
}

/// Test DOCX segmentation: text runs concatenate per paragraph, formatting-only
/// paragraphs contribute nothing
#[tokio::test]
async fn test_segment_withDocxFile_shouldExtractOneLinePerTextParagraph() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("input.docx");

    let xml = common::docx_document_xml(&[
        common::docx_paragraph(&["First paragraph"]),
        common::docx_paragraph(&[]),
        common::docx_paragraph(&["Second ", "half"]),
        common::docx_paragraph(&[]),
        common::docx_paragraph(&["Third"]),
    ]);
    common::build_docx(&path, &xml);

    let segments = Segmenter::segment(&path).await.unwrap();
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].text, "First paragraph\nSecond half\nThird\n");
}

/// Test that a DOCX without the body member is treated as malformed
#[tokio::test]
async fn test_segment_withDocxMissingBodyMember_shouldFailWithParseError() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.docx");
    common::write_zip(&path, &[("word/styles.xml", b"<styles/>")]);

    let err = Segmenter::segment(&path).await.unwrap_err();
    assert!(matches!(err, AppError::Document(DocumentError::Parse(_))));
}

/// Test that a non-archive DOCX fails with an open error
#[tokio::test]
async fn test_segment_withNonArchiveDocx_shouldFailWithOpenError() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fake.docx");
    fs::write(&path, "this is not a zip archive").unwrap();

    let err = Segmenter::segment(&path).await.unwrap_err();
    assert!(matches!(err, AppError::Document(DocumentError::Open(_))));
}

/// Test EPUB segmentation: one segment per chapter under the ceiling, each
/// retaining its original markup, identifiers equal to the member paths
#[tokio::test]
async fn test_segment_withEpubFile_shouldProduceOneSegmentPerChapter() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("book.epub");

    let ch1 = common::chapter_xhtml("<p>Chapter one text.</p>");
    let ch2 = common::chapter_xhtml("<h1>Title two</h1><p>Chapter two text.</p>");
    let ch3 = common::chapter_xhtml("<p>Chapter three text.</p>");
    common::build_epub(
        &path,
        &[
            ("OEBPS/ch1.xhtml", ch1.as_str()),
            ("OEBPS/ch2.xhtml", ch2.as_str()),
            ("OEBPS/ch3.xhtml", ch3.as_str()),
        ],
    );

    let segments = Segmenter::segment(&path).await.unwrap();
    assert_eq!(segments.len(), 3);

    assert_eq!(segments[0].identifier, "OEBPS/ch1.xhtml");
    assert_eq!(segments[1].identifier, "OEBPS/ch2.xhtml");
    assert_eq!(segments[2].identifier, "OEBPS/ch3.xhtml");

    for (i, seg) in segments.iter().enumerate() {
        assert_eq!(seg.index, i);
        let markup = seg.original_markup.as_deref().unwrap();
        assert!(!markup.is_empty());
    }

    assert_eq!(segments[0].text, "Chapter one text.");
    assert_eq!(segments[1].text, "Title two\nChapter two text.");
    assert_eq!(segments[2].text, "Chapter three text.");
}

/// Test that an EPUB without chapter members yields no content
#[tokio::test]
async fn test_segment_withEpubWithoutChapters_shouldFailWithNoContent() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("empty.epub");
    common::build_epub(&path, &[]);

    let err = Segmenter::segment(&path).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Document(DocumentError::NoContent)
    ));
}

/// Test whole-document text extraction
#[tokio::test]
async fn test_extract_text_withDocxFile_shouldJoinParagraphLines() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("input.docx");

    let xml = common::docx_document_xml(&[
        common::docx_paragraph(&["One"]),
        common::docx_paragraph(&["Two"]),
    ]);
    common::build_docx(&path, &xml);

    let text = Segmenter::extract_text(&path).await.unwrap();
    assert_eq!(text, "One\nTwo");
}

/// Test the on-disk size check against the segment ceiling
#[test]
fn test_needs_splitting_withSmallFile_shouldBeFalse() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("small.txt");
    fs::write(&path, "tiny").unwrap();

    assert!(!Segmenter::needs_splitting(&path));
    assert!(!Segmenter::needs_splitting(dir.path().join("missing.txt")));
}

/// Test that chapter members with only markup and no text are skipped
#[tokio::test]
async fn test_segment_withTextlessChapter_shouldSkipIt() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("book.epub");

    let ch1 = common::chapter_xhtml("<p>Real content.</p>");
    let ch2 = common::chapter_xhtml("<p></p><h2></h2>");
    common::build_epub(
        &path,
        &[
            ("OEBPS/ch1.xhtml", ch1.as_str()),
            ("OEBPS/empty.xhtml", ch2.as_str()),
        ],
    );

    let segments = Segmenter::segment(&path).await.unwrap();
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].identifier, "OEBPS/ch1.xhtml");
}

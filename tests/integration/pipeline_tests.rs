/*!
 * End-to-end pipeline tests over the mock translation engine
 */

use std::fs;

use doctrans::app_config::Config;
use doctrans::errors::AppError;
use doctrans::pipeline::{DocumentPipeline, PipelineState};
use doctrans::providers::mock::MockTranslator;
use doctrans::segmenter::Segmenter;
use tempfile::tempdir;

use crate::common;

/// Test plain text round trip with the identity translator
#[tokio::test]
async fn test_run_withIdentityTranslatorOnTxt_shouldReproduceInput() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.txt");
    let output = dir.path().join("out.txt");
    let content = "First paragraph.\nSecond paragraph.";
    fs::write(&input, content).unwrap();

    let mut pipeline = DocumentPipeline::new(&input, &output, Config::default());
    let translator = MockTranslator::identity();
    let report = pipeline.run(&translator).await.unwrap();

    assert_eq!(report.segments, 1);
    assert_eq!(report.refined_segments, 0);
    assert_eq!(pipeline.state(), PipelineState::Reconstructed);
    assert_eq!(fs::read_to_string(&output).unwrap(), content);
}

/// Test that the translator is called once per segment, no batching
#[tokio::test]
async fn test_run_withMarkedTranslator_shouldTranslateEverySegment() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.txt");
    let output = dir.path().join("out.txt");
    fs::write(&input, "Some text to translate.").unwrap();

    let mut pipeline = DocumentPipeline::new(&input, &output, Config::default());
    let translator = MockTranslator::marked();
    let counter = translator.call_counter();
    let report = pipeline.run(&translator).await.unwrap();

    assert_eq!(report.segments, 1);
    assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "[TRANSLATED] Some text to translate."
    );
}

/// Test DOCX round trip with the identity translator: untouched members stay
/// byte-identical, extractable text is preserved
#[tokio::test]
async fn test_run_withIdentityTranslatorOnDocx_shouldPreserveContent() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.docx");
    let output = dir.path().join("out.docx");

    let xml = common::docx_document_xml(&[
        common::docx_paragraph(&["First paragraph"]),
        common::docx_paragraph(&[]),
        common::docx_paragraph(&["Second paragraph"]),
    ]);
    common::build_docx(&input, &xml);

    let mut pipeline = DocumentPipeline::new(&input, &output, Config::default());
    let translator = MockTranslator::identity();
    pipeline.run(&translator).await.unwrap();

    // Non-text members byte-identical
    assert_eq!(
        common::read_zip_member(&output, "word/media/logo.png"),
        common::read_zip_member(&input, "word/media/logo.png")
    );

    // Text equivalent through a fresh segmentation
    let input_segments = Segmenter::segment(&input).await.unwrap();
    let output_segments = Segmenter::segment(&output).await.unwrap();
    assert_eq!(input_segments.len(), output_segments.len());
    assert_eq!(input_segments[0].text, output_segments[0].text);
}

/// Test EPUB round trip with the identity translator
#[tokio::test]
async fn test_run_withIdentityTranslatorOnEpub_shouldPreserveChapterText() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.epub");
    let output = dir.path().join("out.epub");

    let ch1 = common::chapter_xhtml("<p>Chapter one text.</p>");
    let ch2 = common::chapter_xhtml("<h1>Heading</h1><p>Chapter two text.</p>");
    common::build_epub(
        &input,
        &[
            ("OEBPS/ch1.xhtml", ch1.as_str()),
            ("OEBPS/ch2.xhtml", ch2.as_str()),
        ],
    );

    let mut pipeline = DocumentPipeline::new(&input, &output, Config::default());
    let translator = MockTranslator::identity();
    pipeline.run(&translator).await.unwrap();

    assert_eq!(
        common::read_zip_member(&output, "mimetype"),
        common::read_zip_member(&input, "mimetype")
    );
    assert_eq!(
        common::read_zip_member(&output, "OEBPS/cover.jpg"),
        common::MEDIA_BYTES
    );

    let input_segments = Segmenter::segment(&input).await.unwrap();
    let output_segments = Segmenter::segment(&output).await.unwrap();
    assert_eq!(input_segments.len(), output_segments.len());
    for (a, b) in input_segments.iter().zip(output_segments.iter()) {
        assert_eq!(a.identifier, b.identifier);
        assert_eq!(a.text, b.text);
    }
}

/// Test that an engine failure aborts the run without writing output
#[tokio::test]
async fn test_run_withFailingTranslator_shouldAbortRun() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.txt");
    let output = dir.path().join("out.txt");
    fs::write(&input, "content").unwrap();

    let mut pipeline = DocumentPipeline::new(&input, &output, Config::default());
    let translator = MockTranslator::failing();
    let err = pipeline.run(&translator).await.unwrap_err();

    assert!(matches!(err, AppError::Translation(_)));
    assert_eq!(pipeline.state(), PipelineState::Failed);
    assert!(!output.exists());
}

/// Test that a missing input aborts before any work
#[tokio::test]
async fn test_run_withMissingInput_shouldFailWithDocumentError() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("missing.txt");
    let output = dir.path().join("out.txt");

    let mut pipeline = DocumentPipeline::new(&input, &output, Config::default());
    let translator = MockTranslator::identity();
    let err = pipeline.run(&translator).await.unwrap_err();

    assert!(matches!(err, AppError::Document(_)));
    assert!(!output.exists());
}

/// Test cancellation before the first suspension point: the run reports
/// cancelled and the reconstructor never runs
#[tokio::test]
async fn test_run_withCancelledFlag_shouldNotWriteOutput() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.txt");
    let output = dir.path().join("out.txt");
    fs::write(&input, "content").unwrap();

    let mut pipeline = DocumentPipeline::new(&input, &output, Config::default());
    pipeline.cancel_flag().cancel();

    let translator = MockTranslator::identity();
    let err = pipeline.run(&translator).await.unwrap_err();

    assert!(matches!(err, AppError::Cancelled));
    assert_eq!(pipeline.state(), PipelineState::Cancelled);
    assert!(!output.exists());
}

/// Test that one pipeline value refuses a second run
#[tokio::test]
async fn test_run_withCompletedPipeline_shouldRejectSecondRun() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.txt");
    let output = dir.path().join("out.txt");
    fs::write(&input, "content").unwrap();

    let mut pipeline = DocumentPipeline::new(&input, &output, Config::default());
    let translator = MockTranslator::identity();
    pipeline.run(&translator).await.unwrap();

    let err = pipeline.run(&translator).await.unwrap_err();
    assert!(matches!(err, AppError::Unknown(_)));
}

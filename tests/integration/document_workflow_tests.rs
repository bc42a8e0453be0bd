/*!
 * Workflow tests with the refinement pass enabled
 */

use std::fs;

use doctrans::app_config::Config;
use doctrans::pipeline::{DocumentPipeline, PipelineEvent};
use doctrans::providers::mock::{MockRefinementProvider, MockTranslator};
use doctrans::refinement::RefinementEvent;
use tempfile::tempdir;

fn refinement_config() -> Config {
    let mut config = Config::default();
    config.refinement.enabled = true;
    config.refinement.chunk_chars = 3000;
    config
}

/// Test that refinement output replaces the machine translation
#[tokio::test]
async fn test_run_withWorkingRefinement_shouldStoreRefinedText() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.txt");
    let output = dir.path().join("out.txt");
    fs::write(&input, "Some text.").unwrap();

    let mut pipeline = DocumentPipeline::new(&input, &output, refinement_config())
        .with_refinement_provider(Box::new(MockRefinementProvider::working()));
    let translator = MockTranslator::marked();
    let report = pipeline.run(&translator).await.unwrap();

    assert_eq!(report.segments, 1);
    assert_eq!(report.refined_segments, 1);
    assert_eq!(fs::read_to_string(&output).unwrap(), "[REFINED 1]");
}

/// Test that refinement failures fall back to the machine translation and
/// never abort the run
#[tokio::test]
async fn test_run_withFailingRefinement_shouldKeepMachineTranslation() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.txt");
    let output = dir.path().join("out.txt");
    fs::write(&input, "Some text.").unwrap();

    let mut pipeline = DocumentPipeline::new(&input, &output, refinement_config())
        .with_refinement_provider(Box::new(MockRefinementProvider::failing()));
    let translator = MockTranslator::marked();
    let report = pipeline.run(&translator).await.unwrap();

    assert_eq!(report.segments, 1);
    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "[TRANSLATED] Some text."
    );
}

/// Test that a backend-reported error degrades to the best-effort text and
/// surfaces a warning event
#[tokio::test]
async fn test_run_withBackendErrorRefinement_shouldWarnAndKeepMachineText() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.txt");
    let output = dir.path().join("out.txt");
    fs::write(&input, "Some text.").unwrap();

    let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel();
    let mut pipeline = DocumentPipeline::new(&input, &output, refinement_config())
        .with_events(events_tx)
        .with_refinement_provider(Box::new(MockRefinementProvider::backend_error()));
    let translator = MockTranslator::marked();
    let report = pipeline.run(&translator).await.unwrap();
    drop(pipeline);

    assert_eq!(report.refined_segments, 0);
    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "[TRANSLATED] Some text."
    );

    let mut saw_warning = false;
    while let Some(event) = events_rx.recv().await {
        if matches!(event, PipelineEvent::Warning(_)) {
            saw_warning = true;
        }
    }
    assert!(saw_warning);
}

/// Test that translation and refinement progress events are both emitted
#[tokio::test]
async fn test_run_withEventChannel_shouldEmitBothProgressStreams() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.txt");
    let output = dir.path().join("out.txt");
    fs::write(&input, "Some text.").unwrap();

    let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel();
    let mut pipeline = DocumentPipeline::new(&input, &output, refinement_config())
        .with_events(events_tx)
        .with_refinement_provider(Box::new(MockRefinementProvider::working()));
    let translator = MockTranslator::marked();
    pipeline.run(&translator).await.unwrap();
    drop(pipeline);

    let mut saw_translation_progress = false;
    let mut saw_refinement_progress = false;
    let mut saw_partial = false;
    while let Some(event) = events_rx.recv().await {
        match event {
            PipelineEvent::TranslationProgress { current: 1, total: 1 } => {
                saw_translation_progress = true;
            }
            PipelineEvent::Refinement(RefinementEvent::Progress { .. }) => {
                saw_refinement_progress = true;
            }
            PipelineEvent::Refinement(RefinementEvent::Partial(_)) => {
                saw_partial = true;
            }
            _ => {}
        }
    }
    assert!(saw_translation_progress);
    assert!(saw_refinement_progress);
    assert!(saw_partial);
}

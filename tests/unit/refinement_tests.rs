/*!
 * Tests for the refinement queue: chunking, strict sequencing, partial
 * aggregation, error handling and cancellation.
 */

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use doctrans::pipeline::CancelFlag;
use doctrans::providers::mock::MockRefinementProvider;
use doctrans::refinement::{RefinementEvent, RefinementOutcome, RefinementQueue, strip_reasoning_tags};

fn queue_with(provider: MockRefinementProvider, chunk_chars: usize) -> RefinementQueue {
    RefinementQueue::new(Box::new(provider), "English", "French", chunk_chars)
}

/// Test chunking against the character threshold
#[test]
fn test_split_into_chunks_withSmallThreshold_shouldCloseChunksOnOverflow() {
    let source = "aaaaa\nbbbbb\nccccc";
    let machine = "AAAAA\nBBBBB\nCCCCC";

    let chunks = RefinementQueue::split_into_chunks(source, machine, 10);

    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].index, 0);
    assert_eq!(chunks[0].source_text, "aaaaa\nbbbbb");
    assert_eq!(chunks[0].machine_text, "AAAAA\nBBBBB");
    assert_eq!(chunks[1].index, 1);
    assert_eq!(chunks[1].source_text, "ccccc");
    assert_eq!(chunks[1].machine_text, "CCCCC");

    for chunk in &chunks {
        assert!(!chunk.completed);
        assert_eq!(chunk.refined_text, chunk.machine_text);
    }
}

/// Test that everything fits in one chunk under the threshold
#[test]
fn test_split_into_chunks_withLargeThreshold_shouldProduceOneChunk() {
    let chunks = RefinementQueue::split_into_chunks("one\ntwo", "un\ndeux", 3000);
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].source_text, "one\ntwo");
    assert_eq!(chunks[0].machine_text, "un\ndeux");
}

/// Test the lockstep walk when the line counts differ
#[test]
fn test_split_into_chunks_withMismatchedLineCounts_shouldCoverBothTexts() {
    let source = "one\ntwo\nthree";
    let machine = "un";

    let chunks = RefinementQueue::split_into_chunks(source, machine, 3000);

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].source_text, "one\ntwo\nthree");
    assert_eq!(chunks[0].machine_text, "un");
}

/// Test reasoning markup removal
#[test]
fn test_strip_reasoning_tags_withVariants_shouldRemoveReasoningContent() {
    assert_eq!(
        strip_reasoning_tags("<think>pondering</think>Result"),
        "Result"
    );
    assert_eq!(
        strip_reasoning_tags("a<think>b</think>c<think>d</think>e"),
        "ace"
    );
    // Unterminated reasoning truncates to end of text
    assert_eq!(strip_reasoning_tags("Result<think>never closed"), "Result");
    assert_eq!(strip_reasoning_tags("no markup at all"), "no markup at all");
}

/// Test that a working provider refines every chunk in index order
#[tokio::test]
async fn test_refine_withWorkingProvider_shouldRefineChunksInOrder() {
    let queue = queue_with(MockRefinementProvider::working(), 10);
    let cancel = CancelFlag::new();

    let outcome = queue
        .refine("aaaaa\nbbbbb\nccccc", "AAAAA\nBBBBB\nCCCCC", &cancel)
        .await;

    let RefinementOutcome::Refined(text) = outcome else {
        panic!("expected refined outcome, got {:?}", outcome);
    };
    // Responses arrive in dispatch order, so the counters line up with the
    // chunk indices
    assert_eq!(text, "[REFINED 1]\n\n[REFINED 2]");
}

/// Test that exactly one request per chunk is issued
#[tokio::test]
async fn test_refine_withWorkingProvider_shouldIssueOneRequestPerChunk() {
    let provider = MockRefinementProvider::working();
    let counter = provider.request_counter();
    let queue = queue_with(provider, 4);
    let cancel = CancelFlag::new();

    queue
        .refine("11111\n22222\n33333", "a\nb\nc", &cancel)
        .await;

    assert_eq!(counter.load(Ordering::SeqCst), 3);
}

/// Test that empty source text is a no-op refinement
#[tokio::test]
async fn test_refine_withEmptySource_shouldDoNothing() {
    let provider = MockRefinementProvider::working();
    let counter = provider.request_counter();
    let queue = queue_with(provider, 3000);
    let cancel = CancelFlag::new();

    let outcome = queue.refine("   \n ", "whatever", &cancel).await;

    assert_eq!(outcome, RefinementOutcome::Nothing);
    assert_eq!(counter.load(Ordering::SeqCst), 0);
}

/// Test that per-chunk request failures keep the machine translation and the
/// queue keeps going
#[tokio::test]
async fn test_refine_withFailingProvider_shouldFallBackToMachineTranslation() {
    let queue = queue_with(MockRefinementProvider::failing(), 4);
    let cancel = CancelFlag::new();

    let outcome = queue
        .refine("11111\n22222", "premier\ndeuxieme", &cancel)
        .await;

    let RefinementOutcome::Refined(text) = outcome else {
        panic!("expected refined outcome, got {:?}", outcome);
    };
    assert_eq!(text, "premier\n\ndeuxieme");
}

/// Test that a backend-reported error halts the queue, keeping completed
/// chunks' text and the machine translation for the rest
#[tokio::test]
async fn test_refine_withBackendError_shouldHaltKeepingCompletedChunks() {
    let queue = queue_with(MockRefinementProvider::backend_error_after(1), 4);
    let cancel = CancelFlag::new();

    let outcome = queue
        .refine("11111\n22222\n33333", "un\ndeux\ntrois", &cancel)
        .await;

    let RefinementOutcome::Halted { text, reason } = outcome else {
        panic!("expected halted outcome, got {:?}", outcome);
    };
    assert_eq!(reason, "quota exceeded");
    assert_eq!(text, "[REFINED 1]\n\ndeux\n\ntrois");
}

/// Test that reasoning markup in responses never reaches the stored text
#[tokio::test]
async fn test_refine_withReasoningResponses_shouldStripReasoningMarkup() {
    let queue = queue_with(MockRefinementProvider::reasoning(), 3000);
    let cancel = CancelFlag::new();

    let outcome = queue.refine("hello", "bonjour", &cancel).await;

    let RefinementOutcome::Refined(text) = outcome else {
        panic!("expected refined outcome, got {:?}", outcome);
    };
    assert_eq!(text, "[REFINED 1]");
    assert!(!text.contains("<think>"));
}

/// Test progress and partial events around each chunk completion
#[tokio::test]
async fn test_refine_withEventChannel_shouldEmitProgressAndPartials() {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let queue = queue_with(MockRefinementProvider::working(), 4).with_events(tx);
    let cancel = CancelFlag::new();

    queue.refine("11111\n22222", "un\ndeux", &cancel).await;

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }

    // Initial zero progress, then a partial + progress pair per chunk
    assert!(matches!(
        events.first(),
        Some(RefinementEvent::Progress {
            completed: 0,
            total: 2
        })
    ));
    let partials: Vec<&String> = events
        .iter()
        .filter_map(|e| match e {
            RefinementEvent::Partial(text) => Some(text),
            _ => None,
        })
        .collect();
    assert_eq!(partials.len(), 2);
    // The first partial carries the refined first chunk and the still
    // unrefined second chunk
    assert_eq!(partials[0], "[REFINED 1]\n\ndeux");
    assert_eq!(partials[1], "[REFINED 1]\n\n[REFINED 2]");
    assert!(matches!(
        events.last(),
        Some(RefinementEvent::Progress {
            completed: 2,
            total: 2
        })
    ));
}

/// Test that cancellation aborts the in-flight request and clears the chunks
#[tokio::test]
async fn test_refine_withCancellation_shouldAbortInFlightRequest() {
    let queue = Arc::new(queue_with(MockRefinementProvider::slow(30_000), 4));
    let cancel = CancelFlag::new();

    let task = {
        let queue = Arc::clone(&queue);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            queue
                .refine("11111\n22222", "un\ndeux", &cancel)
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let outcome = task.await.unwrap();
    assert_eq!(outcome, RefinementOutcome::Cancelled);
}

/// Test that a cancelled flag makes the queue a no-op before dispatching
#[tokio::test]
async fn test_refine_withPreCancelledFlag_shouldNotDispatch() {
    let provider = MockRefinementProvider::working();
    let counter = provider.request_counter();
    let queue = queue_with(provider, 3000);
    let cancel = CancelFlag::new();
    cancel.cancel();

    let outcome = queue.refine("hello", "bonjour", &cancel).await;

    assert_eq!(outcome, RefinementOutcome::Cancelled);
    assert_eq!(counter.load(Ordering::SeqCst), 0);
}

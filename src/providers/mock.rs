/*!
 * Mock implementations for testing.
 *
 * This module provides mocks that simulate different behaviors:
 * - `MockRefinementProvider::working()` - Always succeeds with refined text
 * - `MockRefinementProvider::reasoning()` - Succeeds but wraps the text in reasoning markup
 * - `MockRefinementProvider::failing()` - Always fails with a request error
 * - `MockRefinementProvider::backend_error()` - Reports an explicit backend error object
 * - `MockTranslator` - In-process stand-in for the external translation engine
 */

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::errors::{ProviderError, TranslationError};
use crate::pipeline::Translator;
use crate::providers::RefinementProvider;

/// Behavior mode for the mock refinement provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with a marked-up refinement
    Working,
    /// Succeeds but wraps part of the output in reasoning tags
    Reasoning,
    /// Always fails with a request error
    Failing,
    /// Fails with an explicit backend-reported error (halts the queue)
    BackendError,
    /// Succeeds for the first N requests, then reports a backend error
    BackendErrorAfter {
        /// Requests that succeed before the backend gives up
        succeed: usize,
    },
    /// Fails every Nth request with a request error
    Intermittent { fail_every: usize },
    /// Simulates a slow backend (for cancellation testing)
    Slow { delay_ms: u64 },
}

/// Mock refinement provider for testing queue behavior
#[derive(Debug)]
pub struct MockRefinementProvider {
    /// Behavior mode
    behavior: MockBehavior,
    /// Number of completed calls
    request_count: Arc<AtomicUsize>,
}

impl MockRefinementProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a working mock provider that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create a mock whose responses carry reasoning markup
    pub fn reasoning() -> Self {
        Self::new(MockBehavior::Reasoning)
    }

    /// Create a failing mock provider that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Create a mock that reports an explicit backend error
    pub fn backend_error() -> Self {
        Self::new(MockBehavior::BackendError)
    }

    /// Create a mock that succeeds N times, then reports a backend error
    pub fn backend_error_after(succeed: usize) -> Self {
        Self::new(MockBehavior::BackendErrorAfter { succeed })
    }

    /// Create an intermittently failing mock provider
    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every })
    }

    /// Create a slow mock provider
    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Handle to the request counter
    pub fn request_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.request_count)
    }
}

#[async_trait]
impl RefinementProvider for MockRefinementProvider {
    fn name(&self) -> &'static str {
        "Mock"
    }

    async fn complete(&self, _prompt: &str) -> Result<String, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst) + 1;

        match self.behavior {
            MockBehavior::Working => Ok(format!("[REFINED {}]", count)),
            MockBehavior::Reasoning => Ok(format!(
                "<think>The machine translation looks rough, let me rework it.</think>[REFINED {}]",
                count
            )),
            MockBehavior::Failing => {
                Err(ProviderError::RequestFailed("mock request failed".to_string()))
            }
            MockBehavior::BackendError => {
                Err(ProviderError::Backend("quota exceeded".to_string()))
            }
            MockBehavior::BackendErrorAfter { succeed } => {
                if count > succeed {
                    Err(ProviderError::Backend("quota exceeded".to_string()))
                } else {
                    Ok(format!("[REFINED {}]", count))
                }
            }
            MockBehavior::Intermittent { fail_every } => {
                if fail_every > 0 && count % fail_every == 0 {
                    Err(ProviderError::RequestFailed(format!(
                        "mock request {} failed",
                        count
                    )))
                } else {
                    Ok(format!("[REFINED {}]", count))
                }
            }
            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Ok(format!("[REFINED {}]", count))
            }
        }
    }
}

/// Behavior mode for the mock translator
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockTranslatorBehavior {
    /// Return the input unchanged (round-trip testing)
    Identity,
    /// Prefix every segment so translations are distinguishable
    Marked,
    /// Always fail
    Failing,
}

/// In-process stand-in for the external translation engine
#[derive(Debug)]
pub struct MockTranslator {
    behavior: MockTranslatorBehavior,
    call_count: Arc<AtomicUsize>,
}

impl MockTranslator {
    /// Create a translator that returns its input unchanged
    pub fn identity() -> Self {
        Self {
            behavior: MockTranslatorBehavior::Identity,
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a translator that marks every segment
    pub fn marked() -> Self {
        Self {
            behavior: MockTranslatorBehavior::Marked,
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a translator that always fails
    pub fn failing() -> Self {
        Self {
            behavior: MockTranslatorBehavior::Failing,
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Handle to the call counter
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.call_count)
    }
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(&self, text: &str) -> Result<String, TranslationError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            MockTranslatorBehavior::Identity => Ok(text.to_string()),
            MockTranslatorBehavior::Marked => Ok(format!("[TRANSLATED] {}", text)),
            MockTranslatorBehavior::Failing => {
                Err(TranslationError("mock engine failure".to_string()))
            }
        }
    }
}

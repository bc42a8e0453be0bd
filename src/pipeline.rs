/*!
 * Document translation pipeline orchestrator.
 *
 * Drives open -> segment -> (per segment: translate -> optional refine) ->
 * reconstruct as one sequential run. Translation and refinement are the
 * suspend points; cancellation is checked cooperatively before each of them
 * and an in-flight refinement request is aborted. One pipeline value runs one
 * document at a time; starting a second run while one is active is rejected.
 */

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::Notify;
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};

use crate::app_config::{Config, EngineConfig};
use crate::document_format::DocumentFormat;
use crate::errors::{AppError, DocumentError, TranslationError};
use crate::providers;
use crate::reconstructor::Reconstructor;
use crate::refinement::{RefinementEvent, RefinementOutcome, RefinementQueue};
use crate::segment::Segment;
use crate::segmenter::Segmenter;

/// Cooperative cancellation flag shared between a run and its caller.
///
/// Cancellation is sticky: once set it stays set for the lifetime of the flag.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag {
    inner: Arc<CancelInner>,
}

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelFlag {
    /// Create a new, unset flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation and wake any waiter
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolve once cancellation is requested; used to abort in-flight
    /// requests via select
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Boundary to the opaque translation engine: one call per segment,
/// no batching
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate one segment's text
    async fn translate(&self, text: &str) -> Result<String, TranslationError>;
}

/// Translator adapter over an external engine command.
///
/// The segment text is written to the engine's stdin and the translation is
/// read back from its stdout, one process execution per segment.
pub struct CommandTranslator {
    command: String,
    args: Vec<String>,
}

impl CommandTranslator {
    /// Create an adapter for the given command line
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    /// Create an adapter from the engine configuration
    pub fn from_config(config: &EngineConfig) -> Result<Self, TranslationError> {
        if config.command.trim().is_empty() {
            return Err(TranslationError(
                "no translation engine command configured".to_string(),
            ));
        }
        Ok(Self::new(config.command.clone(), config.args.clone()))
    }
}

#[async_trait]
impl Translator for CommandTranslator {
    async fn translate(&self, text: &str) -> Result<String, TranslationError> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                TranslationError(format!("failed to start engine '{}': {}", self.command, e))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| TranslationError("engine stdin unavailable".to_string()))?;

        // Feed the segment from a separate task so a streaming engine cannot
        // deadlock against an unread output pipe
        let payload = text.to_string();
        let writer = tokio::spawn(async move {
            let _ = stdin.write_all(payload.as_bytes()).await;
            let _ = stdin.shutdown().await;
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| TranslationError(format!("engine did not finish: {}", e)))?;
        let _ = writer.await;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TranslationError(format!(
                "engine exited with {}: {}",
                output.status, stderr
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Pipeline state, advanced as the run progresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// No run started yet
    Idle,
    /// Input checked and format detected
    Opened,
    /// Segmentation finished
    Segmented,
    /// Per-segment translation loop in progress
    Translating,
    /// Refinement of the current segment in progress
    Refining,
    /// Output written
    Reconstructed,
    /// Run aborted on an error
    Failed,
    /// Run cancelled before reconstruction
    Cancelled,
}

/// Progress notifications emitted while a run progresses
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// Segment translation counters
    TranslationProgress {
        /// Segment being translated (1-based)
        current: usize,
        /// Total segments
        total: usize,
    },
    /// Forwarded refinement queue event for the current segment
    Refinement(RefinementEvent),
    /// Non-fatal condition the caller may want to surface
    Warning(String),
}

/// Summary of a completed run
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Number of segments translated
    pub segments: usize,
    /// Number of segments whose text was improved by refinement
    pub refined_segments: usize,
    /// Where the reconstructed document was written
    pub output_path: PathBuf,
}

/// One document translation run
pub struct DocumentPipeline {
    input_path: PathBuf,
    output_path: PathBuf,
    config: Config,
    state: PipelineState,
    events: Option<UnboundedSender<PipelineEvent>>,
    cancel: CancelFlag,
    provider_override: Option<Box<dyn providers::RefinementProvider>>,
}

impl DocumentPipeline {
    /// Create a pipeline for one input/output pair
    pub fn new<P: AsRef<Path>>(input_path: P, output_path: P, config: Config) -> Self {
        Self {
            input_path: input_path.as_ref().to_path_buf(),
            output_path: output_path.as_ref().to_path_buf(),
            config,
            state: PipelineState::Idle,
            events: None,
            cancel: CancelFlag::new(),
            provider_override: None,
        }
    }

    /// Attach an event channel for progress reporting
    pub fn with_events(mut self, events: UnboundedSender<PipelineEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Use a specific refinement provider instead of the configured one
    pub fn with_refinement_provider(
        mut self,
        provider: Box<dyn providers::RefinementProvider>,
    ) -> Self {
        self.provider_override = Some(provider);
        self
    }

    /// Current pipeline state
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Handle used to cancel this run from another task
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Run the whole pipeline to completion.
    ///
    /// Translation errors abort the run; refinement errors degrade to the
    /// unrefined machine translation. Returns `AppError::Cancelled` when the
    /// cancel flag was raised, without writing any output.
    pub async fn run(&mut self, translator: &dyn Translator) -> Result<PipelineReport, AppError> {
        if self.state != PipelineState::Idle {
            return Err(AppError::Unknown(
                "a run is already active on this pipeline".to_string(),
            ));
        }

        let result = self.run_inner(translator).await;
        self.state = match &result {
            Ok(_) => PipelineState::Reconstructed,
            Err(AppError::Cancelled) => PipelineState::Cancelled,
            Err(_) => PipelineState::Failed,
        };
        result
    }

    async fn run_inner(&mut self, translator: &dyn Translator) -> Result<PipelineReport, AppError> {
        if !self.input_path.exists() {
            return Err(AppError::Document(DocumentError::Open(format!(
                "input file does not exist: {}",
                self.input_path.display()
            ))));
        }

        let format = DocumentFormat::from_path(&self.input_path).map_err(AppError::Document)?;
        self.state = PipelineState::Opened;

        let segments = Segmenter::segment(&self.input_path).await?;
        self.state = PipelineState::Segmented;
        info!(
            "Segmented {} into {} segments",
            self.input_path.display(),
            segments.len()
        );

        // Refinement queue, shared across segments of this run
        let queue = if self.config.refinement.enabled {
            let (refine_tx, mut refine_rx) = unbounded_channel();
            let forward = self.events.clone();
            tokio::spawn(async move {
                while let Some(event) = refine_rx.recv().await {
                    if let Some(forward) = &forward {
                        let _ = forward.send(PipelineEvent::Refinement(event));
                    }
                }
            });

            let provider = self
                .provider_override
                .take()
                .unwrap_or_else(|| providers::create_provider(&self.config.refinement));
            info!("Refinement enabled via {}", provider.name());
            Some(
                RefinementQueue::new(
                    provider,
                    self.config.source_language.clone(),
                    self.config.target_language.clone(),
                    self.config.refinement.chunk_chars,
                )
                .with_events(refine_tx),
            )
        } else {
            None
        };

        let total = segments.len();
        let mut translated_segments: Vec<Segment> = Vec::with_capacity(total);
        let mut refined_count = 0usize;

        for (i, seg) in segments.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(AppError::Cancelled);
            }

            self.state = PipelineState::Translating;
            self.emit(PipelineEvent::TranslationProgress {
                current: i + 1,
                total,
            });
            debug!("Translating {}", seg);

            let translated_text = translator
                .translate(&seg.text)
                .await
                .map_err(AppError::Translation)?;

            if self.cancel.is_cancelled() {
                return Err(AppError::Cancelled);
            }

            let mut translated = seg.clone();
            translated.text = translated_text;

            if let Some(queue) = &queue {
                if !translated.text.is_empty() {
                    self.state = PipelineState::Refining;
                    match queue.refine(&seg.text, &translated.text, &self.cancel).await {
                        RefinementOutcome::Refined(text) => {
                            if !text.is_empty() {
                                translated.text = text;
                                refined_count += 1;
                            }
                        }
                        RefinementOutcome::Halted { text, reason } => {
                            // Chunks refined before the backend gave up stand;
                            // the rest keep the machine translation
                            self.emit(PipelineEvent::Warning(format!(
                                "refinement stopped: {}",
                                reason
                            )));
                            warn!("Refinement stopped for {}: {}", seg, reason);
                            if !text.is_empty() {
                                translated.text = text;
                            }
                        }
                        RefinementOutcome::Nothing => {}
                        RefinementOutcome::Cancelled => return Err(AppError::Cancelled),
                    }
                }
            }

            translated_segments.push(translated);
        }

        if self.cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        Reconstructor::reconstruct(
            format,
            &self.input_path,
            &segments,
            &translated_segments,
            &self.output_path,
        )
        .map_err(AppError::Document)?;

        info!("Saved translated document to {}", self.output_path.display());
        Ok(PipelineReport {
            segments: total,
            refined_segments: refined_count,
            output_path: self.output_path.clone(),
        })
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}

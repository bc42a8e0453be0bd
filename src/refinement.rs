/*!
 * Refinement queue for AI post-editing of machine translations.
 *
 * A translated segment is split into request-sized chunks which are sent to
 * the configured LLM backend strictly one at a time, in index order. Each
 * completed chunk updates a best-effort full text that is emitted as a partial
 * result, so long refinements stay observable. Cancellation aborts the
 * in-flight request and clears all chunk state.
 */

use log::{debug, error, warn};
use tokio::sync::mpsc::UnboundedSender;

use crate::errors::ProviderError;
use crate::pipeline::CancelFlag;
use crate::providers::RefinementProvider;

/// Characters of the previous chunk's source carried as prompt context
const CONTEXT_TAIL_CHARS: usize = 300;

/// One refinement work item, a sub-division of a segment's translated text
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Position in the queue
    pub index: usize,
    /// Source-language text of this chunk
    pub source_text: String,
    /// Machine translation of this chunk
    pub machine_text: String,
    /// Best known translation; starts as the machine translation and is
    /// overwritten in place when the backend returns an improvement
    pub refined_text: String,
    /// Whether this chunk has been processed (successfully or not)
    pub completed: bool,
}

/// Progress notifications emitted while the queue runs
#[derive(Debug, Clone)]
pub enum RefinementEvent {
    /// Chunk completion counters
    Progress {
        /// Chunks processed so far
        completed: usize,
        /// Total chunks in this refinement
        total: usize,
    },
    /// Best-effort full text after a chunk completed
    Partial(String),
}

/// Terminal state of one refinement call
#[derive(Debug, Clone, PartialEq)]
pub enum RefinementOutcome {
    /// Every chunk was processed; the refined full text
    Refined(String),
    /// The backend reported an explicit error; remaining chunks were skipped
    /// and the text keeps the machine translation for them
    Halted {
        /// Best-effort text at the point the queue stopped
        text: String,
        /// Backend-reported reason
        reason: String,
    },
    /// Nothing to refine (empty source)
    Nothing,
    /// The run was cancelled; all chunk state was cleared
    Cancelled,
}

/// Sequential refinement queue over one provider
pub struct RefinementQueue {
    provider: Box<dyn RefinementProvider>,
    source_language: String,
    target_language: String,
    chunk_chars: usize,
    events: Option<UnboundedSender<RefinementEvent>>,
}

impl RefinementQueue {
    /// Create a queue over the given provider
    pub fn new(
        provider: Box<dyn RefinementProvider>,
        source_language: impl Into<String>,
        target_language: impl Into<String>,
        chunk_chars: usize,
    ) -> Self {
        Self {
            provider,
            source_language: source_language.into(),
            target_language: target_language.into(),
            chunk_chars,
            events: None,
        }
    }

    /// Attach an event channel for progress and partial results
    pub fn with_events(mut self, events: UnboundedSender<RefinementEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Split a source/machine-translation pair into queue chunks.
    ///
    /// Both texts are walked line by line in lockstep up to the longer line
    /// count; a chunk closes once the accumulated source exceeds `chunk_chars`
    /// characters, or at the final line pair.
    pub fn split_into_chunks(
        source_text: &str,
        machine_text: &str,
        chunk_chars: usize,
    ) -> Vec<Chunk> {
        let source_lines: Vec<&str> = source_text.split('\n').collect();
        let machine_lines: Vec<&str> = machine_text.split('\n').collect();
        let max_lines = source_lines.len().max(machine_lines.len());

        let mut chunks: Vec<Chunk> = Vec::new();
        let mut current_source = String::new();
        let mut current_machine = String::new();
        let mut source_chars = 0usize;

        for i in 0..max_lines {
            if let Some(line) = source_lines.get(i) {
                current_source.push_str(line);
                current_source.push('\n');
                source_chars += line.chars().count() + 1;
            }
            if let Some(line) = machine_lines.get(i) {
                current_machine.push_str(line);
                current_machine.push('\n');
            }

            if source_chars > chunk_chars || i == max_lines - 1 {
                let machine = current_machine.trim().to_string();
                chunks.push(Chunk {
                    index: chunks.len(),
                    source_text: current_source.trim().to_string(),
                    machine_text: machine.clone(),
                    refined_text: machine,
                    completed: false,
                });
                current_source.clear();
                current_machine.clear();
                source_chars = 0;
            }
        }

        chunks
    }

    /// Refine a machine translation against its source.
    ///
    /// Exactly one backend request is in flight at any time; chunks are
    /// dispatched in index order. A failed request leaves that chunk's machine
    /// translation in place and the queue continues; a backend-reported error
    /// stops the queue, keeping what completed so far.
    pub async fn refine(
        &self,
        source_text: &str,
        machine_text: &str,
        cancel: &CancelFlag,
    ) -> RefinementOutcome {
        if source_text.trim().is_empty() {
            return RefinementOutcome::Nothing;
        }

        let mut chunks = Self::split_into_chunks(source_text, machine_text, self.chunk_chars);
        if chunks.is_empty() {
            return RefinementOutcome::Nothing;
        }

        let total = chunks.len();
        debug!("Created {} refinement chunks", total);
        self.emit(RefinementEvent::Progress {
            completed: 0,
            total,
        });

        let mut completed_count = 0;

        // Strict sequencing for local backend stability: scan for the first
        // chunk not yet processed, dispatch it, wait.
        while let Some(next) = chunks.iter().position(|c| !c.completed) {
            if cancel.is_cancelled() {
                chunks.clear();
                return RefinementOutcome::Cancelled;
            }

            debug!("Sending refinement chunk {}", next);
            let prompt = self.build_prompt(&chunks, next);

            let result = tokio::select! {
                result = self.provider.complete(&prompt) => result,
                _ = cancel.cancelled() => {
                    chunks.clear();
                    return RefinementOutcome::Cancelled;
                }
            };

            match result {
                Ok(text) => {
                    let cleaned = strip_reasoning_tags(&text);
                    let cleaned = cleaned.trim();
                    if !cleaned.is_empty() {
                        chunks[next].refined_text = cleaned.to_string();
                    }
                }
                Err(ProviderError::Backend(reason)) => {
                    error!(
                        "{} reported error, stopping refinement: {}",
                        self.provider.name(),
                        reason
                    );
                    let text = concatenate_chunks(&chunks);
                    return RefinementOutcome::Halted { text, reason };
                }
                Err(e) => {
                    // This chunk keeps its machine translation
                    warn!("Refinement request for chunk {} failed: {}", next, e);
                }
            }

            chunks[next].completed = true;
            completed_count += 1;
            debug!("Chunk {} done, {}/{}", next, completed_count, total);

            self.emit(RefinementEvent::Partial(concatenate_chunks(&chunks)));
            self.emit(RefinementEvent::Progress {
                completed: completed_count,
                total,
            });
        }

        RefinementOutcome::Refined(concatenate_chunks(&chunks))
    }

    /// Build the backend prompt for one chunk
    fn build_prompt(&self, chunks: &[Chunk], index: usize) -> String {
        let context = if index > 0 {
            format!(
                "Context (previous): {}\n",
                tail_chars(&chunks[index - 1].source_text, CONTEXT_TAIL_CHARS)
            )
        } else {
            String::new()
        };

        format!(
            "### Instructions:\n\
             1. You are a professional translator. Compare the 'Source Text' ({src}) and the 'Machine Translation' ({tgt}).\n\
             2. Produce a high-quality, natural {tgt} version.\n\
             3. DO NOT use <think> tags. DO NOT provide any reasoning, notes, or explanations.\n\
             4. Output ONLY the final {tgt} refined text.\n\n\
             ### Context:\n{context}\n\
             ### Source Text ({src}):\n{source}\n\n\
             ### Machine Translation ({tgt} to improve):\n{machine}\n\n\
             ### Final Refined Translation ({tgt}):",
            src = self.source_language,
            tgt = self.target_language,
            context = context,
            source = chunks[index].source_text,
            machine = chunks[index].machine_text,
        )
    }

    fn emit(&self, event: RefinementEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}

/// Best-effort full text: every chunk's current translation in index order,
/// separated by a blank line
fn concatenate_chunks(chunks: &[Chunk]) -> String {
    let mut full_text = String::new();
    for chunk in chunks {
        full_text.push_str(&chunk.refined_text);
        full_text.push_str("\n\n");
    }
    full_text.trim().to_string()
}

/// Remove reasoning spans the backend emitted despite instructions.
///
/// Content between `<think>` and `</think>` is dropped; an unterminated span
/// truncates to the end of the text.
pub fn strip_reasoning_tags(text: &str) -> String {
    const OPEN_TAG: &str = "<think>";
    const CLOSE_TAG: &str = "</think>";

    let mut result = text.to_string();
    while let Some(start) = result.find(OPEN_TAG) {
        match result[start..].find(CLOSE_TAG) {
            Some(offset) => {
                result.replace_range(start..start + offset + CLOSE_TAG.len(), "");
            }
            None => {
                result.truncate(start);
            }
        }
    }
    result
}

/// Last `n` characters of a string, on char boundaries
fn tail_chars(s: &str, n: usize) -> &str {
    let count = s.chars().count();
    if count <= n {
        return s;
    }
    s.char_indices()
        .nth(count - n)
        .map(|(i, _)| &s[i..])
        .unwrap_or(s)
}

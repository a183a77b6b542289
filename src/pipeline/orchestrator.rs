//! Parallel chunk synthesis with retry, failover and cancellation.
//!
//! Chunks are dispatched across a rayon pool sized to the configured worker
//! count. Each chunk is routed to the accelerated primary backend when its
//! single slot is free, otherwise straight to the fallback. A chunk that
//! exhausts its attempt budget on the primary fails over to the fallback
//! once; a chunk that also exhausts the fallback is replaced with a silent
//! placeholder so chapter timing survives.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::audio::AudioSegment;
use crate::core::{PipelineError, Result, SynthesisError};
use crate::pipeline::progress::{ProgressEvent, ProgressSender};
use crate::synth::{BackendKind, RawAudio, SynthesisBackend};
use crate::text::TextChunk;

/// Below this many seconds of audio per input character the output is
/// considered truncated and the attempt retried.
const MIN_PLAUSIBLE_SECS_PER_CHAR: f64 = 0.005;

/// Placeholder silence length per input character for permanently failed
/// chunks. Roughly matches spoken pace so chapter offsets stay believable.
const PLACEHOLDER_SECS_PER_CHAR: f64 = 0.06;

/// Retry behaviour for a single backend.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per backend, including the first
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles each retry
    pub base_backoff: Duration,
    /// Wall-clock limit for one synthesis call
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    /// Backoff to sleep after the given 1-based attempt fails.
    fn backoff_after(&self, attempt: u32) -> Duration {
        self.base_backoff * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Cooperative cancellation flag shared between the caller and the workers.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Terminal state of one chunk. Either way the chunk contributes audio, so
/// downstream assembly never sees a hole.
#[derive(Debug, Clone)]
pub enum ChunkOutcome {
    Synthesized {
        segment: AudioSegment,
        backend: BackendKind,
    },
    Failed {
        placeholder: AudioSegment,
        error: SynthesisError,
    },
}

impl ChunkOutcome {
    fn segment(&self) -> &AudioSegment {
        match self {
            ChunkOutcome::Synthesized { segment, .. } => segment,
            ChunkOutcome::Failed { placeholder, .. } => placeholder,
        }
    }
}

/// One backend's verdict on a chunk after the retry loop.
enum Attempt {
    Done(AudioSegment),
    Exhausted(SynthesisError),
    /// The run was cancelled before the chunk reached a terminal state
    Cancelled,
}

/// One permanently failed chunk, for the end-of-run summary.
#[derive(Debug, Clone)]
pub struct FailureRecord {
    pub chapter: usize,
    pub seq: usize,
    pub error: SynthesisError,
}

/// Segments of one chapter whose chunks all reached a terminal state,
/// ordered by seq.
#[derive(Debug)]
pub struct CompletedChapter {
    pub chapter: usize,
    pub segments: Vec<AudioSegment>,
}

/// Result of an orchestrator run.
#[derive(Debug)]
pub struct RunReport {
    /// Chapters with every chunk terminal, in chapter order. On a cancelled
    /// run chapters with unfinished chunks are absent.
    pub chapters: Vec<CompletedChapter>,
    pub failures: Vec<FailureRecord>,
    /// Chunks that reached a terminal state
    pub completed: usize,
    /// Chunks in the plan
    pub total: usize,
    pub cancelled: bool,
}

pub struct SynthesisOrchestrator {
    primary: Option<Arc<dyn SynthesisBackend>>,
    /// Single-occupancy slot for the accelerated backend. Workers that lose
    /// the race go straight to the fallback instead of queueing.
    primary_slot: Mutex<()>,
    fallback: Arc<dyn SynthesisBackend>,
    policy: RetryPolicy,
    workers: usize,
    sample_rate: u32,
    progress: Option<ProgressSender>,
}

impl SynthesisOrchestrator {
    pub fn new(
        fallback: Arc<dyn SynthesisBackend>,
        policy: RetryPolicy,
        workers: usize,
        sample_rate: u32,
    ) -> Self {
        Self {
            primary: None,
            primary_slot: Mutex::new(()),
            fallback,
            policy,
            workers: workers.max(1),
            sample_rate,
            progress: None,
        }
    }

    pub fn with_primary(mut self, primary: Arc<dyn SynthesisBackend>) -> Self {
        self.primary = Some(primary);
        self
    }

    pub fn with_progress(mut self, progress: ProgressSender) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Synthesize all chunks and group the results by chapter.
    ///
    /// Chunks are processed in parallel on a dedicated pool; the indexed
    /// parallel map keeps results in plan order. Cancellation stops chunks
    /// that have not started; in-flight work finishes.
    pub fn run(
        &self,
        chunks: &[TextChunk],
        chapter_count: usize,
        cancel: &CancellationToken,
    ) -> Result<RunReport> {
        let total = chunks.len();
        info!(total, workers = self.workers, "starting synthesis");

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
            .map_err(|e| PipelineError::internal(format!("failed to build worker pool: {e}")))?;

        let done = AtomicUsize::new(0);
        let results: Vec<Option<ChunkOutcome>> = pool.install(|| {
            chunks
                .par_iter()
                .map(|chunk| {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    let outcome = self.process_chunk(chunk, cancel)?;
                    let completed = done.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(progress) = &self.progress {
                        progress.emit(ProgressEvent {
                            completed,
                            total,
                            chapter: chunk.chapter,
                        });
                    }
                    Some(outcome)
                })
                .collect()
        });

        Ok(self.collect(chunks, results, chapter_count, cancel.is_cancelled()))
    }

    fn collect(
        &self,
        chunks: &[TextChunk],
        results: Vec<Option<ChunkOutcome>>,
        chapter_count: usize,
        cancelled: bool,
    ) -> RunReport {
        let total = chunks.len();
        let completed = results.iter().filter(|r| r.is_some()).count();

        let mut failures = Vec::new();
        let mut per_chapter: Vec<Vec<AudioSegment>> =
            (0..chapter_count).map(|_| Vec::new()).collect();
        let mut chapter_incomplete = vec![false; chapter_count];

        for (chunk, result) in chunks.iter().zip(results) {
            match result {
                Some(outcome) => {
                    if let ChunkOutcome::Failed { error, .. } = &outcome {
                        failures.push(FailureRecord {
                            chapter: chunk.chapter,
                            seq: chunk.seq,
                            error: error.clone(),
                        });
                    }
                    per_chapter[chunk.chapter].push(outcome.segment().clone());
                }
                None => chapter_incomplete[chunk.chapter] = true,
            }
        }

        let chapters = per_chapter
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !chapter_incomplete[*i])
            .map(|(chapter, mut segments)| {
                segments.sort_by_key(|s| s.seq);
                CompletedChapter { chapter, segments }
            })
            .collect();

        if cancelled {
            warn!(completed, total, "synthesis cancelled");
        } else {
            info!(completed, total, failed = failures.len(), "synthesis finished");
        }

        RunReport {
            chapters,
            failures,
            completed,
            total,
            cancelled,
        }
    }

    /// Drive one chunk to a terminal state. Returns `None` when the run was
    /// cancelled before this chunk finished; a cancelled chunk is neither a
    /// success nor a failure.
    fn process_chunk(&self, chunk: &TextChunk, cancel: &CancellationToken) -> Option<ChunkOutcome> {
        if let Some(primary) = &self.primary {
            if let Ok(_slot) = self.primary_slot.try_lock() {
                match self.attempt_with_retries(primary.as_ref(), BackendKind::Primary, chunk, cancel)
                {
                    Attempt::Done(segment) => {
                        return Some(ChunkOutcome::Synthesized {
                            segment,
                            backend: BackendKind::Primary,
                        })
                    }
                    Attempt::Cancelled => return None,
                    Attempt::Exhausted(err) => {
                        warn!(
                            chunk = %chunk.id(),
                            error = %err,
                            "primary backend exhausted, failing over"
                        );
                    }
                }
            } else {
                debug!(chunk = %chunk.id(), "primary slot busy, using fallback");
            }
        }

        if cancel.is_cancelled() {
            return None;
        }

        match self.attempt_with_retries(self.fallback.as_ref(), BackendKind::Fallback, chunk, cancel)
        {
            Attempt::Done(segment) => Some(ChunkOutcome::Synthesized {
                segment,
                backend: BackendKind::Fallback,
            }),
            Attempt::Cancelled => None,
            Attempt::Exhausted(error) => {
                warn!(
                    chunk = %chunk.id(),
                    error = %error,
                    "chunk failed permanently, inserting placeholder silence"
                );
                let placeholder = AudioSegment::silence(
                    chunk.chapter,
                    chunk.seq,
                    chunk.cost() as f64 * PLACEHOLDER_SECS_PER_CHAR,
                    self.sample_rate,
                );
                Some(ChunkOutcome::Failed { placeholder, error })
            }
        }
    }

    /// Run one backend against a chunk, retrying transient failures up to
    /// the attempt budget. `Unavailable` and `Permanent` stop immediately;
    /// cancellation between attempts abandons the chunk.
    fn attempt_with_retries(
        &self,
        backend: &dyn SynthesisBackend,
        kind: BackendKind,
        chunk: &TextChunk,
        cancel: &CancellationToken,
    ) -> Attempt {
        let mut last = SynthesisError::Permanent("no attempts made".to_string());

        for attempt in 1..=self.policy.max_attempts {
            if attempt > 1 {
                if cancel.is_cancelled() {
                    return Attempt::Cancelled;
                }
                thread::sleep(self.policy.backoff_after(attempt - 1));
                if cancel.is_cancelled() {
                    return Attempt::Cancelled;
                }
            }

            let error = match backend.synthesize(&chunk.text, self.policy.attempt_timeout) {
                Ok(raw) => match self.accept(raw, chunk) {
                    Ok(segment) => {
                        debug!(chunk = %chunk.id(), backend = %kind, attempt, "chunk synthesized");
                        return Attempt::Done(segment);
                    }
                    Err(err) => err,
                },
                Err(err) => err,
            };

            debug!(
                chunk = %chunk.id(),
                backend = %kind,
                attempt,
                error = %error,
                "synthesis attempt failed"
            );

            if !error.is_retryable() {
                return Attempt::Exhausted(error);
            }
            last = error;
        }

        Attempt::Exhausted(last)
    }

    /// Sanity-check synthesized audio against the chunk that produced it.
    /// Implausibly short output is reported as transient so it gets retried.
    fn accept(
        &self,
        raw: RawAudio,
        chunk: &TextChunk,
    ) -> std::result::Result<AudioSegment, SynthesisError> {
        let cost = chunk.cost();
        if cost > 0 && raw.duration_secs() < cost as f64 * MIN_PLAUSIBLE_SECS_PER_CHAR {
            return Err(SynthesisError::Transient(format!(
                "implausibly short audio: {:.3}s for {cost} chars",
                raw.duration_secs()
            )));
        }
        Ok(AudioSegment {
            chapter: chunk.chapter,
            seq: chunk.seq,
            samples: raw.samples,
            sample_rate: raw.sample_rate,
        })
    }
}

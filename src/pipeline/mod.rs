//! End-to-end conversion pipeline: plan, synthesize, assemble, mux.

pub mod orchestrator;
pub mod progress;

pub use orchestrator::{
    CancellationToken, ChunkOutcome, CompletedChapter, FailureRecord, RetryPolicy, RunReport,
    SynthesisOrchestrator,
};
pub use progress::{progress_channel, ProgressEvent, ProgressSender};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::audio::{assemble_chapter, concat_book, ChapterAudio};
use crate::book::Book;
use crate::config::PipelineConfig;
use crate::core::Result;
use crate::output::{write_container, ContainerProfile, Manifest, ManifestBuilder};
use crate::synth::{EspeakBackend, PiperBackend, SynthesisBackend};
use crate::text::plan_book;

/// A fully synthesized book: normalized per-chapter audio plus the chapter
/// manifest, ready for muxing.
#[derive(Debug)]
pub struct RenderedBook {
    pub chapters: Vec<ChapterAudio>,
    pub manifest: Manifest,
    pub failures: Vec<FailureRecord>,
    pub completed: usize,
    pub total: usize,
    pub cancelled: bool,
}

/// Summary of a conversion, inspectable after the run.
#[derive(Debug)]
pub struct ConversionReport {
    /// Written container, absent when the run was cancelled
    pub output: Option<PathBuf>,
    pub manifest: Manifest,
    pub failures: Vec<FailureRecord>,
    pub completed: usize,
    pub total: usize,
    pub cancelled: bool,
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Instantiate backends from the configuration: an accelerated neural
    /// primary when a voice model is configured, and the process-based
    /// fallback that is always available.
    pub fn backends_from_config(
        &self,
    ) -> (Option<Arc<dyn SynthesisBackend>>, Arc<dyn SynthesisBackend>) {
        let primary: Option<Arc<dyn SynthesisBackend>> = self
            .config
            .model_path
            .as_ref()
            .map(|model| {
                Arc::new(PiperBackend::new(Path::new(model), self.config.use_gpu))
                    as Arc<dyn SynthesisBackend>
            });
        let fallback: Arc<dyn SynthesisBackend> =
            Arc::new(EspeakBackend::new(&self.config.voice, 1.0));
        (primary, fallback)
    }

    /// Synthesize and assemble the whole book without touching the muxer.
    pub fn render(
        &self,
        book: &Book,
        primary: Option<Arc<dyn SynthesisBackend>>,
        fallback: Arc<dyn SynthesisBackend>,
        progress: Option<ProgressSender>,
        cancel: &CancellationToken,
    ) -> Result<RenderedBook> {
        let chunks = plan_book(&book.chapters, self.config.max_chunk_chars);
        let mut expected = vec![0usize; book.chapters.len()];
        for chunk in &chunks {
            expected[chunk.chapter] += 1;
        }

        info!(
            title = %book.metadata.title,
            chapters = book.chapters.len(),
            chunks = chunks.len(),
            "planned synthesis"
        );

        let policy = RetryPolicy {
            max_attempts: self.config.max_attempts,
            base_backoff: self.config.retry_backoff(),
            attempt_timeout: self.config.attempt_timeout(),
        };
        let mut orchestrator = SynthesisOrchestrator::new(
            fallback,
            policy,
            self.config.effective_workers(),
            self.config.sample_rate,
        );
        if let Some(primary) = primary {
            orchestrator = orchestrator.with_primary(primary);
        }
        if let Some(progress) = progress {
            orchestrator = orchestrator.with_progress(progress);
        }

        let report = orchestrator.run(&chunks, book.chapters.len(), cancel)?;

        let mut chapters = Vec::with_capacity(report.chapters.len());
        for completed in report.chapters {
            let title = &book.chapters[completed.chapter].title;
            chapters.push(assemble_chapter(
                completed.chapter,
                title,
                completed.segments,
                expected[completed.chapter],
                self.config.sample_rate,
                self.config.target_rms_dbfs,
            )?);
        }

        let mut builder = ManifestBuilder::new(self.config.chapter_pause_secs);
        for chapter in &chapters {
            builder.push_chapter(chapter.index, &chapter.title, chapter.duration_secs());
        }
        let manifest = builder.build(&book.metadata);

        Ok(RenderedBook {
            chapters,
            manifest,
            failures: report.failures,
            completed: report.completed,
            total: report.total,
            cancelled: report.cancelled,
        })
    }

    /// Full conversion: render the book and mux the result into the
    /// configured container at `output`. A cancelled run writes nothing.
    pub fn convert(
        &self,
        book: &Book,
        primary: Option<Arc<dyn SynthesisBackend>>,
        fallback: Arc<dyn SynthesisBackend>,
        progress: Option<ProgressSender>,
        cancel: &CancellationToken,
        output: &Path,
    ) -> Result<ConversionReport> {
        let rendered = self.render(book, primary, fallback, progress, cancel)?;

        if rendered.cancelled {
            info!("conversion cancelled, no output written");
            return Ok(ConversionReport {
                output: None,
                manifest: rendered.manifest,
                failures: rendered.failures,
                completed: rendered.completed,
                total: rendered.total,
                cancelled: true,
            });
        }

        let profile: ContainerProfile = self.config.output_format.parse()?;
        let stream = concat_book(
            &rendered.chapters,
            self.config.chapter_pause_secs,
            self.config.sample_rate,
        );
        write_container(
            &stream,
            self.config.sample_rate,
            &rendered.manifest,
            book.cover.as_ref(),
            output,
            profile,
            &self.config.bitrate,
        )?;

        info!(
            output = %output.display(),
            duration_secs = rendered.manifest.total_duration_secs,
            "conversion complete"
        );

        Ok(ConversionReport {
            output: Some(output.to_path_buf()),
            manifest: rendered.manifest,
            failures: rendered.failures,
            completed: rendered.completed,
            total: rendered.total,
            cancelled: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::{BookMetadata, Chapter};
    use crate::synth::MockBackend;

    fn small_book() -> Book {
        Book::new(
            BookMetadata {
                title: "Test Book".to_string(),
                author: "Author".to_string(),
                language: "en".to_string(),
                date: None,
                description: None,
            },
            vec![
                Chapter::new(0, "One", "A first sentence. A second sentence."),
                Chapter::new(1, "Two", "Another chapter."),
            ],
        )
    }

    fn quick_config() -> PipelineConfig {
        PipelineConfig {
            retry_backoff_secs: 0.0,
            workers: 2,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_render_produces_all_chapters_and_manifest() {
        let pipeline = Pipeline::new(quick_config()).unwrap();
        let fallback = Arc::new(MockBackend::reliable("fb", 22050));
        let cancel = CancellationToken::new();

        let rendered = pipeline
            .render(&small_book(), None, fallback, None, &cancel)
            .unwrap();

        assert!(!rendered.cancelled);
        assert!(rendered.failures.is_empty());
        assert_eq!(rendered.chapters.len(), 2);
        assert_eq!(rendered.manifest.chapters.len(), 2);
        assert_eq!(rendered.manifest.title, "Test Book");
        // second chapter starts after the first plus one pause
        let first = &rendered.manifest.chapters[0];
        let second = &rendered.manifest.chapters[1];
        assert!((second.start_secs - (first.duration_secs + 2.0)).abs() < 1e-6);
    }

    #[test]
    fn test_render_cancelled_releases_nothing() {
        let pipeline = Pipeline::new(quick_config()).unwrap();
        let fallback = Arc::new(MockBackend::reliable("fb", 22050));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let rendered = pipeline
            .render(&small_book(), None, fallback, None, &cancel)
            .unwrap();

        assert!(rendered.cancelled);
        assert!(rendered.chapters.is_empty());
        assert_eq!(rendered.completed, 0);
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let mut config = quick_config();
        config.workers = 0;
        assert!(Pipeline::new(config).is_err());
    }
}

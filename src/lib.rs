//! EPUB to audiobook conversion pipeline.
//!
//! Takes an EPUB, cleans and chunks its text, synthesizes speech through a
//! primary accelerated backend with an always-available fallback, assembles
//! loudness-normalized chapters with inter-chapter pauses, and muxes the
//! result into a chaptered M4B or plain MP3.
//!
//! # Quick start
//!
//! ```no_run
//! use std::path::Path;
//! use epub_narrator::config::PipelineConfig;
//! use epub_narrator::pipeline::{CancellationToken, Pipeline};
//! use epub_narrator::text::TextCleaner;
//!
//! # fn main() -> epub_narrator::core::Result<()> {
//! let config = PipelineConfig::default();
//! let cleaner = TextCleaner::new(config.expand_abbreviations, config.remove_urls);
//! let book = epub_narrator::book::extract_book(Path::new("book.epub"), &cleaner)?;
//!
//! let pipeline = Pipeline::new(config)?;
//! let (primary, fallback) = pipeline.backends_from_config();
//! let cancel = CancellationToken::new();
//! let report = pipeline.convert(
//!     &book, primary, fallback, None, &cancel, Path::new("book.m4b"),
//! )?;
//! println!("{} of {} chunks synthesized", report.completed, report.total);
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod book;
pub mod config;
pub mod core;
pub mod output;
pub mod pipeline;
pub mod synth;
pub mod text;

pub use crate::book::{Book, BookMetadata, Chapter};
pub use crate::config::PipelineConfig;
pub use crate::core::{PipelineError, Result, SynthesisError};
pub use crate::pipeline::{CancellationToken, ConversionReport, Pipeline, RenderedBook};
pub use crate::synth::{RawAudio, SynthesisBackend};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

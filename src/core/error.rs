//! Structured error handling for the conversion pipeline
//!
//! Two layers of errors exist. [`SynthesisError`] covers a single synthesis
//! attempt and is absorbed by the orchestrator's retry/fallback policy; it
//! never escapes the orchestrator. [`PipelineError`] covers everything the
//! caller can observe: configuration, extraction, assembly integrity and
//! container writing.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias with PipelineError
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Fatal, caller-visible pipeline errors
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Configuration errors
    #[error("configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    /// EPUB extraction errors
    #[error("extraction error: {message}")]
    Extract {
        message: String,
        path: Option<PathBuf>,
    },

    /// Segment/chunk bookkeeping mismatch during assembly.
    ///
    /// This indicates an orchestrator bug rather than an environmental
    /// condition, so it aborts the run instead of being masked.
    #[error("assembly integrity violation in chapter {chapter}: {message}")]
    AssemblyIntegrity { chapter: usize, message: String },

    /// Muxing/tagging failures from the external container writer
    #[error("container write error: {message}")]
    ContainerWrite {
        message: String,
        path: Option<PathBuf>,
    },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal/bug errors
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl PipelineError {
    /// Shorthand for an internal error with a formatted message
    pub fn internal(message: impl Into<String>) -> Self {
        PipelineError::Internal {
            message: message.into(),
        }
    }
}

/// Per-attempt synthesis errors, classified for the retry policy
#[derive(Error, Debug, Clone)]
pub enum SynthesisError {
    /// Retryable on the same backend (engine hiccup, resource pressure)
    #[error("transient synthesis failure: {0}")]
    Transient(String),

    /// The backend cannot serve requests at all; fail over immediately
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The attempt exceeded its deadline; retryable
    #[error("synthesis attempt timed out after {0:?}")]
    Timeout(Duration),

    /// Not worth retrying on this backend
    #[error("synthesis failure: {0}")]
    Permanent(String),
}

impl SynthesisError {
    /// Whether the retry policy may re-dispatch this attempt on the same backend
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SynthesisError::Transient(_) | SynthesisError::Timeout(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::AssemblyIntegrity {
            chapter: 3,
            message: "expected 7 segments, got 6".to_string(),
        };
        assert!(err.to_string().contains("chapter 3"));
        assert!(err.to_string().contains("expected 7 segments"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(SynthesisError::Transient("oom".into()).is_retryable());
        assert!(SynthesisError::Timeout(Duration::from_secs(5)).is_retryable());
        assert!(!SynthesisError::Unavailable("gone".into()).is_retryable());
        assert!(!SynthesisError::Permanent("bad input".into()).is_retryable());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: PipelineError = io.into();
        assert!(matches!(err, PipelineError::Io(_)));
    }
}

//! Synthesis backends
//!
//! A [`SynthesisBackend`] turns one chunk of text into raw audio samples.
//! The set of backends is small and closed: the accelerated neural engine
//! ([`PiperBackend`]), the deterministic CPU fallback ([`EspeakBackend`]) and
//! a scripted [`MockBackend`] for tests. Selection between them is the
//! orchestrator's job, driven by its retry/fallback policy, never by runtime
//! type inspection.

pub mod mock;
pub mod process;

pub use mock::{MockBackend, MockResponse};
pub use process::{EspeakBackend, PiperBackend};

use std::time::Duration;

use crate::core::error::SynthesisError;

/// Which backend produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Accelerated neural engine (singleton device slot)
    Primary,
    /// Deterministic CPU synthesizer
    Fallback,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Primary => write!(f, "primary"),
            BackendKind::Fallback => write!(f, "fallback"),
        }
    }
}

/// Raw synthesis output for one chunk
#[derive(Debug, Clone)]
pub struct RawAudio {
    /// Mono samples, normalized to [-1, 1]
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl RawAudio {
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// A text-to-speech capability. One call synthesizes one chunk.
pub trait SynthesisBackend: Send + Sync {
    /// Stable identifier for logging and reports
    fn id(&self) -> &str;

    /// Synthesize `text` into raw audio, honoring the per-attempt deadline.
    ///
    /// Implementations classify failures via [`SynthesisError`] so the
    /// orchestrator can decide between retry, failover and giving up.
    fn synthesize(&self, text: &str, timeout: Duration) -> Result<RawAudio, SynthesisError>;
}

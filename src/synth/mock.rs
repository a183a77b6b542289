//! Scripted in-memory backend for orchestrator and pipeline tests
//!
//! Produces deterministic audio whose duration is proportional to the text
//! length, and can be scripted to fail a fixed number of times for specific
//! texts or to fail every call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::core::error::SynthesisError;
use crate::synth::{RawAudio, SynthesisBackend};

/// Seconds of audio produced per character of input text
const SECS_PER_CHAR: f64 = 0.05;

/// Scripted response for one call
#[derive(Debug, Clone)]
pub enum MockResponse {
    Ok,
    /// Succeed but return zero samples, as a truncated synthesis would
    Empty,
    Transient,
    Unavailable,
    Timeout,
}

/// Deterministic fake backend with per-text failure scripts
pub struct MockBackend {
    id: String,
    sample_rate: u32,
    /// Remaining scripted responses per text; once drained, calls succeed
    script: Mutex<HashMap<String, Vec<MockResponse>>>,
    fail_all: bool,
    calls: AtomicUsize,
}

impl MockBackend {
    /// A backend that always succeeds
    pub fn reliable(id: &str, sample_rate: u32) -> Self {
        Self {
            id: id.to_string(),
            sample_rate,
            script: Mutex::new(HashMap::new()),
            fail_all: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// A backend where every call fails with a transient error
    pub fn always_failing(id: &str) -> Self {
        Self {
            id: id.to_string(),
            sample_rate: 22050,
            script: Mutex::new(HashMap::new()),
            fail_all: true,
            calls: AtomicUsize::new(0),
        }
    }

    /// Script the next calls for `text` to produce `responses` in order,
    /// then succeed.
    pub fn script(self, text: &str, responses: Vec<MockResponse>) -> Self {
        {
            let mut script = self.script.lock().unwrap();
            let mut queue = responses;
            queue.reverse(); // popped from the back
            script.insert(text.to_string(), queue);
        }
        self
    }

    /// Total synthesize() invocations observed
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn audio_for(&self, text: &str) -> RawAudio {
        let samples_len =
            (text.chars().count() as f64 * SECS_PER_CHAR * self.sample_rate as f64) as usize;
        // Low-amplitude rectangle so loudness normalization has real signal
        let samples = vec![0.25f32; samples_len.max(1)];
        RawAudio {
            samples,
            sample_rate: self.sample_rate,
        }
    }
}

impl SynthesisBackend for MockBackend {
    fn id(&self) -> &str {
        &self.id
    }

    fn synthesize(&self, text: &str, _timeout: Duration) -> Result<RawAudio, SynthesisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_all {
            return Err(SynthesisError::Transient(format!(
                "{}: scripted failure",
                self.id
            )));
        }

        let scripted = {
            let mut script = self.script.lock().unwrap();
            script.get_mut(text).and_then(|queue| queue.pop())
        };

        match scripted {
            None | Some(MockResponse::Ok) => Ok(self.audio_for(text)),
            Some(MockResponse::Empty) => Ok(RawAudio {
                samples: Vec::new(),
                sample_rate: self.sample_rate,
            }),
            Some(MockResponse::Transient) => Err(SynthesisError::Transient(format!(
                "{}: scripted transient error",
                self.id
            ))),
            Some(MockResponse::Unavailable) => Err(SynthesisError::Unavailable(format!(
                "{}: scripted outage",
                self.id
            ))),
            Some(MockResponse::Timeout) => {
                Err(SynthesisError::Timeout(Duration::from_millis(1)))
            }
        }
    }
}

//! Subprocess-based synthesis engines
//!
//! Both shipped engines run as external processes and stream a WAV file to
//! stdout: `piper` (neural, optionally GPU-accelerated) and `espeak-ng`
//! (deterministic formant synthesizer, always available as fallback). The
//! per-attempt timeout is enforced by killing the child process.

use std::io::{Cursor, Read, Write};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::core::error::SynthesisError;
use crate::synth::{RawAudio, SynthesisBackend};

/// How the chunk text reaches the child process
#[derive(Debug, Clone, Copy)]
enum TextInput {
    Stdin,
    FinalArg,
}

/// Generic subprocess synthesis engine
#[derive(Debug)]
struct ProcessEngine {
    id: String,
    program: String,
    args: Vec<String>,
    text_input: TextInput,
}

impl ProcessEngine {
    fn synthesize(&self, text: &str, timeout: Duration) -> Result<RawAudio, SynthesisError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        match self.text_input {
            TextInput::Stdin => {
                command.stdin(Stdio::piped());
            }
            TextInput::FinalArg => {
                command.arg(text).stdin(Stdio::null());
            }
        }

        let mut child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SynthesisError::Unavailable(format!("{} not found on PATH", self.program))
            } else {
                SynthesisError::Transient(format!("failed to spawn {}: {}", self.program, e))
            }
        })?;

        // Feed stdin from a separate thread so a full stdout pipe cannot
        // deadlock against an unread stdin.
        let stdin_writer = match (self.text_input, child.stdin.take()) {
            (TextInput::Stdin, Some(mut stdin)) => {
                let payload = text.as_bytes().to_vec();
                Some(std::thread::spawn(move || {
                    let _ = stdin.write_all(&payload);
                }))
            }
            _ => None,
        };

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| SynthesisError::Transient("child stdout not captured".to_string()))?;
        let stdout_reader = std::thread::spawn(move || {
            let mut bytes = Vec::new();
            let _ = stdout.read_to_end(&mut bytes);
            bytes
        });

        let status = wait_with_deadline(&mut child, timeout)?;

        if let Some(writer) = stdin_writer {
            let _ = writer.join();
        }
        let bytes = stdout_reader
            .join()
            .map_err(|_| SynthesisError::Transient("stdout reader thread panicked".to_string()))?;

        if !status.success() {
            return Err(SynthesisError::Transient(format!(
                "{} exited with {}",
                self.program, status
            )));
        }

        debug!(engine = %self.id, bytes = bytes.len(), "decoded engine output");
        decode_wav(&bytes)
    }
}

/// Poll the child until it exits or the deadline passes; kill on expiry
fn wait_with_deadline(
    child: &mut Child,
    timeout: Duration,
) -> Result<std::process::ExitStatus, SynthesisError> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(SynthesisError::Timeout(timeout));
                }
                std::thread::sleep(Duration::from_millis(10));
            }
            Err(e) => {
                return Err(SynthesisError::Transient(format!(
                    "waiting on synthesis process failed: {}",
                    e
                )))
            }
        }
    }
}

/// Decode a WAV byte stream into mono f32 samples
fn decode_wav(bytes: &[u8]) -> Result<RawAudio, SynthesisError> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| SynthesisError::Transient(format!("engine produced invalid WAV: {}", e)))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
        }
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>(),
    }
    .map_err(|e| SynthesisError::Transient(format!("WAV sample decode failed: {}", e)))?;

    // Downmix to mono if the engine produced multiple channels
    let samples: Vec<f32> = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    if samples.is_empty() {
        return Err(SynthesisError::Transient(
            "engine produced empty audio".to_string(),
        ));
    }

    Ok(RawAudio {
        samples,
        sample_rate: spec.sample_rate,
    })
}

/// Accelerated neural engine via the `piper` binary.
///
/// Treated by the orchestrator as a singleton exclusive resource: at most
/// one chunk in flight, regardless of the worker pool size.
pub struct PiperBackend {
    engine: ProcessEngine,
}

impl PiperBackend {
    pub fn new(model: &Path, use_gpu: bool) -> Self {
        let mut args = vec![
            "--model".to_string(),
            model.display().to_string(),
            "--output-file".to_string(),
            "-".to_string(),
        ];
        if use_gpu {
            args.push("--cuda".to_string());
        }
        Self {
            engine: ProcessEngine {
                id: "piper".to_string(),
                program: "piper".to_string(),
                args,
                text_input: TextInput::Stdin,
            },
        }
    }
}

impl SynthesisBackend for PiperBackend {
    fn id(&self) -> &str {
        &self.engine.id
    }

    fn synthesize(&self, text: &str, timeout: Duration) -> Result<RawAudio, SynthesisError> {
        self.engine.synthesize(text, timeout)
    }
}

/// Deterministic CPU fallback via `espeak-ng`
pub struct EspeakBackend {
    engine: ProcessEngine,
}

impl EspeakBackend {
    /// `voice` is an espeak voice/language code (e.g. "en"), `speed` a
    /// multiplier on the default 175 wpm speaking rate.
    pub fn new(voice: &str, speed: f32) -> Self {
        let wpm = (175.0 * speed.clamp(0.5, 2.0)) as u32;
        Self {
            engine: ProcessEngine {
                id: "espeak-ng".to_string(),
                program: "espeak-ng".to_string(),
                args: vec![
                    "--stdout".to_string(),
                    "-v".to_string(),
                    voice.to_string(),
                    "-s".to_string(),
                    wpm.to_string(),
                ],
                text_input: TextInput::FinalArg,
            },
        }
    }
}

impl SynthesisBackend for EspeakBackend {
    fn id(&self) -> &str {
        &self.engine.id
    }

    fn synthesize(&self, text: &str, timeout: Duration) -> Result<RawAudio, SynthesisError> {
        self.engine.synthesize(text, timeout)
    }
}

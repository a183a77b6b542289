//! Pipeline configuration with file and environment layering.
//!
//! Precedence, lowest to highest: built-in defaults, JSON config file,
//! `EPUB_*` environment variables, CLI flags (applied by the binary).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{PipelineError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Voice identifier passed to the fallback synthesizer
    #[serde(default = "default_voice")]
    pub voice: String,

    /// Path to the primary backend's voice model, if one is installed
    #[serde(default)]
    pub model_path: Option<String>,

    /// Use GPU acceleration for the primary backend
    #[serde(default)]
    pub use_gpu: bool,

    /// Upper bound on characters per synthesis chunk
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,

    /// Synthesis worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Total attempts per backend per chunk
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff before the first retry; doubles per retry
    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: f64,

    /// Wall-clock limit for one synthesis call
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: f64,

    /// Silence inserted between chapters
    #[serde(default = "default_chapter_pause_secs")]
    pub chapter_pause_secs: f64,

    /// Pipeline sample rate; backend output is resampled to this
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Loudness target for chapter normalization
    #[serde(default = "default_target_rms_dbfs")]
    pub target_rms_dbfs: f32,

    /// Output container: "m4b" or "mp3"
    #[serde(default = "default_output_format")]
    pub output_format: String,

    /// Encoder bitrate, e.g. "128k"
    #[serde(default = "default_bitrate")]
    pub bitrate: String,

    /// Expand common abbreviations during text cleanup
    #[serde(default = "default_true")]
    pub expand_abbreviations: bool,

    /// Strip URLs and email addresses during text cleanup
    #[serde(default = "default_true")]
    pub remove_urls: bool,
}

fn default_voice() -> String {
    "en".to_string()
}

fn default_max_chunk_chars() -> usize {
    500
}

fn default_workers() -> usize {
    2
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_backoff_secs() -> f64 {
    1.0
}

fn default_attempt_timeout_secs() -> f64 {
    120.0
}

fn default_chapter_pause_secs() -> f64 {
    2.0
}

fn default_sample_rate() -> u32 {
    22050
}

fn default_target_rms_dbfs() -> f32 {
    -20.0
}

fn default_output_format() -> String {
    "m4b".to_string()
}

fn default_bitrate() -> String {
    "128k".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            voice: default_voice(),
            model_path: None,
            use_gpu: false,
            max_chunk_chars: default_max_chunk_chars(),
            workers: default_workers(),
            max_attempts: default_max_attempts(),
            retry_backoff_secs: default_retry_backoff_secs(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
            chapter_pause_secs: default_chapter_pause_secs(),
            sample_rate: default_sample_rate(),
            target_rms_dbfs: default_target_rms_dbfs(),
            output_format: default_output_format(),
            bitrate: default_bitrate(),
            expand_abbreviations: true,
            remove_urls: true,
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON config file; absent fields fall back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| PipelineError::Config {
            message: format!("failed to read config file: {e}"),
            path: Some(path.to_path_buf()),
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| PipelineError::Config {
            message: format!("invalid config JSON: {e}"),
            path: Some(path.to_path_buf()),
        })?;
        debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Apply `EPUB_*` environment variable overrides on top of this config.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    fn apply_env_from(&mut self, get: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = get("EPUB_VOICE") {
            self.voice = v;
        }
        if let Some(v) = get("EPUB_MODEL_PATH") {
            self.model_path = Some(v);
        }
        if let Some(v) = get("EPUB_USE_GPU") {
            self.use_gpu = parse_env("EPUB_USE_GPU", &v)?;
        }
        if let Some(v) = get("EPUB_MAX_CHUNK_CHARS") {
            self.max_chunk_chars = parse_env("EPUB_MAX_CHUNK_CHARS", &v)?;
        }
        if let Some(v) = get("EPUB_WORKERS") {
            self.workers = parse_env("EPUB_WORKERS", &v)?;
        }
        if let Some(v) = get("EPUB_MAX_ATTEMPTS") {
            self.max_attempts = parse_env("EPUB_MAX_ATTEMPTS", &v)?;
        }
        if let Some(v) = get("EPUB_CHAPTER_PAUSE_SECS") {
            self.chapter_pause_secs = parse_env("EPUB_CHAPTER_PAUSE_SECS", &v)?;
        }
        if let Some(v) = get("EPUB_SAMPLE_RATE") {
            self.sample_rate = parse_env("EPUB_SAMPLE_RATE", &v)?;
        }
        if let Some(v) = get("EPUB_OUTPUT_FORMAT") {
            self.output_format = v;
        }
        if let Some(v) = get("EPUB_BITRATE") {
            self.bitrate = v;
        }
        Ok(())
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_chars == 0 {
            return Err(config_err("max_chunk_chars must be at least 1"));
        }
        if self.workers == 0 {
            return Err(config_err("workers must be at least 1"));
        }
        if self.max_attempts == 0 {
            return Err(config_err("max_attempts must be at least 1"));
        }
        if self.sample_rate == 0 {
            return Err(config_err("sample_rate must be positive"));
        }
        if self.chapter_pause_secs < 0.0 {
            return Err(config_err("chapter_pause_secs must not be negative"));
        }
        if self.target_rms_dbfs >= 0.0 {
            return Err(config_err("target_rms_dbfs must be below 0 dBFS"));
        }
        self.output_format
            .parse::<crate::output::ContainerProfile>()?;
        Ok(())
    }

    /// Worker count actually used, capped at the machine's logical cores.
    pub fn effective_workers(&self) -> usize {
        self.workers.min(num_cpus::get().max(1)).max(1)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs_f64(self.retry_backoff_secs.max(0.0))
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.attempt_timeout_secs.max(1.0))
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| PipelineError::Config {
        message: format!("invalid value '{value}' for {name}"),
        path: None,
    })
}

fn config_err(message: &str) -> PipelineError {
    PipelineError::Config {
        message: message.to_string(),
        path: None,
    }
}

//! Final container muxing through ffmpeg.
//!
//! The assembled stream is staged as a temporary WAV, then encoded into the
//! requested container with chapter marks, tags and cover art. A failed mux
//! never leaves a partial output file behind.

use std::io::ErrorKind;
use std::path::Path;
use std::process::Command;
use std::str::FromStr;

use tracing::{debug, info, warn};

use crate::audio::wav::write_wav;
use crate::book::Cover;
use crate::core::{PipelineError, Result};
use crate::output::manifest::Manifest;

/// Target container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerProfile {
    /// MP4 audiobook with embedded chapter marks
    M4b,
    /// Plain MP3 with ID3 tags, no chapter marks
    Mp3,
}

impl ContainerProfile {
    pub fn extension(&self) -> &'static str {
        match self {
            ContainerProfile::M4b => "m4b",
            ContainerProfile::Mp3 => "mp3",
        }
    }
}

impl FromStr for ContainerProfile {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "m4b" | "m4a" => Ok(ContainerProfile::M4b),
            "mp3" => Ok(ContainerProfile::Mp3),
            other => Err(PipelineError::Config {
                message: format!("unsupported output format '{other}' (expected m4b or mp3)"),
                path: None,
            }),
        }
    }
}

/// Mux the assembled stream into its final container at `output`.
pub fn write_container(
    samples: &[f32],
    sample_rate: u32,
    manifest: &Manifest,
    cover: Option<&Cover>,
    output: &Path,
    profile: ContainerProfile,
    bitrate: &str,
) -> Result<()> {
    let staging = tempfile::tempdir().map_err(|e| PipelineError::ContainerWrite {
        message: format!("failed to create staging directory: {e}"),
        path: Some(output.to_path_buf()),
    })?;

    let wav_path = staging.path().join("book.wav");
    write_wav(&wav_path, samples, sample_rate)?;
    debug!(path = %wav_path.display(), "staged assembled stream");

    let meta_path = staging.path().join("ffmetadata.txt");
    std::fs::write(&meta_path, manifest.to_ffmetadata())?;

    let cover_path = match cover {
        Some(cover) => {
            let path = staging.path().join(format!("cover.{}", cover.extension()));
            std::fs::write(&path, &cover.data)?;
            Some(path)
        }
        None => None,
    };

    let mut cmd = Command::new("ffmpeg");
    cmd.arg("-y").arg("-i").arg(&wav_path);
    cmd.arg("-i").arg(&meta_path);
    if let Some(cover_path) = &cover_path {
        cmd.arg("-i").arg(cover_path);
    }
    cmd.arg("-map_metadata").arg("1");
    cmd.arg("-map").arg("0:a");
    if cover_path.is_some() {
        cmd.arg("-map").arg("2:v");
        cmd.arg("-c:v").arg("copy");
        cmd.arg("-disposition:v:0").arg("attached_pic");
    }

    match profile {
        ContainerProfile::M4b => {
            cmd.arg("-c:a").arg("aac");
            cmd.arg("-b:a").arg(bitrate);
            cmd.arg("-f").arg("mp4");
        }
        ContainerProfile::Mp3 => {
            cmd.arg("-c:a").arg("libmp3lame");
            cmd.arg("-b:a").arg(bitrate);
            cmd.arg("-id3v2_version").arg("3");
        }
    }

    cmd.arg("-metadata").arg(format!("title={}", manifest.title));
    cmd.arg("-metadata").arg(format!("artist={}", manifest.author));
    cmd.arg("-metadata").arg(format!("album={}", manifest.title));
    cmd.arg(output);

    info!(output = %output.display(), format = profile.extension(), "muxing container");

    let result = cmd.output();
    match result {
        Ok(status) if status.status.success() => Ok(()),
        Ok(status) => {
            remove_partial(output);
            let stderr = String::from_utf8_lossy(&status.stderr);
            Err(PipelineError::ContainerWrite {
                message: format!(
                    "ffmpeg exited with {}: {}",
                    status.status,
                    last_lines(&stderr, 5)
                ),
                path: Some(output.to_path_buf()),
            })
        }
        Err(e) => {
            remove_partial(output);
            let message = if e.kind() == ErrorKind::NotFound {
                "ffmpeg not found on PATH".to_string()
            } else {
                format!("failed to run ffmpeg: {e}")
            };
            Err(PipelineError::ContainerWrite {
                message,
                path: Some(output.to_path_buf()),
            })
        }
    }
}

fn remove_partial(output: &Path) {
    if output.exists() {
        if let Err(e) = std::fs::remove_file(output) {
            warn!(path = %output.display(), error = %e, "failed to remove partial output");
        } else {
            debug!(path = %output.display(), "removed partial output");
        }
    }
}

fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_parsing() {
        assert_eq!("m4b".parse::<ContainerProfile>().unwrap(), ContainerProfile::M4b);
        assert_eq!("M4A".parse::<ContainerProfile>().unwrap(), ContainerProfile::M4b);
        assert_eq!("mp3".parse::<ContainerProfile>().unwrap(), ContainerProfile::Mp3);
        assert!("ogg".parse::<ContainerProfile>().is_err());
    }

    #[test]
    fn test_profile_extension() {
        assert_eq!(ContainerProfile::M4b.extension(), "m4b");
        assert_eq!(ContainerProfile::Mp3.extension(), "mp3");
    }

    #[test]
    fn test_last_lines_truncates() {
        let text = "a\nb\nc\nd";
        assert_eq!(last_lines(text, 2), "c | d");
        assert_eq!(last_lines(text, 10), "a | b | c | d");
    }
}

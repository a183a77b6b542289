//! Chapter assembly: ordered concatenation, rate unification and loudness
//! normalization.

use tracing::{debug, warn};

use crate::audio::{resample, AudioSegment};
use crate::core::{PipelineError, Result};

/// Peak ceiling applied after RMS gain so normalization never clips.
const PEAK_CEILING: f32 = 0.98;

/// The assembled audio for one chapter.
#[derive(Debug, Clone)]
pub struct ChapterAudio {
    pub index: usize,
    pub title: String,
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl ChapterAudio {
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Assemble one chapter from its synthesized segments.
///
/// Segments must cover seq indices `0..expected` exactly once; a gap or
/// duplicate means the orchestrator lost track of a chunk and the result
/// would be silently corrupt, so that is a hard error rather than a
/// best-effort join. Segments at other sample rates are resampled to
/// `sample_rate`, and the joined audio is RMS-normalized to `target_dbfs`.
pub fn assemble_chapter(
    index: usize,
    title: &str,
    mut segments: Vec<AudioSegment>,
    expected: usize,
    sample_rate: u32,
    target_dbfs: f32,
) -> Result<ChapterAudio> {
    if segments.len() != expected {
        return Err(PipelineError::AssemblyIntegrity {
            chapter: index,
            message: format!("expected {expected} segments, got {}", segments.len()),
        });
    }

    segments.sort_by_key(|s| s.seq);
    for (i, seg) in segments.iter().enumerate() {
        if seg.seq != i {
            return Err(PipelineError::AssemblyIntegrity {
                chapter: index,
                message: format!("segment sequence broken at position {i} (seq {})", seg.seq),
            });
        }
        if seg.chapter != index {
            return Err(PipelineError::AssemblyIntegrity {
                chapter: index,
                message: format!("segment from chapter {} mixed in", seg.chapter),
            });
        }
    }

    let mut samples = Vec::new();
    for seg in &segments {
        if seg.sample_rate != sample_rate {
            debug!(
                chapter = index,
                seq = seg.seq,
                from = seg.sample_rate,
                to = sample_rate,
                "resampling segment"
            );
            samples.extend(resample(&seg.samples, seg.sample_rate, sample_rate)?);
        } else {
            samples.extend_from_slice(&seg.samples);
        }
    }

    normalize_rms(&mut samples, target_dbfs);

    Ok(ChapterAudio {
        index,
        title: title.to_string(),
        samples,
        sample_rate,
    })
}

/// Concatenate finished chapters into one continuous stream, inserting
/// `pause_secs` of silence between consecutive chapters (never before the
/// first or after the last).
pub fn concat_book(chapters: &[ChapterAudio], pause_secs: f64, sample_rate: u32) -> Vec<f32> {
    let pause_len = (pause_secs * sample_rate as f64).round() as usize;
    let total: usize = chapters.iter().map(|c| c.samples.len()).sum::<usize>()
        + pause_len * chapters.len().saturating_sub(1);

    let mut out = Vec::with_capacity(total);
    for (i, chapter) in chapters.iter().enumerate() {
        if i > 0 {
            out.extend(std::iter::repeat(0.0).take(pause_len));
        }
        out.extend_from_slice(&chapter.samples);
    }
    out
}

/// Scale samples so their RMS level hits `target_dbfs`, capping the gain so
/// no sample exceeds [`PEAK_CEILING`]. Silence is left untouched.
fn normalize_rms(samples: &mut [f32], target_dbfs: f32) {
    if samples.is_empty() {
        return;
    }

    let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    let rms = (sum_sq / samples.len() as f64).sqrt() as f32;
    if rms < 1e-8 {
        return;
    }

    let target_linear = 10.0f32.powf(target_dbfs / 20.0);
    let mut gain = target_linear / rms;

    let peak = samples.iter().fold(0.0f32, |m, &s| m.max(s.abs()));
    if peak * gain > PEAK_CEILING {
        let capped = PEAK_CEILING / peak;
        warn!(
            requested_gain = gain,
            capped_gain = capped,
            "normalization gain capped to avoid clipping"
        );
        gain = capped;
    }

    for s in samples.iter_mut() {
        *s *= gain;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(chapter: usize, seq: usize, samples: Vec<f32>, rate: u32) -> AudioSegment {
        AudioSegment {
            chapter,
            seq,
            samples,
            sample_rate: rate,
        }
    }

    #[test]
    fn test_assemble_orders_by_seq() {
        let segments = vec![
            seg(0, 1, vec![0.2; 10], 22050),
            seg(0, 0, vec![0.4; 10], 22050),
        ];
        let out = assemble_chapter(0, "One", segments, 2, 22050, -20.0).unwrap();
        assert_eq!(out.samples.len(), 20);
        // first half comes from seq 0 which had the louder constant level
        assert!(out.samples[0] > out.samples[15]);
    }

    #[test]
    fn test_missing_segment_is_fatal() {
        let segments = vec![seg(0, 0, vec![0.1; 10], 22050)];
        let err = assemble_chapter(0, "One", segments, 2, 22050, -20.0).unwrap_err();
        assert!(matches!(err, PipelineError::AssemblyIntegrity { chapter: 0, .. }));
    }

    #[test]
    fn test_gap_in_sequence_is_fatal() {
        let segments = vec![
            seg(0, 0, vec![0.1; 10], 22050),
            seg(0, 2, vec![0.1; 10], 22050),
        ];
        let err = assemble_chapter(0, "One", segments, 2, 22050, -20.0).unwrap_err();
        assert!(matches!(err, PipelineError::AssemblyIntegrity { .. }));
    }

    #[test]
    fn test_foreign_chapter_segment_is_fatal() {
        let segments = vec![seg(3, 0, vec![0.1; 10], 22050)];
        let err = assemble_chapter(0, "One", segments, 1, 22050, -20.0).unwrap_err();
        assert!(matches!(err, PipelineError::AssemblyIntegrity { .. }));
    }

    #[test]
    fn test_mixed_rates_are_unified() {
        let segments = vec![
            seg(0, 0, vec![0.3; 16000], 16000),
            seg(0, 1, vec![0.3; 22050], 22050),
        ];
        let out = assemble_chapter(0, "One", segments, 2, 22050, -20.0).unwrap();
        // one second each after resampling, within the resampler's tolerance
        let len = out.samples.len() as i64;
        assert!((len - 44100).abs() < 500, "len {len}");
        assert_eq!(out.sample_rate, 22050);
    }

    #[test]
    fn test_empty_chapter_yields_empty_audio() {
        let out = assemble_chapter(5, "Blank", Vec::new(), 0, 22050, -20.0).unwrap();
        assert!(out.samples.is_empty());
        assert_eq!(out.duration_secs(), 0.0);
    }

    #[test]
    fn test_normalization_hits_target_rms() {
        let segments = vec![seg(0, 0, vec![0.01; 22050], 22050)];
        let out = assemble_chapter(0, "Quiet", segments, 1, 22050, -20.0).unwrap();
        let rms: f32 = (out.samples.iter().map(|&s| s * s).sum::<f32>()
            / out.samples.len() as f32)
            .sqrt();
        let target = 10.0f32.powf(-20.0 / 20.0);
        assert!((rms - target).abs() < 0.01, "rms {rms} vs target {target}");
    }

    #[test]
    fn test_normalization_never_clips() {
        // a single loud spike forces the gain cap
        let mut samples = vec![0.001; 22050];
        samples[0] = 0.9;
        let segments = vec![seg(0, 0, samples, 22050)];
        let out = assemble_chapter(0, "Spike", segments, 1, 22050, -10.0).unwrap();
        assert!(out.samples.iter().all(|&s| s.abs() <= PEAK_CEILING + 1e-6));
    }

    #[test]
    fn test_silence_is_not_amplified() {
        let segments = vec![seg(0, 0, vec![0.0; 1000], 22050)];
        let out = assemble_chapter(0, "Silent", segments, 1, 22050, -20.0).unwrap();
        assert!(out.samples.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_concat_inserts_pauses_between_chapters_only() {
        let chapters = vec![
            ChapterAudio {
                index: 0,
                title: "A".into(),
                samples: vec![0.1; 100],
                sample_rate: 1000,
            },
            ChapterAudio {
                index: 1,
                title: "B".into(),
                samples: vec![0.1; 100],
                sample_rate: 1000,
            },
            ChapterAudio {
                index: 2,
                title: "C".into(),
                samples: vec![0.1; 100],
                sample_rate: 1000,
            },
        ];
        let out = concat_book(&chapters, 2.0, 1000);
        // 3 chapters of 100 plus 2 pauses of 2000
        assert_eq!(out.len(), 300 + 2 * 2000);
    }

    #[test]
    fn test_concat_single_chapter_has_no_pause() {
        let chapters = vec![ChapterAudio {
            index: 0,
            title: "A".into(),
            samples: vec![0.1; 100],
            sample_rate: 1000,
        }];
        assert_eq!(concat_book(&chapters, 2.0, 1000).len(), 100);
    }

    #[test]
    fn test_concat_empty_book() {
        assert!(concat_book(&[], 2.0, 22050).is_empty());
    }
}

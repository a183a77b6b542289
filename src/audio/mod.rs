//! Audio processing: segment assembly, resampling and WAV I/O

pub mod assembler;
pub mod resampler;
pub mod wav;

pub use assembler::{assemble_chapter, concat_book, ChapterAudio};
pub use resampler::resample;

/// The audio result of synthesizing exactly one text chunk.
///
/// `chapter` and `seq` are copied from the chunk and form the join key used
/// for ordered reassembly.
#[derive(Debug, Clone)]
pub struct AudioSegment {
    pub chapter: usize,
    pub seq: usize,
    /// Mono samples, normalized to [-1, 1]
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioSegment {
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// A silent segment of the given duration, used as a placeholder for
    /// permanently failed chunks so chapter structure is preserved.
    pub fn silence(chapter: usize, seq: usize, duration_secs: f64, sample_rate: u32) -> Self {
        let len = (duration_secs * sample_rate as f64).round() as usize;
        Self {
            chapter,
            seq,
            samples: vec![0.0; len],
            sample_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_duration() {
        let seg = AudioSegment::silence(0, 0, 1.5, 22050);
        assert_eq!(seg.samples.len(), 33075);
        assert!((seg.duration_secs() - 1.5).abs() < 1e-6);
        assert!(seg.samples.iter().all(|&s| s == 0.0));
    }
}

//! Sample-rate conversion via rubato sinc interpolation.
//!
//! Backends may emit at different native rates (a neural model at 22.05 kHz
//! and a fallback synthesizer at 16 kHz, say). Everything is converted to the
//! pipeline rate before assembly so chapters are a single continuous stream.

use rubato::{
    calculate_cutoff, Resampler as RubatoResampler, SincFixedIn, SincInterpolationParameters,
    SincInterpolationType, WindowFunction,
};

use crate::core::{PipelineError, Result};

/// Frames fed to the resampler per pass
const CHUNK_SIZE: usize = 1024;

const SINC_LEN: usize = 128;

/// Resample mono samples from `from_rate` to `to_rate`.
///
/// Returns the input unchanged when rates match or the input is empty.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let window = WindowFunction::Blackman2;
    let params = SincInterpolationParameters {
        sinc_len: SINC_LEN,
        f_cutoff: calculate_cutoff(SINC_LEN, window),
        interpolation: SincInterpolationType::Quadratic,
        oversampling_factor: 256,
        window,
    };

    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.1, params, CHUNK_SIZE, 1)
        .map_err(|e| PipelineError::internal(format!("failed to create resampler: {e}")))?;

    let mut out = Vec::with_capacity((samples.len() as f64 * ratio) as usize + CHUNK_SIZE);
    let mut pos = 0;
    while pos + CHUNK_SIZE <= samples.len() {
        let input = [&samples[pos..pos + CHUNK_SIZE]];
        let frames = resampler
            .process(&input, None)
            .map_err(|e| PipelineError::internal(format!("resampling failed: {e}")))?;
        if let Some(channel) = frames.into_iter().next() {
            out.extend(channel);
        }
        pos += CHUNK_SIZE;
    }

    if pos < samples.len() {
        let tail = [&samples[pos..]];
        let frames = resampler
            .process_partial(Some(&tail), None)
            .map_err(|e| PipelineError::internal(format!("resampling failed: {e}")))?;
        if let Some(channel) = frames.into_iter().next() {
            out.extend(channel);
        }
    }

    // drain the sinc filter's delay line so the tail is not cut off
    let frames = resampler
        .process_partial::<&[f32]>(None, None)
        .map_err(|e| PipelineError::internal(format!("resampling failed: {e}")))?;
    if let Some(channel) = frames.into_iter().next() {
        out.extend(channel);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(len: usize, freq: f32, rate: f32) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / rate).sin())
            .collect()
    }

    #[test]
    fn test_identity_when_rates_match() {
        let input = vec![0.1, 0.2, 0.3];
        assert_eq!(resample(&input, 22050, 22050).unwrap(), input);
    }

    #[test]
    fn test_empty_input() {
        assert!(resample(&[], 16000, 22050).unwrap().is_empty());
    }

    #[test]
    fn test_upsample_length() {
        let input = sine(16000, 440.0, 16000.0);
        let out = resample(&input, 16000, 22050).unwrap();
        // one second in, roughly one second out
        assert!(out.len() > 20000 && out.len() < 24000, "len {}", out.len());
    }

    #[test]
    fn test_downsample_length() {
        let input = sine(44100, 440.0, 44100.0);
        let out = resample(&input, 44100, 22050).unwrap();
        assert!(out.len() > 20000 && out.len() < 24000, "len {}", out.len());
    }

    #[test]
    fn test_short_input_below_chunk_size() {
        let input = sine(300, 440.0, 16000.0);
        let out = resample(&input, 16000, 22050).unwrap();
        assert!(!out.is_empty());
        assert!(out.len() < 1000);
    }

    #[test]
    fn test_signal_amplitude_preserved() {
        // a mid-band tone should come through at close to its input level
        let input = sine(44100, 440.0, 44100.0);
        let out = resample(&input, 44100, 22050).unwrap();
        let peak = out.iter().fold(0.0f32, |m, &s| m.max(s.abs()));
        assert!(peak > 0.8 && peak < 1.2, "peak {peak}");
    }
}

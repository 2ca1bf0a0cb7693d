//! WAV decoding, down-mixing and resampling

use super::PreprocessError;
use crate::config::PreprocessingConfig;
use crate::types::NormalizedAudio;
use std::io::Cursor;

/// Decode a WAV clip into mono samples at `cfg.target_sample_rate`.
///
/// Supports integer PCM (8/16/24/32-bit) and 32-bit float. Clips longer than
/// `max_audio_secs` are truncated while decoding.
pub fn normalize_audio(bytes: &[u8], cfg: &PreprocessingConfig) -> Result<NormalizedAudio, PreprocessError> {
    if bytes.is_empty() {
        return Err(PreprocessError::Empty("audio"));
    }
    let reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| PreprocessError::AudioDecode(e.to_string()))?;
    let spec = reader.spec();
    if spec.channels == 0 || spec.sample_rate == 0 {
        return Err(PreprocessError::AudioDecode(format!(
            "invalid header: {} channels at {} Hz",
            spec.channels, spec.sample_rate
        )));
    }

    let channels = usize::from(spec.channels);
    let max_frames = (cfg.max_audio_secs * f64::from(spec.sample_rate)) as usize;
    let max_samples = max_frames.saturating_mul(channels);

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .take(max_samples)
            .collect::<Result<_, _>>()
            .map_err(|e| PreprocessError::AudioDecode(e.to_string()))?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .take(max_samples)
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()
                .map_err(|e| PreprocessError::AudioDecode(e.to_string()))?
        }
    };

    let mono = downmix(&interleaved, channels);
    let samples = resample_linear(&mono, spec.sample_rate, cfg.target_sample_rate);
    let duration_ms = samples.len() as u64 * 1000 / u64::from(cfg.target_sample_rate);
    if duration_ms < u64::from(cfg.min_audio_ms) {
        return Err(PreprocessError::AudioTooShort {
            duration_ms,
            min_ms: cfg.min_audio_ms,
        });
    }

    Ok(NormalizedAudio {
        sample_rate: cfg.target_sample_rate,
        samples,
        duration_ms,
    })
}

/// Average interleaved channels into one. Trailing partial frames are dropped.
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Linear-interpolation resampler.
pub fn resample_linear(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || input.is_empty() {
        return input.to_vec();
    }
    let out_len = (input.len() as u64 * u64::from(to_rate) / u64::from(from_rate)) as usize;
    let step = f64::from(from_rate) / f64::from(to_rate);
    let last = input.len() - 1;
    (0..out_len)
        .map(|i| {
            let pos = i as f64 * step;
            let idx = (pos.floor() as usize).min(last);
            let next = (idx + 1).min(last);
            let frac = (pos - idx as f64) as f32;
            input[idx] + (input[next] - input[idx]) * frac
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav(rate: u32, channels: u16, secs: f64) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut w = hound::WavWriter::new(&mut cursor, spec).unwrap();
            let frames = (secs * f64::from(rate)) as usize;
            for i in 0..frames {
                for c in 0..channels {
                    let v = if c == 0 { (i % 100) as i16 * 100 } else { 0 };
                    w.write_sample(v).unwrap();
                }
            }
            w.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_resample_length_matches_duration() {
        let clip = normalize_audio(&wav(44_100, 2, 1.0), &PreprocessingConfig::default()).unwrap();
        assert_eq!(clip.sample_rate, 16_000);
        assert!((clip.samples.len() as i64 - 16_000).abs() <= 1);
        assert_eq!(clip.duration_ms, 1000);
    }

    #[test]
    fn test_truncates_to_max_duration() {
        let cfg = PreprocessingConfig {
            max_audio_secs: 0.5,
            ..PreprocessingConfig::default()
        };
        let clip = normalize_audio(&wav(16_000, 1, 2.0), &cfg).unwrap();
        assert_eq!(clip.samples.len(), 8_000);
    }

    #[test]
    fn test_short_clip_rejected() {
        let err = normalize_audio(&wav(16_000, 1, 0.1), &PreprocessingConfig::default()).unwrap_err();
        assert!(matches!(err, PreprocessError::AudioTooShort { duration_ms: 100, .. }));
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let err = normalize_audio(b"definitely not RIFF", &PreprocessingConfig::default()).unwrap_err();
        assert!(matches!(err, PreprocessError::AudioDecode(_)));
    }

    #[test]
    fn test_downmix_averages() {
        assert_eq!(downmix(&[1.0, 0.0, 0.5, 0.5], 2), vec![0.5, 0.5]);
    }
}

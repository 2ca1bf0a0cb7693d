//! Acoustic cry analyzer
//!
//! Frame-level RMS loudness, zero-crossing rate and autocorrelation pitch over
//! 32 ms frames. A clip counts as crying when it is loud enough and enough of
//! its frames are voiced inside the infant-cry pitch band.

use crate::config::defaults::{AUDIO_FRAME_MS, AUDIO_VOICING_FLOOR_DBFS, AUDIO_VOICING_THRESHOLD};
use crate::config::AudioAnalyzerConfig;
use crate::types::{AudioFeatures, FeatureList, FeatureStatus, Modality, NormalizedAudio, SILENCE_DBFS};
use chrono::Utc;
use std::time::Instant;

/// Pitch search range (Hz)
const PITCH_SEARCH_MIN_HZ: f64 = 60.0;
const PITCH_SEARCH_MAX_HZ: f64 = 1_200.0;

pub struct AudioAnalyzer {
    cfg: AudioAnalyzerConfig,
}

struct FrameStats {
    rms: f64,
    zcr: f64,
    pitch_hz: Option<f64>,
}

fn to_dbfs(rms: f64) -> f64 {
    if rms <= 0.0 {
        return SILENCE_DBFS;
    }
    (20.0 * rms.log10()).max(SILENCE_DBFS)
}

fn rms(frame: &[f32]) -> f64 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum: f64 = frame.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    (sum / frame.len() as f64).sqrt()
}

fn zero_crossing_rate(frame: &[f32]) -> f64 {
    if frame.len() < 2 {
        return 0.0;
    }
    let crossings = frame
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    crossings as f64 / (frame.len() - 1) as f64
}

/// Strongest local autocorrelation peak within the search range.
fn autocorrelation_pitch(frame: &[f32], sample_rate: u32) -> Option<f64> {
    let sr = f64::from(sample_rate);
    let n = frame.len();
    let lag_min = ((sr / PITCH_SEARCH_MAX_HZ).floor() as usize).max(1);
    let lag_max = ((sr / PITCH_SEARCH_MIN_HZ).ceil() as usize).min(n.saturating_sub(2));
    if lag_min + 1 >= lag_max {
        return None;
    }

    let energy: f64 = frame.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    if energy <= f64::EPSILON {
        return None;
    }
    let r = |lag: usize| -> f64 {
        frame[..n - lag]
            .iter()
            .zip(&frame[lag..])
            .map(|(&a, &b)| f64::from(a) * f64::from(b))
            .sum::<f64>()
            / energy
    };

    let corr: Vec<f64> = (lag_min - 1..=lag_max + 1).map(r).collect();
    let mut best: Option<(usize, f64)> = None;
    for i in 1..corr.len() - 1 {
        let (prev, cur, next) = (corr[i - 1], corr[i], corr[i + 1]);
        if cur >= prev && cur >= next && best.map_or(true, |(_, b)| cur > b) {
            best = Some((lag_min - 1 + i, cur));
        }
    }
    match best {
        Some((lag, peak)) if peak >= AUDIO_VOICING_THRESHOLD => Some(sr / lag as f64),
        _ => None,
    }
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}

impl AudioAnalyzer {
    pub fn new(cfg: AudioAnalyzerConfig) -> Self {
        Self { cfg }
    }

    fn frame_stats(&self, audio: &NormalizedAudio) -> Vec<FrameStats> {
        let frame_len = (audio.sample_rate as usize * AUDIO_FRAME_MS as usize / 1000).max(1);
        audio
            .samples
            .chunks(frame_len)
            .filter(|f| f.len() == frame_len)
            .map(|frame| {
                let rms = rms(frame);
                let pitch_hz = if to_dbfs(rms) >= AUDIO_VOICING_FLOOR_DBFS {
                    autocorrelation_pitch(frame, audio.sample_rate)
                } else {
                    None
                };
                FrameStats {
                    rms,
                    zcr: zero_crossing_rate(frame),
                    pitch_hz,
                }
            })
            .collect()
    }

    /// Compute clip-level features.
    pub fn features(&self, audio: &NormalizedAudio) -> AudioFeatures {
        let frames = self.frame_stats(audio);
        if frames.is_empty() {
            return AudioFeatures {
                loudness_dbfs: to_dbfs(rms(&audio.samples)),
                zero_crossing_rate: zero_crossing_rate(&audio.samples),
                ..AudioFeatures::default()
            };
        }

        let mean_sq = frames.iter().map(|f| f.rms * f.rms).sum::<f64>() / frames.len() as f64;
        let loudness_dbfs = to_dbfs(mean_sq.sqrt());
        let zcr = frames.iter().map(|f| f.zcr).sum::<f64>() / frames.len() as f64;

        let band = self.cfg.cry_pitch_min_hz..=self.cfg.cry_pitch_max_hz;
        let mut voiced: Vec<f64> = frames.iter().filter_map(|f| f.pitch_hz).collect();
        let in_band = voiced.iter().filter(|p| band.contains(p)).count();
        let voiced_ratio = in_band as f64 / frames.len() as f64;
        let pitch_hz = median(&mut voiced);

        let loud_enough = loudness_dbfs >= self.cfg.cry_loudness_dbfs;
        let pitch_in_band = pitch_hz.is_some_and(|p| band.contains(&p));
        let cry_detected =
            loud_enough && pitch_in_band && voiced_ratio >= self.cfg.cry_min_voiced_ratio;

        // full confidence 10 dB above the threshold
        let loudness_factor =
            ((loudness_dbfs - self.cfg.cry_loudness_dbfs + 10.0) / 20.0).clamp(0.0, 1.0);
        let cry_confidence = if pitch_in_band {
            (voiced_ratio * loudness_factor).clamp(0.0, 1.0)
        } else {
            0.0
        };

        AudioFeatures {
            cry_detected,
            cry_confidence,
            loudness_dbfs,
            zero_crossing_rate: zcr,
            pitch_hz,
        }
    }

    pub fn analyze(&self, window_id: &str, audio: &NormalizedAudio) -> FeatureList {
        let started = Instant::now();
        let features = self.features(audio);
        FeatureList {
            modality: Modality::Audio,
            window_id: window_id.to_string(),
            produced_at: Utc::now(),
            analyzer: "acoustic".to_string(),
            status: FeatureStatus::Ok,
            features: features.to_map(),
            latency_ms: started.elapsed().as_millis() as u64,
        }
    }
}

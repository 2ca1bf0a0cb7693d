//! Data preprocessing (Phase 2)
//!
//! Turns raw frame/clip bytes into fixed-format inputs: images are sniffed,
//! size-checked and base64-encoded for the VLM; audio is decoded, down-mixed
//! and resampled to the analyzer rate.

pub mod audio;
pub mod image;

use crate::config::PreprocessingConfig;
use crate::types::{InputQuality, NormalizedInput, RawInput};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PreprocessError {
    #[error("empty {0} payload")]
    Empty(&'static str),

    #[error("image too large: {size} bytes (max {max})")]
    ImageTooLarge { size: usize, max: usize },

    #[error("unsupported image format")]
    UnsupportedImageFormat,

    #[error("image too small: {width}x{height} (min side {min})")]
    ImageTooSmall { width: u32, height: u32, min: u32 },

    #[error("audio decode failed: {0}")]
    AudioDecode(String),

    #[error("audio too short: {duration_ms} ms (min {min_ms} ms)")]
    AudioTooShort { duration_ms: u64, min_ms: u32 },

    #[error("no usable modality: {0}")]
    Unusable(String),
}

/// Normalise one raw window.
///
/// A bundle with one bad modality keeps the other and records the problem in
/// `quality.issues`. When nothing usable remains the window is rejected.
pub fn normalize(raw: RawInput, cfg: &PreprocessingConfig) -> Result<NormalizedInput, PreprocessError> {
    let mut issues = Vec::new();

    let image = raw
        .payload
        .frame_bytes()
        .and_then(|bytes| match image::normalize_image(bytes, cfg) {
            Ok(img) => Some(img),
            Err(e) => {
                issues.push(format!("image: {e}"));
                None
            }
        });

    let audio = raw
        .payload
        .audio_bytes()
        .and_then(|bytes| match audio::normalize_audio(bytes, cfg) {
            Ok(clip) => Some(clip),
            Err(e) => {
                issues.push(format!("audio: {e}"));
                None
            }
        });

    let quality = InputQuality {
        usable: image.is_some() || audio.is_some(),
        issues,
    };
    if !quality.usable {
        return Err(PreprocessError::Unusable(quality.issues.join("; ")));
    }

    Ok(NormalizedInput {
        id: raw.id,
        captured_at: raw.captured_at,
        source: raw.source,
        label: raw.label,
        image,
        audio,
        quality,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::{synthetic_clip, synthetic_frame};
    use crate::types::BabyState;
    use rand::SeedableRng;

    fn clip() -> Vec<u8> {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        synthetic_clip(BabyState::Asleep, 1.0, 16_000, &mut rng).unwrap()
    }

    #[test]
    fn test_bundle_keeps_good_modality() {
        let raw = RawInput::bundle("w", "test", b"not an image".to_vec(), clip());
        let n = normalize(raw, &PreprocessingConfig::default()).unwrap();
        assert!(n.image.is_none());
        assert!(n.audio.is_some());
        assert!(n.quality.usable);
        assert_eq!(n.quality.issues.len(), 1);
        assert!(n.quality.issues[0].starts_with("image:"));
    }

    #[test]
    fn test_bundle_with_both_good() {
        let frame = synthetic_frame(BabyState::Asleep, 64, 64);
        let raw = RawInput::bundle("w", "test", frame, clip()).with_label(Some("asleep".into()));
        let n = normalize(raw, &PreprocessingConfig::default()).unwrap();
        assert!(n.image.is_some() && n.audio.is_some());
        assert!(n.quality.issues.is_empty());
        assert_eq!(n.label.as_deref(), Some("asleep"));
    }

    #[test]
    fn test_unusable_frame_rejected() {
        let raw = RawInput::frame("w", "test", Vec::new());
        let err = normalize(raw, &PreprocessingConfig::default()).unwrap_err();
        assert!(matches!(err, PreprocessError::Unusable(ref m) if m.contains("empty image")));
    }
}

//! Acquisition and preprocessing types: RawInput (Phase 1), NormalizedInput (Phase 2)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Phase 1: Raw Input
// ============================================================================

/// Raw bytes for one acquisition window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawPayload {
    /// A single still frame. Video is supplied as a sequence of frames.
    Frame {
        #[serde(skip)]
        bytes: Vec<u8>,
        /// Where the frame came from (file path), used in logs and for extension hints
        hint_path: Option<String>,
    },
    /// A WAV audio clip
    AudioClip {
        #[serde(skip)]
        bytes: Vec<u8>,
    },
    /// A frame and an audio clip covering the same window
    Bundle {
        #[serde(skip)]
        frame: Vec<u8>,
        #[serde(skip)]
        audio: Vec<u8>,
    },
}

impl RawPayload {
    /// Image bytes, if this payload carries a frame
    pub fn frame_bytes(&self) -> Option<&[u8]> {
        match self {
            RawPayload::Frame { bytes, .. } => Some(bytes),
            RawPayload::Bundle { frame, .. } => Some(frame),
            RawPayload::AudioClip { .. } => None,
        }
    }

    /// Audio bytes, if this payload carries a clip
    pub fn audio_bytes(&self) -> Option<&[u8]> {
        match self {
            RawPayload::AudioClip { bytes } => Some(bytes),
            RawPayload::Bundle { audio, .. } => Some(audio),
            RawPayload::Frame { .. } => None,
        }
    }
}

/// One unit of raw input from a dataset or live source.
///
/// Ephemeral: consumed by preprocessing and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawInput {
    /// Window identifier (dataset id, file stem, or generated)
    pub id: String,
    /// When the data was captured (or replayed)
    pub captured_at: DateTime<Utc>,
    /// Source name ("dataset", "directory", "stdin", "synthetic")
    pub source: String,
    /// Ground-truth class label when replaying a labelled dataset
    #[serde(default)]
    pub label: Option<String>,
    pub payload: RawPayload,
}

impl RawInput {
    pub fn frame(id: impl Into<String>, source: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            captured_at: Utc::now(),
            source: source.into(),
            label: None,
            payload: RawPayload::Frame {
                bytes,
                hint_path: None,
            },
        }
    }

    pub fn audio(id: impl Into<String>, source: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            captured_at: Utc::now(),
            source: source.into(),
            label: None,
            payload: RawPayload::AudioClip { bytes },
        }
    }

    pub fn bundle(
        id: impl Into<String>,
        source: impl Into<String>,
        frame: Vec<u8>,
        audio: Vec<u8>,
    ) -> Self {
        Self {
            id: id.into(),
            captured_at: Utc::now(),
            source: source.into(),
            label: None,
            payload: RawPayload::Bundle { frame, audio },
        }
    }

    pub fn with_label(mut self, label: Option<String>) -> Self {
        self.label = label;
        self
    }

    pub fn with_captured_at(mut self, captured_at: DateTime<Utc>) -> Self {
        self.captured_at = captured_at;
        self
    }
}

// ============================================================================
// Phase 2: Normalized Input
// ============================================================================

/// Image container formats recognised by magic bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
    Bmp,
}

impl ImageFormat {
    pub fn mime(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Webp => "image/webp",
            ImageFormat::Bmp => "image/bmp",
        }
    }
}

/// Frame ready for VLM consumption
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedImage {
    pub format: ImageFormat,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub byte_len: usize,
    /// Standard base64 of the original bytes
    #[serde(skip)]
    pub data_base64: String,
}

impl NormalizedImage {
    /// `data:` URL used by OpenAI-compatible vision endpoints
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.format.mime(), self.data_base64)
    }
}

/// Mono PCM audio at the configured target rate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedAudio {
    pub sample_rate: u32,
    /// Samples in [-1.0, 1.0]
    #[serde(skip)]
    pub samples: Vec<f32>,
    pub duration_ms: u64,
}

/// Quality verdict produced by preprocessing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputQuality {
    pub usable: bool,
    pub issues: Vec<String>,
}

/// Fixed-format input for the inference stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedInput {
    pub id: String,
    pub captured_at: DateTime<Utc>,
    pub source: String,
    pub label: Option<String>,
    pub image: Option<NormalizedImage>,
    pub audio: Option<NormalizedAudio>,
    pub quality: InputQuality,
}

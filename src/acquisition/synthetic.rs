//! Synthetic window generator
//!
//! Produces tiny but valid PNG frames and WAV clips cycling through the four
//! baby states, each tagged with its ground-truth label. Deterministic for a
//! given seed, so dry runs and tests replay identically.

use super::{AcquisitionError, InputEvent, InputSource};
use crate::types::{BabyState, RawInput};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::Cursor;

const FRAME_SIZE: u32 = 64;
const CLIP_SAMPLE_RATE: u32 = 16_000;
const CLIP_SECS: f64 = 1.0;

pub struct SyntheticSource {
    total: usize,
    produced: usize,
    delay_ms: u64,
    /// Window spacing on the capture timeline
    window_secs: i64,
    start: DateTime<Utc>,
    with_audio: bool,
    rng: StdRng,
}

impl SyntheticSource {
    pub fn new(total: usize, delay_ms: u64) -> Self {
        Self {
            total,
            produced: 0,
            delay_ms,
            window_secs: 2,
            start: Utc::now(),
            with_audio: true,
            rng: StdRng::seed_from_u64(0x0c7a_d1e5),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Frames only, no audio clips
    pub fn without_audio(mut self) -> Self {
        self.with_audio = false;
        self
    }

    /// State of the n-th generated window
    pub fn state_for(index: usize) -> BabyState {
        BabyState::CLASSES[index % BabyState::CLASSES.len()]
    }

    fn generate(&mut self, index: usize) -> Result<RawInput, AcquisitionError> {
        let state = Self::state_for(index);
        let id = format!("synth_{index:05}");
        let frame = synthetic_frame(state, FRAME_SIZE, FRAME_SIZE);
        let raw = if self.with_audio {
            let clip = synthetic_clip(state, CLIP_SECS, CLIP_SAMPLE_RATE, &mut self.rng)?;
            RawInput::bundle(id, "synthetic", frame, clip)
        } else {
            RawInput::frame(id, "synthetic", frame)
        };
        let captured_at = self.start + ChronoDuration::seconds(self.window_secs * index as i64);
        Ok(raw
            .with_label(Some(state.label().to_string()))
            .with_captured_at(captured_at))
    }
}

#[async_trait]
impl InputSource for SyntheticSource {
    async fn next_input(&mut self) -> Result<InputEvent, AcquisitionError> {
        if self.produced >= self.total {
            return Ok(InputEvent::Eof);
        }
        if self.produced > 0 && self.delay_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(self.delay_ms)).await;
        }
        let raw = self.generate(self.produced)?;
        self.produced += 1;
        Ok(InputEvent::Input(raw))
    }

    fn source_name(&self) -> &str {
        "synthetic"
    }
}

// ============================================================================
// Frame synthesis (grayscale PNG)
// ============================================================================

/// Encode a grayscale PNG whose brightness pattern depends on the state.
pub fn synthetic_frame(state: BabyState, width: u32, height: u32) -> Vec<u8> {
    let base: u8 = match state {
        BabyState::Asleep => 40,
        BabyState::AwakePeaceful => 150,
        BabyState::AwakeCrying => 200,
        BabyState::NotPresent | BabyState::Unknown => 110,
    };
    let (cx, cy) = (width as i64 / 2, height as i64 / 2);
    let r2 = (width.min(height) as i64 / 4).pow(2);
    let mut pixels = Vec::with_capacity((width * height) as usize);
    for y in 0..height as i64 {
        for x in 0..width as i64 {
            let inside = (x - cx).pow(2) + (y - cy).pow(2) <= r2;
            // a bright blob stands in for the baby
            let v = if inside && state.is_present() {
                base.saturating_add(50)
            } else {
                base
            };
            pixels.push(v);
        }
    }
    encode_gray_png(width, height, &pixels)
}

fn encode_gray_png(width: u32, height: u32, pixels: &[u8]) -> Vec<u8> {
    let mut raw = Vec::with_capacity(pixels.len() + height as usize);
    for row in pixels.chunks(width as usize) {
        raw.push(0); // filter: none
        raw.extend_from_slice(row);
    }

    let mut png = Vec::new();
    png.extend_from_slice(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);

    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&width.to_be_bytes());
    ihdr.extend_from_slice(&height.to_be_bytes());
    ihdr.extend_from_slice(&[8, 0, 0, 0, 0]); // 8-bit grayscale, no interlace
    write_chunk(&mut png, b"IHDR", &ihdr);
    write_chunk(&mut png, b"IDAT", &zlib_stored(&raw));
    write_chunk(&mut png, b"IEND", &[]);
    png
}

fn write_chunk(out: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    let start = out.len();
    out.extend_from_slice(kind);
    out.extend_from_slice(data);
    let crc = crc32(&out[start..]);
    out.extend_from_slice(&crc.to_be_bytes());
}

/// zlib stream made of uncompressed deflate blocks
fn zlib_stored(data: &[u8]) -> Vec<u8> {
    let mut out = vec![0x78, 0x01];
    let mut blocks = data.chunks(0xFFFF).peekable();
    if blocks.peek().is_none() {
        out.extend_from_slice(&[1, 0, 0, 0xFF, 0xFF]);
    }
    while let Some(block) = blocks.next() {
        let last = u8::from(blocks.peek().is_none());
        let len = block.len() as u16;
        out.push(last);
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(&(!len).to_le_bytes());
        out.extend_from_slice(block);
    }
    out.extend_from_slice(&adler32(data).to_be_bytes());
    out
}

fn crc32(bytes: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &b in bytes {
        crc ^= u32::from(b);
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xEDB8_8320 & mask);
        }
    }
    !crc
}

fn adler32(bytes: &[u8]) -> u32 {
    let (mut a, mut b) = (1u32, 0u32);
    for &byte in bytes {
        a = (a + u32::from(byte)) % 65_521;
        b = (b + a) % 65_521;
    }
    (b << 16) | a
}

// ============================================================================
// Clip synthesis (16-bit mono WAV)
// ============================================================================

/// Render a WAV clip: a loud harmonic 450 Hz wail when crying, low noise otherwise.
pub fn synthetic_clip(
    state: BabyState,
    secs: f64,
    sample_rate: u32,
    rng: &mut StdRng,
) -> Result<Vec<u8>, AcquisitionError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let n = (secs * f64::from(sample_rate)) as usize;
    let mut cursor = Cursor::new(Vec::with_capacity(n * 2 + 44));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| AcquisitionError::Synthesis(e.to_string()))?;
        let noise_amp = match state {
            BabyState::Asleep => 0.002,
            BabyState::AwakePeaceful => 0.01,
            BabyState::AwakeCrying => 0.01,
            BabyState::NotPresent | BabyState::Unknown => 0.0005,
        };
        for i in 0..n {
            let t = i as f64 / f64::from(sample_rate);
            let mut s = noise_amp * rng.gen_range(-1.0..1.0);
            if state == BabyState::AwakeCrying {
                let f0 = 450.0;
                s += 0.5 * (2.0 * std::f64::consts::PI * f0 * t).sin()
                    + 0.15 * (2.0 * std::f64::consts::PI * 2.0 * f0 * t).sin();
            }
            let sample = (s.clamp(-1.0, 1.0) * f64::from(i16::MAX)) as i16;
            writer
                .write_sample(sample)
                .map_err(|e| AcquisitionError::Synthesis(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| AcquisitionError::Synthesis(e.to_string()))?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32_known_value() {
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_adler32_known_value() {
        assert_eq!(adler32(b"Wikipedia"), 0x11E6_0398);
    }

    #[test]
    fn test_frame_is_png_with_dimensions() {
        let png = synthetic_frame(BabyState::Asleep, 64, 48);
        assert_eq!(&png[..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
        assert_eq!(&png[12..16], b"IHDR");
        assert_eq!(u32::from_be_bytes([png[16], png[17], png[18], png[19]]), 64);
        assert_eq!(u32::from_be_bytes([png[20], png[21], png[22], png[23]]), 48);
    }

    #[test]
    fn test_clip_decodes_with_hound() {
        let mut rng = StdRng::seed_from_u64(1);
        let wav = synthetic_clip(BabyState::AwakeCrying, 0.5, 16_000, &mut rng).unwrap();
        let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        assert_eq!(reader.spec().sample_rate, 16_000);
        assert_eq!(reader.len(), 8_000);
    }

    #[tokio::test]
    async fn test_cycles_states_with_labels() {
        let mut src = SyntheticSource::new(5, 0).without_audio();
        let mut labels = Vec::new();
        while let InputEvent::Input(raw) = src.next_input().await.unwrap() {
            labels.push(raw.label.unwrap());
        }
        assert_eq!(
            labels,
            vec!["asleep", "awake/peaceful", "awake/crying", "not-present", "asleep"]
        );
    }
}

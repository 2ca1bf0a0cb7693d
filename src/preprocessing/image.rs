//! Frame sniffing and encoding
//!
//! Formats are detected from magic bytes, never from file extensions.
//! Dimensions come straight from the container header; no pixel decoding.

use super::PreprocessError;
use crate::config::PreprocessingConfig;
use crate::types::{ImageFormat, NormalizedImage};
use base64::Engine;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
    if bytes.starts_with(&PNG_SIGNATURE) {
        Some(ImageFormat::Png)
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some(ImageFormat::Jpeg)
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some(ImageFormat::Gif)
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some(ImageFormat::Webp)
    } else if bytes.starts_with(b"BM") && bytes.len() >= 26 {
        Some(ImageFormat::Bmp)
    } else {
        None
    }
}

fn be_u16(b: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_be_bytes([*b.get(at)?, *b.get(at + 1)?]))
}

fn le_u16(b: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_le_bytes([*b.get(at)?, *b.get(at + 1)?]))
}

fn be_u32(b: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_be_bytes(b.get(at..at + 4)?.try_into().ok()?))
}

fn le_u32(b: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_le_bytes(b.get(at..at + 4)?.try_into().ok()?))
}

fn le_u24(b: &[u8], at: usize) -> Option<u32> {
    let s = b.get(at..at + 3)?;
    Some(u32::from(s[0]) | (u32::from(s[1]) << 8) | (u32::from(s[2]) << 16))
}

/// Width and height from the container header, if it exposes them.
pub fn dimensions(format: ImageFormat, b: &[u8]) -> Option<(u32, u32)> {
    match format {
        ImageFormat::Png => {
            if b.get(12..16)? != b"IHDR" {
                return None;
            }
            Some((be_u32(b, 16)?, be_u32(b, 20)?))
        }
        ImageFormat::Gif => Some((u32::from(le_u16(b, 6)?), u32::from(le_u16(b, 8)?))),
        ImageFormat::Bmp => {
            let dib_size = le_u32(b, 14)?;
            if dib_size == 12 {
                // BITMAPCOREHEADER
                Some((u32::from(le_u16(b, 18)?), u32::from(le_u16(b, 20)?)))
            } else {
                let w = le_u32(b, 18)? as i32;
                let h = le_u32(b, 22)? as i32;
                // negative height means top-down rows
                Some((w.unsigned_abs(), h.unsigned_abs()))
            }
        }
        ImageFormat::Webp => webp_dimensions(b),
        ImageFormat::Jpeg => jpeg_dimensions(b),
    }
}

fn webp_dimensions(b: &[u8]) -> Option<(u32, u32)> {
    match b.get(12..16)? {
        b"VP8X" => Some((le_u24(b, 24)? + 1, le_u24(b, 27)? + 1)),
        b"VP8 " => Some((
            u32::from(le_u16(b, 26)? & 0x3FFF),
            u32::from(le_u16(b, 28)? & 0x3FFF),
        )),
        b"VP8L" => {
            if *b.get(20)? != 0x2F {
                return None;
            }
            let s = b.get(21..25)?;
            let (b0, b1, b2, b3) = (u32::from(s[0]), u32::from(s[1]), u32::from(s[2]), u32::from(s[3]));
            let w = 1 + (((b1 & 0x3F) << 8) | b0);
            let h = 1 + (((b3 & 0x0F) << 10) | (b2 << 2) | ((b1 & 0xC0) >> 6));
            Some((w, h))
        }
        _ => None,
    }
}

/// Walk JPEG segments until a start-of-frame marker.
fn jpeg_dimensions(b: &[u8]) -> Option<(u32, u32)> {
    let mut i = 2;
    while i + 1 < b.len() {
        if b[i] != 0xFF {
            i += 1;
            continue;
        }
        let marker = b[i + 1];
        match marker {
            // fill byte
            0xFF => {
                i += 1;
                continue;
            }
            // standalone markers carry no length
            0x01 | 0xD0..=0xD8 => {
                i += 2;
                continue;
            }
            0xD9 | 0xDA => return None,
            _ => {}
        }
        let len = usize::from(be_u16(b, i + 2)?);
        let is_sof = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            let h = be_u16(b, i + 5)?;
            let w = be_u16(b, i + 7)?;
            return Some((u32::from(w), u32::from(h)));
        }
        i += 2 + len;
    }
    None
}

/// Validate and encode a frame for the VLM.
pub fn normalize_image(bytes: &[u8], cfg: &PreprocessingConfig) -> Result<NormalizedImage, PreprocessError> {
    if bytes.is_empty() {
        return Err(PreprocessError::Empty("image"));
    }
    if bytes.len() > cfg.max_image_bytes {
        return Err(PreprocessError::ImageTooLarge {
            size: bytes.len(),
            max: cfg.max_image_bytes,
        });
    }
    let format = detect_format(bytes).ok_or(PreprocessError::UnsupportedImageFormat)?;
    let dims = dimensions(format, bytes);
    if let Some((width, height)) = dims {
        if width.min(height) < cfg.min_image_dim {
            return Err(PreprocessError::ImageTooSmall {
                width,
                height,
                min: cfg.min_image_dim,
            });
        }
    }

    Ok(NormalizedImage {
        format,
        width: dims.map(|d| d.0),
        height: dims.map(|d| d.1),
        byte_len: bytes.len(),
        data_base64: base64::engine::general_purpose::STANDARD.encode(bytes),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::synthetic_frame;
    use crate::types::BabyState;

    #[test]
    fn test_detect_format_by_magic() {
        assert_eq!(detect_format(&PNG_SIGNATURE), Some(ImageFormat::Png));
        assert_eq!(detect_format(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(ImageFormat::Jpeg));
        assert_eq!(detect_format(b"GIF89a\x10\x00\x10\x00"), Some(ImageFormat::Gif));
        assert_eq!(detect_format(b"RIFF\x00\x00\x00\x00WEBPVP8 "), Some(ImageFormat::Webp));
        assert_eq!(detect_format(b"hello world"), None);
    }

    #[test]
    fn test_png_dimensions() {
        let png = synthetic_frame(BabyState::Asleep, 80, 60);
        assert_eq!(dimensions(ImageFormat::Png, &png), Some((80, 60)));
    }

    #[test]
    fn test_gif_dimensions() {
        let gif = b"GIF89a\x40\x01\xF0\x00rest";
        assert_eq!(dimensions(ImageFormat::Gif, gif), Some((320, 240)));
    }

    #[test]
    fn test_jpeg_sof_dimensions() {
        // SOI, APP0 (len 4, 2 payload bytes), SOF0 with 480x640
        let jpeg = [
            0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x04, 0x00, 0x00, 0xFF, 0xC0, 0x00, 0x11, 0x08, 0x01,
            0xE0, 0x02, 0x80, 0x03,
        ];
        assert_eq!(dimensions(ImageFormat::Jpeg, &jpeg), Some((640, 480)));
    }

    #[test]
    fn test_oversize_rejected() {
        let cfg = PreprocessingConfig {
            max_image_bytes: 16,
            ..PreprocessingConfig::default()
        };
        let png = synthetic_frame(BabyState::Asleep, 64, 64);
        assert!(matches!(
            normalize_image(&png, &cfg),
            Err(PreprocessError::ImageTooLarge { max: 16, .. })
        ));
    }

    #[test]
    fn test_tiny_image_rejected() {
        let png = synthetic_frame(BabyState::Asleep, 8, 8);
        assert!(matches!(
            normalize_image(&png, &PreprocessingConfig::default()),
            Err(PreprocessError::ImageTooSmall { width: 8, height: 8, .. })
        ));
    }

    #[test]
    fn test_data_url() {
        let png = synthetic_frame(BabyState::Asleep, 64, 64);
        let img = normalize_image(&png, &PreprocessingConfig::default()).unwrap();
        assert!(img.data_url().starts_with("data:image/png;base64,iVBORw0KGgo"));
        assert_eq!(img.width, Some(64));
    }
}

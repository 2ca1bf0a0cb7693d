//! Stdin Source
//!
//! Reads JSON-formatted windows from stdin, one per line:
//!
//! ```json
//! {"id": "w1", "image_base64": "iVBORw0...", "audio_base64": "UklGR...", "label": "asleep"}
//! ```
//!
//! Used with capture harnesses: `./capture.sh | cradlewatch --stdin`

use super::{AcquisitionError, InputEvent, InputSource};
use crate::types::RawInput;
use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};

/// JSON structure of one stdin line
#[derive(Debug, Deserialize)]
pub struct StdinRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub captured_at: Option<DateTime<Utc>>,
    /// Standard base64, optionally as a `data:` URL
    #[serde(default)]
    pub image_base64: Option<String>,
    #[serde(default)]
    pub audio_base64: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

pub struct StdinSource<R = BufReader<Stdin>> {
    reader: R,
    line_buffer: String,
    line_no: u64,
}

impl StdinSource<BufReader<Stdin>> {
    pub fn new() -> Self {
        Self::from_reader(BufReader::new(tokio::io::stdin()))
    }
}

impl Default for StdinSource<BufReader<Stdin>> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> StdinSource<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    /// Read records from any buffered reader (tests, pipes).
    pub fn from_reader(reader: R) -> Self {
        Self {
            reader,
            line_buffer: String::with_capacity(64 * 1024),
            line_no: 0,
        }
    }
}

/// Decode a base64 field, accepting a `data:<mime>;base64,` prefix.
fn decode_field(field: &str, value: &str) -> Result<Vec<u8>, String> {
    let payload = match value.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => value,
    };
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| format!("{field}: {e}"))
}

/// Convert a parsed record into a raw window.
pub fn record_to_input(record: StdinRecord, line_no: u64) -> Result<RawInput, String> {
    let id = record
        .id
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| format!("stdin-{line_no:06}"));
    let frame = record
        .image_base64
        .as_deref()
        .map(|v| decode_field("image_base64", v))
        .transpose()?;
    let audio = record
        .audio_base64
        .as_deref()
        .map(|v| decode_field("audio_base64", v))
        .transpose()?;

    let raw = match (frame, audio) {
        (Some(frame), Some(audio)) => RawInput::bundle(id, "stdin", frame, audio),
        (Some(frame), None) => RawInput::frame(id, "stdin", frame),
        (None, Some(audio)) => RawInput::audio(id, "stdin", audio),
        (None, None) => return Err("record has neither image_base64 nor audio_base64".into()),
    };
    let raw = raw.with_label(record.label);
    Ok(match record.captured_at {
        Some(ts) => raw.with_captured_at(ts),
        None => raw,
    })
}

#[async_trait]
impl<R> InputSource for StdinSource<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    async fn next_input(&mut self) -> Result<InputEvent, AcquisitionError> {
        loop {
            self.line_buffer.clear();
            let bytes = self.reader.read_line(&mut self.line_buffer).await?;
            if bytes == 0 {
                return Ok(InputEvent::Eof);
            }
            self.line_no += 1;
            let line = self.line_buffer.trim();
            if line.is_empty() {
                continue;
            }
            let parsed = serde_json::from_str::<StdinRecord>(line)
                .map_err(|e| e.to_string())
                .and_then(|record| record_to_input(record, self.line_no));
            match parsed {
                Ok(raw) => return Ok(InputEvent::Input(raw)),
                Err(e) => {
                    // skip malformed lines and keep reading
                    tracing::warn!(line = self.line_no, error = %e, "[StdinSource] Skipping malformed record");
                }
            }
        }
    }

    fn source_name(&self) -> &str {
        "stdin"
    }
}

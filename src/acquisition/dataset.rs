//! Dataset manifest replay
//!
//! A manifest is either a JSON array of entries or JSON lines, one entry per
//! line. Paths are resolved relative to the manifest's directory:
//!
//! ```json
//! {"id": "synth_00001", "image": "images/synth_00001.png", "label": "asleep", "prompt": "..."}
//! ```

use super::{AcquisitionError, InputEvent, InputSource};
use crate::types::{RawInput, RawPayload};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One manifest record. Unknown fields (annotations, conversations) are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestEntry {
    #[serde(default)]
    pub id: Option<String>,
    /// Image path relative to the manifest directory
    #[serde(default)]
    pub image: Option<String>,
    /// WAV path relative to the manifest directory
    #[serde(default)]
    pub audio: Option<String>,
    /// Ground-truth class (`asleep`, `awake/peaceful`, ...)
    #[serde(default)]
    pub label: Option<String>,
    /// Scene description used to generate the image
    #[serde(default)]
    pub prompt: Option<String>,
}

impl ManifestEntry {
    /// Entry id, falling back to the image/audio file stem.
    fn resolved_id(&self, index: usize) -> String {
        if let Some(id) = self.id.as_deref().filter(|s| !s.trim().is_empty()) {
            return id.to_string();
        }
        self.image
            .as_deref()
            .or(self.audio.as_deref())
            .and_then(|p| Path::new(p).file_stem())
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("entry-{index:05}"))
    }
}

/// Replays a labelled dataset manifest with optional inter-item delay.
pub struct DatasetSource {
    root: PathBuf,
    entries: VecDeque<(usize, ManifestEntry)>,
    delay_ms: u64,
    yielded_first: bool,
    skipped: usize,
}

impl DatasetSource {
    /// Read and parse a manifest file. Malformed records are skipped with a warning.
    pub fn open(manifest: &Path, delay_ms: u64) -> Result<Self, AcquisitionError> {
        let contents =
            std::fs::read_to_string(manifest).map_err(|e| AcquisitionError::io(manifest, e))?;
        let root = manifest
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let (entries, skipped) = parse_manifest(&contents)?;
        info!(
            manifest = %manifest.display(),
            entries = entries.len(),
            skipped,
            "Loaded dataset manifest"
        );
        Ok(Self::from_entries(root, entries, delay_ms).with_skipped(skipped))
    }

    pub fn from_entries(root: PathBuf, entries: Vec<ManifestEntry>, delay_ms: u64) -> Self {
        Self {
            root,
            entries: entries.into_iter().enumerate().collect(),
            delay_ms,
            yielded_first: false,
            skipped: 0,
        }
    }

    fn with_skipped(mut self, skipped: usize) -> Self {
        self.skipped = skipped;
        self
    }

    /// Entries not yet replayed
    pub fn remaining(&self) -> usize {
        self.entries.len()
    }

    /// Malformed or unreadable entries skipped so far
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    async fn read_relative(&self, rel: &str) -> Option<Vec<u8>> {
        let path = self.root.join(rel);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Dataset file not readable, skipping entry");
                None
            }
        }
    }

    async fn load_entry(&self, index: usize, entry: &ManifestEntry) -> Option<RawInput> {
        let id = entry.resolved_id(index);
        let frame = match entry.image.as_deref() {
            Some(rel) => Some(self.read_relative(rel).await?),
            None => None,
        };
        let audio = match entry.audio.as_deref() {
            Some(rel) => Some(self.read_relative(rel).await?),
            None => None,
        };

        let raw = match (frame, audio) {
            (Some(frame), Some(audio)) => RawInput::bundle(id, "dataset", frame, audio),
            (Some(bytes), None) => {
                let mut raw = RawInput::frame(id, "dataset", bytes);
                if let RawPayload::Frame { hint_path, .. } = &mut raw.payload {
                    *hint_path = entry.image.clone();
                }
                raw
            }
            (None, Some(audio)) => RawInput::audio(id, "dataset", audio),
            (None, None) => {
                warn!(id = %id, "Manifest entry has neither image nor audio, skipping");
                return None;
            }
        };
        Some(raw.with_label(entry.label.clone()))
    }
}

#[async_trait]
impl InputSource for DatasetSource {
    async fn next_input(&mut self) -> Result<InputEvent, AcquisitionError> {
        if self.yielded_first && self.delay_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(self.delay_ms)).await;
        }
        while let Some((index, entry)) = self.entries.pop_front() {
            match self.load_entry(index, &entry).await {
                Some(raw) => {
                    debug!(id = %raw.id, label = ?raw.label, "Dataset entry loaded");
                    self.yielded_first = true;
                    return Ok(InputEvent::Input(raw));
                }
                None => self.skipped += 1,
            }
        }
        Ok(InputEvent::Eof)
    }

    fn source_name(&self) -> &str {
        "dataset"
    }
}

/// Parse a manifest as a JSON array or as JSON lines.
///
/// Returns the valid entries and the number of records skipped.
pub fn parse_manifest(contents: &str) -> Result<(Vec<ManifestEntry>, usize), AcquisitionError> {
    let trimmed = contents.trim_start();
    let mut skipped = 0;
    let mut entries = Vec::new();

    if trimmed.starts_with('[') {
        let values: Vec<serde_json::Value> = serde_json::from_str(trimmed)
            .map_err(|e| AcquisitionError::Manifest(format!("invalid JSON array: {e}")))?;
        for (i, value) in values.into_iter().enumerate() {
            match serde_json::from_value::<ManifestEntry>(value) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!(record = i, error = %e, "Skipping malformed manifest record");
                    skipped += 1;
                }
            }
        }
    } else {
        for (line_no, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match serde_json::from_str::<ManifestEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!(line = line_no + 1, error = %e, "Skipping malformed manifest line");
                    skipped += 1;
                }
            }
        }
    }

    Ok((entries, skipped))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_lines_skips_garbage() {
        let text = r#"{"id": "a", "image": "a.png", "label": "asleep"}
not json
{"image": "images/b.png"}
"#;
        let (entries, skipped) = parse_manifest(text).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(skipped, 1);
        assert_eq!(entries[1].resolved_id(1), "b");
    }

    #[test]
    fn test_parse_json_array() {
        let text = r#"[
  {"id": "synth_00001", "image": "images/synth_00001.png", "label": "awake/crying",
   "conversations": [{"from": "human", "value": "<image>"}]},
  {"id": 5}
]"#;
        let (entries, skipped) = parse_manifest(text).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(skipped, 1);
        assert_eq!(entries[0].label.as_deref(), Some("awake/crying"));
    }

    #[tokio::test]
    async fn test_missing_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ok.png"), b"png-bytes").unwrap();
        let entries = vec![
            ManifestEntry {
                id: Some("missing".into()),
                image: Some("nope.png".into()),
                audio: None,
                label: None,
                prompt: None,
            },
            ManifestEntry {
                id: Some("ok".into()),
                image: Some("ok.png".into()),
                audio: None,
                label: Some("asleep".into()),
                prompt: None,
            },
        ];
        let mut src = DatasetSource::from_entries(dir.path().to_path_buf(), entries, 0);
        match src.next_input().await.unwrap() {
            InputEvent::Input(raw) => {
                assert_eq!(raw.id, "ok");
                assert_eq!(raw.label.as_deref(), Some("asleep"));
                assert_eq!(raw.payload.frame_bytes(), Some(&b"png-bytes"[..]));
            }
            InputEvent::Eof => panic!("expected an input"),
        }
        assert_eq!(src.skipped(), 1);
        assert!(matches!(src.next_input().await.unwrap(), InputEvent::Eof));
    }
}

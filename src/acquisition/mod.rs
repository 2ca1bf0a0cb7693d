//! Input acquisition (Phase 1)
//!
//! Provides a unified trait for reading raw windows from different sources:
//! labelled dataset manifests (replay), a watched directory, stdin (JSON), and
//! a deterministic synthetic generator.

mod dataset;
mod directory;
mod stdin_source;
mod synthetic;

pub use dataset::{DatasetSource, ManifestEntry};
pub use directory::DirectorySource;
pub use stdin_source::{StdinRecord, StdinSource};
pub use synthetic::{synthetic_clip, synthetic_frame, SyntheticSource};

use crate::types::RawInput;
use async_trait::async_trait;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum AcquisitionError {
    #[error("I/O error ({}): {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("stdin read failed: {0}")]
    Stdin(#[from] std::io::Error),

    #[error("manifest error: {0}")]
    Manifest(String),

    #[error("synthetic generation failed: {0}")]
    Synthesis(String),
}

impl AcquisitionError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AcquisitionError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Events produced by an input source.
#[derive(Debug)]
pub enum InputEvent {
    /// A raw window was read.
    Input(RawInput),
    /// Source reached end of data.
    Eof,
}

/// Trait abstracting where raw windows come from.
///
/// Implementations handle format parsing and pacing internally. The
/// processing loop calls [`InputSource::next_input`] in a `select!` with
/// cancellation, so implementations may sleep freely.
#[async_trait]
pub trait InputSource: Send + 'static {
    /// Read the next window from the source.
    ///
    /// Returns `InputEvent::Eof` when no more data is available.
    /// Returns `Err` on unrecoverable errors only; malformed items are skipped.
    async fn next_input(&mut self) -> Result<InputEvent, AcquisitionError>;

    /// Human-readable name for logging (e.g. "dataset", "stdin").
    fn source_name(&self) -> &str;
}

// ============================================================================
// Replay Source (pre-loaded windows)
// ============================================================================

/// Replays pre-loaded windows with optional inter-window delay.
pub struct ReplaySource {
    inputs: std::vec::IntoIter<RawInput>,
    delay_ms: u64,
    yielded_first: bool,
}

impl ReplaySource {
    pub fn new(inputs: Vec<RawInput>, delay_ms: u64) -> Self {
        Self {
            inputs: inputs.into_iter(),
            delay_ms,
            yielded_first: false,
        }
    }
}

#[async_trait]
impl InputSource for ReplaySource {
    async fn next_input(&mut self) -> Result<InputEvent, AcquisitionError> {
        // no delay before the first window
        if self.yielded_first && self.delay_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(self.delay_ms)).await;
        }
        match self.inputs.next() {
            Some(input) => {
                self.yielded_first = true;
                Ok(InputEvent::Input(input))
            }
            None => Ok(InputEvent::Eof),
        }
    }

    fn source_name(&self) -> &str {
        "replay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replay_source_yields_then_eof() {
        let mut src = ReplaySource::new(
            vec![
                RawInput::frame("a", "replay", vec![1]),
                RawInput::frame("b", "replay", vec![2]),
            ],
            0,
        );
        let mut ids = Vec::new();
        while let InputEvent::Input(raw) = src.next_input().await.unwrap() {
            ids.push(raw.id);
        }
        assert_eq!(ids, vec!["a", "b"]);
        assert!(matches!(src.next_input().await.unwrap(), InputEvent::Eof));
    }
}

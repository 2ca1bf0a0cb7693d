//! Watched-directory source
//!
//! Polls a directory for image and WAV files and yields each file once, in
//! name order. `cam_0001.png` and `cam_0001.wav` found in the same scan are
//! bundled into one window.
//!
//! A file is only read once its size and modification time are unchanged
//! between two consecutive scans, so a frame still being copied in is picked
//! up on a later poll instead of being consumed half-written.

use super::{AcquisitionError, InputEvent, InputSource};
use crate::types::{RawInput, RawPayload};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp"];
const AUDIO_EXTENSIONS: &[&str] = &["wav"];

/// Size and mtime observed on the last scan
type FileSignature = (u64, Option<SystemTime>);

#[derive(Default)]
struct PendingPair {
    image: Option<PathBuf>,
    audio: Option<PathBuf>,
}

pub struct DirectorySource {
    dir: PathBuf,
    poll_interval: Duration,
    /// Return `Eof` once a scan finds nothing new
    once: bool,
    seen: HashSet<PathBuf>,
    /// Files not yet read, with their signature from the previous scan
    settling: HashMap<PathBuf, FileSignature>,
    queue: VecDeque<RawInput>,
}

/// Outcome of one directory scan
struct ScanResult {
    queued: usize,
    /// Files held back because they changed since the previous scan
    settling: usize,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>, poll_interval: Duration) -> Self {
        Self {
            dir: dir.into(),
            poll_interval,
            once: false,
            seen: HashSet::new(),
            settling: HashMap::new(),
            queue: VecDeque::new(),
        }
    }

    /// Stop at the first scan that finds no new files.
    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }

    /// Record the file's current signature; true when it matches the last scan.
    fn is_settled(&mut self, path: &Path, signature: FileSignature) -> bool {
        match self.settling.insert(path.to_path_buf(), signature) {
            Some(previous) => previous == signature,
            None => false,
        }
    }

    /// Scan the directory and queue every unseen, settled file.
    async fn scan(&mut self) -> Result<ScanResult, AcquisitionError> {
        let mut reader = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| AcquisitionError::io(&self.dir, e))?;

        // keyed by stem, BTreeMap keeps name order
        let mut pairs: BTreeMap<String, PendingPair> = BTreeMap::new();
        // stems with at least one file still changing wait as a whole
        let mut unsettled: BTreeSet<String> = BTreeSet::new();
        let mut present: HashSet<PathBuf> = HashSet::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| AcquisitionError::io(&self.dir, e))?
        {
            let path = entry.path();
            if self.seen.contains(&path) || !path.is_file() {
                continue;
            }
            let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };
            let ext = extension_of(&path).unwrap_or_default();
            let is_image = IMAGE_EXTENSIONS.contains(&ext.as_str());
            if !is_image && !AUDIO_EXTENSIONS.contains(&ext.as_str()) {
                continue;
            }
            present.insert(path.clone());

            let metadata = entry
                .metadata()
                .await
                .map_err(|e| AcquisitionError::io(&path, e))?;
            if !self.is_settled(&path, (metadata.len(), metadata.modified().ok())) {
                debug!(path = %path.display(), "Waiting for file to settle");
                unsettled.insert(stem);
                continue;
            }

            let pair = pairs.entry(stem).or_default();
            if is_image {
                pair.image = Some(path);
            } else {
                pair.audio = Some(path);
            }
        }

        // forget files removed before they settled
        self.settling.retain(|path, _| present.contains(path));

        let mut queued = 0;
        for (stem, pair) in pairs {
            if unsettled.contains(&stem) {
                continue;
            }
            if let Some(raw) = self.load_pair(&stem, pair).await {
                self.queue.push_back(raw);
                queued += 1;
            }
        }
        Ok(ScanResult {
            queued,
            settling: self.settling.len(),
        })
    }

    async fn load_pair(&mut self, stem: &str, pair: PendingPair) -> Option<RawInput> {
        let image = match pair.image {
            Some(path) => self.read_once(path).await,
            None => None,
        };
        let audio = match pair.audio {
            Some(path) => self.read_once(path).await,
            None => None,
        };
        match (image, audio) {
            (Some((path, frame)), Some((_, audio))) => {
                debug!(stem, image = %path.display(), "Bundled frame and clip");
                Some(RawInput::bundle(stem, "directory", frame, audio))
            }
            (Some((path, bytes)), None) => Some(RawInput {
                payload: RawPayload::Frame {
                    bytes,
                    hint_path: Some(path.display().to_string()),
                },
                ..RawInput::frame(stem, "directory", Vec::new())
            }),
            (None, Some((_, audio))) => Some(RawInput::audio(stem, "directory", audio)),
            (None, None) => None,
        }
    }

    /// Read a file and mark it seen. Unreadable files are marked too, so a
    /// broken file is reported once rather than on every poll.
    async fn read_once(&mut self, path: PathBuf) -> Option<(PathBuf, Vec<u8>)> {
        self.settling.remove(&path);
        self.seen.insert(path.clone());
        match tokio::fs::read(&path).await {
            Ok(bytes) => Some((path, bytes)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read watched file");
                None
            }
        }
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

#[async_trait]
impl InputSource for DirectorySource {
    async fn next_input(&mut self) -> Result<InputEvent, AcquisitionError> {
        loop {
            if let Some(raw) = self.queue.pop_front() {
                return Ok(InputEvent::Input(raw));
            }
            let scan = self.scan().await?;
            if scan.queued == 0 {
                if self.once && scan.settling == 0 {
                    return Ok(InputEvent::Eof);
                }
                tokio::time::sleep(self.poll_interval).await;
            }
        }
    }

    fn source_name(&self) -> &str {
        "directory"
    }
}

//! Scene and alert history storage
//!
//! Persists SceneSummaries and Alerts to sled for the HTTP API and for
//! post-hoc review. Keys are the big-endian window timestamp (nanoseconds)
//! followed by a sled-generated id, so iteration is chronological and two
//! windows with the same timestamp never collide.

use crate::types::{Alert, SceneSummary};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

const SCENES_TREE: &str = "scenes";
const ALERTS_TREE: &str = "alerts";
/// alert id (BE u64) -> key in the alerts tree
const ALERT_INDEX_TREE: &str = "alert_ids";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// History storage for scenes and alerts
#[derive(Clone)]
pub struct HistoryStorage {
    db: Arc<sled::Db>,
    scenes: sled::Tree,
    alerts: sled::Tree,
    alert_index: sled::Tree,
}

fn ts_nanos(ts: DateTime<Utc>) -> u64 {
    ts.timestamp_nanos_opt()
        .and_then(|n| u64::try_from(n).ok())
        .unwrap_or(0)
}

fn decode<T: DeserializeOwned>(tree: &str, value: &[u8]) -> Option<T> {
    match serde_json::from_slice(value) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(tree, error = %e, "Skipping undecodable record");
            None
        }
    }
}

impl HistoryStorage {
    /// Open or create the history database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        Ok(Self {
            scenes: db.open_tree(SCENES_TREE)?,
            alerts: db.open_tree(ALERTS_TREE)?,
            alert_index: db.open_tree(ALERT_INDEX_TREE)?,
            db: Arc::new(db),
        })
    }

    fn key_for(&self, ts: DateTime<Utc>) -> Result<[u8; 16], StorageError> {
        let mut key = [0u8; 16];
        key[..8].copy_from_slice(&ts_nanos(ts).to_be_bytes());
        key[8..].copy_from_slice(&self.db.generate_id()?.to_be_bytes());
        Ok(key)
    }

    fn insert<T: Serialize>(
        &self,
        tree: &sled::Tree,
        ts: DateTime<Utc>,
        record: &T,
    ) -> Result<[u8; 16], StorageError> {
        let key = self.key_for(ts)?;
        tree.insert(key, serde_json::to_vec(record)?)?;
        Ok(key)
    }

    /// Store a scene summary. Not flushed; sled flushes in the background.
    pub fn store_scene(&self, scene: &SceneSummary) -> Result<(), StorageError> {
        self.insert(&self.scenes, scene.timestamp, scene)?;
        Ok(())
    }

    pub fn store_alert(&self, alert: &Alert) -> Result<(), StorageError> {
        let key = self.insert(&self.alerts, alert.timestamp, alert)?;
        self.alert_index.insert(alert.id.to_be_bytes(), &key[..])?;
        Ok(())
    }

    fn recent<T: DeserializeOwned>(tree: &sled::Tree, name: &str, limit: usize) -> Vec<T> {
        tree.iter()
            .rev()
            .filter_map(Result::ok)
            .filter_map(|(_, v)| decode(name, &v))
            .take(limit)
            .collect()
    }

    /// Most recent scenes, newest first
    pub fn recent_scenes(&self, limit: usize) -> Vec<SceneSummary> {
        Self::recent(&self.scenes, SCENES_TREE, limit)
    }

    pub fn latest_scene(&self) -> Option<SceneSummary> {
        self.recent_scenes(1).into_iter().next()
    }

    /// Most recent alerts, newest first
    pub fn recent_alerts(&self, limit: usize) -> Vec<Alert> {
        Self::recent(&self.alerts, ALERTS_TREE, limit)
    }

    pub fn get_alert(&self, id: u64) -> Result<Option<Alert>, StorageError> {
        let Some(key) = self.alert_index.get(id.to_be_bytes())? else {
            return Ok(None);
        };
        match self.alerts.get(&key)? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Err(StorageError::Corrupt(format!("alert {id} indexed but missing"))),
        }
    }

    /// Mark an alert acknowledged. Returns `None` for unknown ids.
    ///
    /// Acknowledging twice keeps the first acknowledgement time.
    pub fn acknowledge_alert(&self, id: u64) -> Result<Option<Alert>, StorageError> {
        let Some(key) = self.alert_index.get(id.to_be_bytes())? else {
            return Ok(None);
        };
        let Some(value) = self.alerts.get(&key)? else {
            return Err(StorageError::Corrupt(format!("alert {id} indexed but missing")));
        };
        let mut alert: Alert = serde_json::from_slice(&value)?;
        if !alert.acknowledged {
            alert.acknowledged = true;
            alert.acknowledged_at = Some(Utc::now());
            self.alerts.insert(&key, serde_json::to_vec(&alert)?)?;
        }
        Ok(Some(alert))
    }

    /// Scenes with `start <= timestamp <= end`, oldest first
    pub fn scenes_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<SceneSummary> {
        let mut lo = [0u8; 16];
        lo[..8].copy_from_slice(&ts_nanos(start).to_be_bytes());
        let mut hi = [0xffu8; 16];
        hi[..8].copy_from_slice(&ts_nanos(end).to_be_bytes());

        self.scenes
            .range(lo..=hi)
            .filter_map(Result::ok)
            .filter_map(|(_, v)| decode(SCENES_TREE, &v))
            .collect()
    }

    /// Delete scenes and alerts older than `cutoff`. Returns the number removed.
    pub fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StorageError> {
        let cutoff_key = ts_nanos(cutoff).to_be_bytes();
        let mut deleted = 0;

        let stale_scenes: Vec<_> = self
            .scenes
            .range(..&cutoff_key[..])
            .keys()
            .filter_map(Result::ok)
            .collect();
        for key in stale_scenes {
            self.scenes.remove(key)?;
            deleted += 1;
        }

        let stale_alerts: Vec<_> = self
            .alerts
            .range(..&cutoff_key[..])
            .filter_map(Result::ok)
            .collect();
        for (key, value) in stale_alerts {
            if let Some(alert) = decode::<Alert>(ALERTS_TREE, &value) {
                self.alert_index.remove(alert.id.to_be_bytes())?;
            }
            self.alerts.remove(key)?;
            deleted += 1;
        }

        if deleted > 0 {
            self.db.flush()?;
        }
        Ok(deleted)
    }

    pub fn count_scenes(&self) -> usize {
        self.scenes.len()
    }

    pub fn count_alerts(&self) -> usize {
        self.alerts.len()
    }

    /// Highest stored alert id, 0 when there are none
    pub fn max_alert_id(&self) -> u64 {
        self.alert_index
            .last()
            .ok()
            .flatten()
            .and_then(|(k, _)| <[u8; 8]>::try_from(k.as_ref()).ok())
            .map_or(0, u64::from_be_bytes)
    }

    pub fn size_bytes(&self) -> u64 {
        self.db.size_on_disk().unwrap_or(0)
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }

    /// Remove all scenes and alerts
    pub fn clear(&self) -> Result<(), StorageError> {
        self.scenes.clear()?;
        self.alerts.clear()?;
        self.alert_index.clear()?;
        self.db.flush()?;
        Ok(())
    }

    pub fn stats(&self) -> StorageStats {
        StorageStats {
            scene_count: self.count_scenes(),
            alert_count: self.count_alerts(),
            size_bytes: self.size_bytes(),
        }
    }
}

/// Storage statistics
#[derive(Debug, Clone, Serialize)]
pub struct StorageStats {
    pub scene_count: usize,
    pub alert_count: usize,
    pub size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AlertSeverity, BabyState};
    use chrono::Duration;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn scene(secs: i64, id: &str) -> SceneSummary {
        SceneSummary {
            window_id: id.to_string(),
            timestamp: ts(secs),
            state: BabyState::Asleep,
            stable_state: BabyState::Asleep,
            severity: 0,
            hazards: vec![],
            face_down: false,
            crying: false,
            notify: false,
            summary: "Baby is asleep.".into(),
            confidence: 0.9,
            modalities: vec![],
            ground_truth: None,
            features: vec![],
        }
    }

    fn alert(id: u64, secs: i64) -> Alert {
        Alert {
            id,
            timestamp: ts(secs),
            window_id: format!("w{secs}"),
            rule: "hazard".into(),
            severity: AlertSeverity::Warning,
            title: "Hazard near the baby".into(),
            message: "Hazards detected: cord.".into(),
            state: BabyState::Asleep,
            acknowledged: false,
            acknowledged_at: None,
        }
    }

    fn open() -> (tempfile::TempDir, HistoryStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = HistoryStorage::open(dir.path().join("test.db")).unwrap();
        (dir, storage)
    }

    #[test]
    fn test_chronological_order() {
        let (_dir, storage) = open();
        storage.store_scene(&scene(30, "c")).unwrap();
        storage.store_scene(&scene(10, "a")).unwrap();
        storage.store_scene(&scene(20, "b")).unwrap();

        let recent = storage.recent_scenes(10);
        let ids: Vec<&str> = recent.iter().map(|s| s.window_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
        assert_eq!(storage.latest_scene().unwrap().window_id, "c");
        assert_eq!(storage.recent_scenes(2).len(), 2);
    }

    #[test]
    fn test_same_timestamp_does_not_collide() {
        let (_dir, storage) = open();
        storage.store_scene(&scene(0, "a")).unwrap();
        storage.store_scene(&scene(0, "b")).unwrap();
        assert_eq!(storage.count_scenes(), 2);
    }

    #[test]
    fn test_acknowledge() {
        let (_dir, storage) = open();
        storage.store_alert(&alert(1, 0)).unwrap();
        storage.store_alert(&alert(2, 5)).unwrap();

        let acked = storage.acknowledge_alert(2).unwrap().unwrap();
        assert!(acked.acknowledged);
        let first_at = acked.acknowledged_at;
        let again = storage.acknowledge_alert(2).unwrap().unwrap();
        assert_eq!(again.acknowledged_at, first_at);

        assert!(storage.get_alert(2).unwrap().unwrap().acknowledged);
        assert!(!storage.get_alert(1).unwrap().unwrap().acknowledged);
        assert!(storage.acknowledge_alert(99).unwrap().is_none());
        assert_eq!(storage.max_alert_id(), 2);
    }

    #[test]
    fn test_range_query() {
        let (_dir, storage) = open();
        for i in 0..10 {
            storage.store_scene(&scene(i * 10, &format!("s{i}"))).unwrap();
        }
        let range = storage.scenes_between(ts(20), ts(60));
        assert_eq!(range.len(), 5);
        assert_eq!(range[0].window_id, "s2");
    }

    #[test]
    fn test_prune() {
        let (_dir, storage) = open();
        storage.store_scene(&scene(0, "old")).unwrap();
        storage.store_scene(&scene(100, "new")).unwrap();
        storage.store_alert(&alert(1, 0)).unwrap();
        storage.store_alert(&alert(2, 100)).unwrap();

        let deleted = storage.prune_older_than(ts(0) + Duration::seconds(50)).unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(storage.count_scenes(), 1);
        assert_eq!(storage.count_alerts(), 1);
        assert!(storage.get_alert(1).unwrap().is_none());
        assert!(storage.get_alert(2).unwrap().is_some());
    }

    #[test]
    fn test_clear() {
        let (_dir, storage) = open();
        storage.store_scene(&scene(0, "a")).unwrap();
        storage.store_alert(&alert(1, 0)).unwrap();
        storage.clear().unwrap();
        assert_eq!(storage.stats().scene_count, 0);
        assert_eq!(storage.max_alert_id(), 0);
    }
}

//! Inference output types: FeatureList (Phase 3) and its typed per-modality views

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Input modality an analyzer works on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Visual,
    Audio,
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Modality::Visual => write!(f, "visual"),
            Modality::Audio => write!(f, "audio"),
        }
    }
}

/// Outcome of an analyzer run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum FeatureStatus {
    Ok,
    /// Features produced but partially reconstructed (e.g. fallback label parse)
    Degraded(String),
    /// Analyzer failed; `features` is empty
    Failed(String),
}

impl FeatureStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, FeatureStatus::Failed(_))
    }
}

/// A single key-value feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl FeatureValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FeatureValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FeatureValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FeatureValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FeatureValue::List(l) => Some(l),
            _ => None,
        }
    }
}

/// Structured per-modality output for one window.
///
/// Serialises to JSON as `{ "modality": ..., "features": { key: value } }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureList {
    pub modality: Modality,
    pub window_id: String,
    pub produced_at: DateTime<Utc>,
    /// Analyzer/backend that produced the features
    pub analyzer: String,
    #[serde(flatten)]
    pub status: FeatureStatus,
    pub features: BTreeMap<String, FeatureValue>,
    /// Wall-clock inference latency
    pub latency_ms: u64,
}

impl FeatureList {
    pub fn failed(modality: Modality, window_id: &str, analyzer: &str, reason: String) -> Self {
        Self {
            modality,
            window_id: window_id.to_string(),
            produced_at: Utc::now(),
            analyzer: analyzer.to_string(),
            status: FeatureStatus::Failed(reason),
            features: BTreeMap::new(),
            latency_ms: 0,
        }
    }

    pub fn get(&self, key: &str) -> Option<&FeatureValue> {
        self.features.get(key)
    }

    /// Typed visual view; `None` for audio lists or failed runs
    pub fn visual(&self) -> Option<VisualFeatures> {
        if self.modality != Modality::Visual || self.status.is_failed() {
            return None;
        }
        Some(VisualFeatures::from_map(&self.features))
    }

    /// Typed audio view; `None` for visual lists or failed runs
    pub fn audio(&self) -> Option<AudioFeatures> {
        if self.modality != Modality::Audio || self.status.is_failed() {
            return None;
        }
        Some(AudioFeatures::from_map(&self.features))
    }
}

// ============================================================================
// Visual features
// ============================================================================

/// Visual feature schema emitted by the VLM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualFeatures {
    pub baby_present: bool,
    pub face_down: bool,
    pub crying: bool,
    pub sleeping: bool,
    /// 0-10
    pub severity: u8,
    pub hazards: Vec<String>,
    pub notify: bool,
    pub description: String,
}

impl Default for VisualFeatures {
    fn default() -> Self {
        Self {
            baby_present: true,
            face_down: false,
            crying: false,
            sleeping: false,
            severity: 0,
            hazards: Vec::new(),
            notify: false,
            description: String::new(),
        }
    }
}

impl VisualFeatures {
    /// Enforce field invariants: severity range, hazard hygiene, absent-baby overrides.
    pub fn normalized(mut self) -> Self {
        self.severity = self.severity.min(10);
        self.hazards = normalize_hazards(&self.hazards);
        if !self.baby_present {
            self.face_down = false;
            self.crying = false;
            self.sleeping = false;
        }
        if self.crying {
            self.sleeping = false;
        }
        self
    }

    pub fn to_map(&self) -> BTreeMap<String, FeatureValue> {
        let mut map = BTreeMap::new();
        map.insert("baby_present".into(), FeatureValue::Bool(self.baby_present));
        map.insert("face_down".into(), FeatureValue::Bool(self.face_down));
        map.insert("crying".into(), FeatureValue::Bool(self.crying));
        map.insert("sleeping".into(), FeatureValue::Bool(self.sleeping));
        map.insert("severity".into(), FeatureValue::Number(f64::from(self.severity)));
        map.insert("hazards".into(), FeatureValue::List(self.hazards.clone()));
        map.insert("notify".into(), FeatureValue::Bool(self.notify));
        map.insert("description".into(), FeatureValue::Text(self.description.clone()));
        map
    }

    pub fn from_map(map: &BTreeMap<String, FeatureValue>) -> Self {
        let flag = |k: &str, default: bool| map.get(k).and_then(FeatureValue::as_bool).unwrap_or(default);
        let severity = map
            .get("severity")
            .and_then(FeatureValue::as_f64)
            .map_or(0, clamp_severity);
        Self {
            baby_present: flag("baby_present", true),
            face_down: flag("face_down", false),
            crying: flag("crying", false),
            sleeping: flag("sleeping", false),
            severity,
            hazards: map
                .get("hazards")
                .and_then(FeatureValue::as_list)
                .map(<[String]>::to_vec)
                .unwrap_or_default(),
            notify: flag("notify", severity >= 7),
            description: map
                .get("description")
                .and_then(FeatureValue::as_str)
                .unwrap_or_default()
                .to_string(),
        }
    }
}

/// Clamp an arbitrary numeric severity into 0-10
pub fn clamp_severity(raw: f64) -> u8 {
    if !raw.is_finite() {
        return 0;
    }
    raw.round().clamp(0.0, 10.0) as u8
}

/// Lower-case, trim, drop empties and duplicates (order preserved)
pub fn normalize_hazards(hazards: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(hazards.len());
    for h in hazards {
        let h = h.trim().to_lowercase();
        if h.is_empty() || h == "none" || out.contains(&h) {
            continue;
        }
        out.push(h);
    }
    out
}

// ============================================================================
// Audio features
// ============================================================================

/// Loudness floor reported for digital silence
pub const SILENCE_DBFS: f64 = -120.0;

/// Acoustic features from the cry analyzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AudioFeatures {
    pub cry_detected: bool,
    /// 0.0-1.0
    pub cry_confidence: f64,
    pub loudness_dbfs: f64,
    pub zero_crossing_rate: f64,
    pub pitch_hz: Option<f64>,
}

impl AudioFeatures {
    pub fn to_map(&self) -> BTreeMap<String, FeatureValue> {
        let mut map = BTreeMap::new();
        map.insert("cry_detected".into(), FeatureValue::Bool(self.cry_detected));
        map.insert("cry_confidence".into(), FeatureValue::Number(self.cry_confidence));
        map.insert("loudness_dbfs".into(), FeatureValue::Number(self.loudness_dbfs));
        map.insert(
            "zero_crossing_rate".into(),
            FeatureValue::Number(self.zero_crossing_rate),
        );
        if let Some(p) = self.pitch_hz {
            map.insert("pitch_hz".into(), FeatureValue::Number(p));
        }
        map
    }

    pub fn from_map(map: &BTreeMap<String, FeatureValue>) -> Self {
        let num = |k: &str| map.get(k).and_then(FeatureValue::as_f64);
        Self {
            cry_detected: map
                .get("cry_detected")
                .and_then(FeatureValue::as_bool)
                .unwrap_or(false),
            cry_confidence: num("cry_confidence").unwrap_or(0.0),
            loudness_dbfs: num("loudness_dbfs").unwrap_or(SILENCE_DBFS),
            zero_crossing_rate: num("zero_crossing_rate").unwrap_or(0.0),
            pitch_hz: num("pitch_hz"),
        }
    }
}

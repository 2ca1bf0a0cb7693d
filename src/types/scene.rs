//! Aggregation output: BabyState classification and SceneSummary (Phase 4)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{FeatureList, Modality};

/// Classification label for the current scene.
///
/// Serialised with the dataset label strings (`"awake/crying"` etc.).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BabyState {
    #[serde(rename = "asleep")]
    Asleep,
    #[serde(rename = "awake/peaceful")]
    AwakePeaceful,
    #[serde(rename = "awake/crying")]
    AwakeCrying,
    #[serde(rename = "not-present")]
    NotPresent,
    #[serde(rename = "unknown")]
    Unknown,
}

impl BabyState {
    /// The four classes a model may answer with, in prompt order
    pub const CLASSES: [BabyState; 4] = [
        BabyState::Asleep,
        BabyState::AwakePeaceful,
        BabyState::AwakeCrying,
        BabyState::NotPresent,
    ];

    pub fn label(self) -> &'static str {
        match self {
            BabyState::Asleep => "asleep",
            BabyState::AwakePeaceful => "awake/peaceful",
            BabyState::AwakeCrying => "awake/crying",
            BabyState::NotPresent => "not-present",
            BabyState::Unknown => "unknown",
        }
    }

    /// Parse a dataset/model label. Accepts a few loose spellings.
    pub fn from_label(label: &str) -> Option<Self> {
        let l = label.trim().to_lowercase().replace(['_', ' '], "-");
        match l.as_str() {
            "asleep" | "sleeping" => Some(BabyState::Asleep),
            "awake/peaceful" | "awake-peaceful" | "peaceful" => Some(BabyState::AwakePeaceful),
            "awake/crying" | "awake-crying" | "crying" => Some(BabyState::AwakeCrying),
            "not-present" | "notpresent" | "empty" | "absent" => Some(BabyState::NotPresent),
            "unknown" => Some(BabyState::Unknown),
            _ => None,
        }
    }

    /// Whether a baby is in view in this state
    pub fn is_present(self) -> bool {
        matches!(
            self,
            BabyState::Asleep | BabyState::AwakePeaceful | BabyState::AwakeCrying
        )
    }
}

impl std::fmt::Display for BabyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Natural-language description plus classification for one window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneSummary {
    pub window_id: String,
    pub timestamp: DateTime<Utc>,
    /// Classification for this window alone
    pub state: BabyState,
    /// Temporally smoothed classification
    pub stable_state: BabyState,
    /// 0-10
    pub severity: u8,
    pub hazards: Vec<String>,
    pub face_down: bool,
    pub crying: bool,
    pub notify: bool,
    pub summary: String,
    /// 0.0-1.0
    pub confidence: f64,
    /// Modalities that produced usable features
    pub modalities: Vec<Modality>,
    /// Ground truth, when replaying a labelled dataset
    #[serde(default)]
    pub ground_truth: Option<String>,
    #[serde(default)]
    pub features: Vec<FeatureList>,
}

impl SceneSummary {
    /// Whether the visual analyzer failed for this window
    pub fn visual_failed(&self) -> bool {
        self.features
            .iter()
            .any(|f| f.modality == Modality::Visual && f.status.is_failed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_round_trip_for_classes() {
        for state in BabyState::CLASSES {
            assert_eq!(BabyState::from_label(state.label()), Some(state));
        }
    }

    #[test]
    fn test_loose_labels() {
        assert_eq!(BabyState::from_label("Awake Crying"), Some(BabyState::AwakeCrying));
        assert_eq!(BabyState::from_label("not_present"), Some(BabyState::NotPresent));
        assert_eq!(BabyState::from_label("dancing"), None);
    }

    #[test]
    fn test_serde_uses_dataset_labels() {
        let s = serde_json::to_string(&BabyState::AwakePeaceful).unwrap();
        assert_eq!(s, "\"awake/peaceful\"");
    }
}

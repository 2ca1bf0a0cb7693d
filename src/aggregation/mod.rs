//! Feature aggregation and summarization (Phase 4)
//!
//! Merges the per-modality feature lists of one window into a
//! [`SceneSummary`]: fused classification, severity with safety floors,
//! a temporally smoothed state and a template summary.
//!
//! Visual features are authoritative for presence, posture, sleep and
//! hazards. Audio can only add crying, and can stand in for vision when the
//! visual analyzer failed.

mod smoothing;
mod templates;

pub use smoothing::StateSmoother;
pub use templates::{template_summary, SummaryInput};

use crate::config::AggregationConfig;
use crate::types::{
    AudioFeatures, BabyState, FeatureList, FeatureStatus, Modality, NormalizedInput, SceneSummary,
    VisualFeatures,
};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Confidence assigned to a fused state
const VISUAL_CONFIDENCE: f64 = 0.9;
const DEGRADED_VISUAL_CONFIDENCE: f64 = 0.6;
const AUDIO_ONLY_WEIGHT: f64 = 0.7;
const UNKNOWN_CONFIDENCE: f64 = 0.0;

/// Identity of the window being aggregated
#[derive(Debug, Clone)]
pub struct WindowMeta {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub ground_truth: Option<String>,
}

impl From<&NormalizedInput> for WindowMeta {
    fn from(input: &NormalizedInput) -> Self {
        Self {
            id: input.id.clone(),
            timestamp: input.captured_at,
            ground_truth: input.label.clone(),
        }
    }
}

pub struct Aggregator {
    cfg: AggregationConfig,
    smoother: StateSmoother,
}

impl Aggregator {
    pub fn new(cfg: AggregationConfig) -> Self {
        let smoother = StateSmoother::new(cfg.smoothing_window);
        Self { cfg, smoother }
    }

    /// Smoothed state so far, used as context for the next prompt
    pub fn stable_state(&self) -> Option<BabyState> {
        (!self.smoother.is_empty()).then(|| self.smoother.stable())
    }

    pub fn aggregate(
        &mut self,
        window: WindowMeta,
        visual: Option<FeatureList>,
        audio: Option<FeatureList>,
    ) -> SceneSummary {
        let v = visual
            .as_ref()
            .and_then(FeatureList::visual)
            .map(VisualFeatures::normalized);
        let a = audio.as_ref().and_then(FeatureList::audio);
        let visual_degraded = visual
            .as_ref()
            .is_some_and(|l| matches!(l.status, FeatureStatus::Degraded(_)));
        let visual_failed = visual.as_ref().is_some_and(|l| l.status.is_failed());

        let audio_cry = a.as_ref().is_some_and(|a| self.audio_cry(a));

        let mut fused = match &v {
            Some(v) => self.fuse_visual(v, audio_cry, visual_degraded),
            None => Self::fuse_audio_only(a.as_ref(), audio_cry),
        };
        fused.severity = self.apply_floors(&fused);

        let summary = template_summary(&SummaryInput {
            state: fused.state,
            face_down: fused.face_down,
            hazards: &fused.hazards,
            heard_crying: fused.state != BabyState::NotPresent
                && audio_cry
                && !v.as_ref().is_some_and(|v| v.crying),
            visual_failed,
            description: v.as_ref().map(|v| v.description.as_str()),
        });

        let stable_state = self.smoother.push(fused.state);

        let features: Vec<FeatureList> = visual.into_iter().chain(audio).collect();
        let modalities: Vec<Modality> = features
            .iter()
            .filter(|f| !f.status.is_failed())
            .map(|f| f.modality)
            .collect();

        debug!(
            window_id = %window.id,
            state = %fused.state,
            stable = %stable_state,
            severity = fused.severity,
            "Window aggregated"
        );

        SceneSummary {
            window_id: window.id,
            timestamp: window.timestamp,
            state: fused.state,
            stable_state,
            severity: fused.severity,
            hazards: fused.hazards,
            face_down: fused.face_down,
            crying: fused.crying,
            notify: fused.notify,
            summary,
            confidence: fused.confidence,
            modalities,
            ground_truth: window.ground_truth,
            features,
        }
    }

    fn audio_cry(&self, audio: &AudioFeatures) -> bool {
        audio.cry_detected && audio.cry_confidence >= self.cfg.audio_cry_confidence_min
    }

    fn fuse_visual(&self, v: &VisualFeatures, audio_cry: bool, degraded: bool) -> Fused {
        let confidence = if degraded {
            DEGRADED_VISUAL_CONFIDENCE
        } else {
            VISUAL_CONFIDENCE
        };

        if !v.baby_present {
            return Fused {
                state: BabyState::NotPresent,
                severity: v.severity,
                hazards: v.hazards.clone(),
                face_down: false,
                crying: false,
                notify: v.notify,
                confidence,
            };
        }

        let crying = v.crying || audio_cry;
        let state = if crying {
            BabyState::AwakeCrying
        } else if v.sleeping {
            BabyState::Asleep
        } else {
            BabyState::AwakePeaceful
        };

        Fused {
            state,
            severity: v.severity,
            hazards: v.hazards.clone(),
            face_down: v.face_down,
            crying,
            notify: v.notify || v.face_down,
            confidence,
        }
    }

    fn fuse_audio_only(a: Option<&AudioFeatures>, audio_cry: bool) -> Fused {
        let (state, confidence) = match a {
            Some(a) if audio_cry => (BabyState::AwakeCrying, a.cry_confidence * AUDIO_ONLY_WEIGHT),
            _ => (BabyState::Unknown, UNKNOWN_CONFIDENCE),
        };
        Fused {
            state,
            severity: 0,
            hazards: Vec::new(),
            face_down: false,
            crying: audio_cry,
            notify: false,
            confidence,
        }
    }

    fn apply_floors(&self, fused: &Fused) -> u8 {
        let mut severity = fused.severity;
        if fused.face_down {
            severity = severity.max(self.cfg.face_down_severity);
        }
        if !fused.hazards.is_empty() {
            severity = severity.max(self.cfg.hazard_severity);
        }
        if fused.crying {
            severity = severity.max(self.cfg.crying_severity);
        }
        severity.min(10)
    }
}

struct Fused {
    state: BabyState,
    severity: u8,
    hazards: Vec<String>,
    face_down: bool,
    crying: bool,
    notify: bool,
    confidence: f64,
}

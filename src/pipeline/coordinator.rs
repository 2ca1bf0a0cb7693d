//! Pipeline Coordinator - per-window processing sequence
//!
//! ```text
//! PHASE 1: Acquisition (InputSource, outside the coordinator)
//! PHASE 2: Preprocessing (normalize; unusable windows are skipped)
//! PHASE 3: Inference (visual and audio analyzers, concurrently)
//! PHASE 4: Aggregation (fusion, floors, smoothing, summary)
//! PHASE 5: Alerting (rule engine with cooldowns)
//! ```

use crate::aggregation::{Aggregator, WindowMeta};
use crate::alerting::AlertEngine;
use crate::config::{MonitorConfig, PreprocessingConfig};
use crate::inference::{AudioAnalyzer, VisionBackend, VisualAnalyzer};
use crate::preprocessing::normalize;
use crate::types::{Alert, AlertSeverity, FeatureList, Modality, RawInput, SceneSummary};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of processing one window
#[derive(Debug, Clone)]
pub struct WindowOutcome {
    pub scene: SceneSummary,
    pub alerts: Vec<Alert>,
}

pub struct PipelineCoordinator {
    preprocessing: PreprocessingConfig,
    /// Phase 3: `None` when the modality is disabled
    visual: Option<VisualAnalyzer>,
    audio: Option<Arc<AudioAnalyzer>>,
    /// Phase 4
    aggregator: Aggregator,
    /// Phase 5
    alert_engine: AlertEngine,
    stats: PipelineStats,
}

impl PipelineCoordinator {
    pub fn new(cfg: &MonitorConfig, backend: Arc<dyn VisionBackend>) -> Self {
        let visual = cfg
            .inference
            .enable_visual
            .then(|| VisualAnalyzer::new(backend, &cfg.inference));
        let audio = cfg
            .inference
            .enable_audio
            .then(|| Arc::new(AudioAnalyzer::new(cfg.inference.audio.clone())));

        info!(
            visual = visual.as_ref().map(VisualAnalyzer::backend_name),
            audio = audio.is_some(),
            "Initializing pipeline coordinator"
        );

        Self {
            preprocessing: cfg.preprocessing.clone(),
            visual,
            audio,
            aggregator: Aggregator::new(cfg.aggregation.clone()),
            alert_engine: AlertEngine::new(&cfg.alerting),
            stats: PipelineStats::default(),
        }
    }

    /// Replace the alert engine (e.g. to continue alert ids from storage)
    pub fn with_alert_engine(mut self, engine: AlertEngine) -> Self {
        self.alert_engine = engine;
        self
    }

    /// Run phases 2-5 on one window. `None` when preprocessing rejected it.
    pub async fn process(&mut self, raw: RawInput) -> Option<WindowOutcome> {
        self.stats.windows_received += 1;
        let window_id = raw.id.clone();

        // PHASE 2
        let mut input = match normalize(raw, &self.preprocessing) {
            Ok(input) => input,
            Err(e) => {
                warn!(window_id = %window_id, error = %e, "Window rejected by preprocessing");
                self.stats.windows_skipped += 1;
                return None;
            }
        };
        for issue in &input.quality.issues {
            debug!(window_id = %window_id, issue = %issue, "Input quality issue");
        }

        // PHASE 3
        let meta = WindowMeta::from(&input);
        let previous = self.aggregator.stable_state();
        let clip = input.audio.take();

        let visual_fut = async {
            match (self.visual.as_ref(), input.image.as_ref()) {
                (Some(analyzer), Some(image)) => Some(
                    analyzer
                        .analyze(&input.id, image, input.label.as_deref(), previous)
                        .await,
                ),
                _ => None,
            }
        };
        let audio_fut = async {
            let (Some(analyzer), Some(clip)) = (self.audio.clone(), clip) else {
                return None;
            };
            let id = input.id.clone();
            let task_id = id.clone();
            match tokio::task::spawn_blocking(move || analyzer.analyze(&task_id, &clip)).await {
                Ok(list) => Some(list),
                Err(e) => Some(FeatureList::failed(
                    Modality::Audio,
                    &id,
                    "acoustic",
                    format!("audio task failed: {e}"),
                )),
            }
        };
        let (visual, audio) = futures::join!(visual_fut, audio_fut);

        if visual.as_ref().is_some_and(|l| l.status.is_failed()) {
            self.stats.visual_failures += 1;
        }

        // PHASE 4
        let scene = self.aggregator.aggregate(meta, visual, audio);

        // PHASE 5
        let alerts = self.alert_engine.evaluate(&scene);

        self.stats.windows_processed += 1;
        self.stats.alerts_raised += alerts.len() as u64;
        self.stats.critical_alerts += alerts
            .iter()
            .filter(|a| a.severity == AlertSeverity::Critical)
            .count() as u64;

        debug!(
            window_id = %scene.window_id,
            state = %scene.state,
            stable = %scene.stable_state,
            severity = scene.severity,
            alerts = alerts.len(),
            "Window processed"
        );

        Some(WindowOutcome { scene, alerts })
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats.clone()
    }
}

/// Pipeline statistics
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct PipelineStats {
    pub windows_received: u64,
    pub windows_processed: u64,
    pub windows_skipped: u64,
    pub visual_failures: u64,
    pub alerts_raised: u64,
    pub critical_alerts: u64,
}

impl std::fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pipeline: {} windows ({} processed, {} skipped, {} visual failures), {} alerts ({} critical)",
            self.windows_received,
            self.windows_processed,
            self.windows_skipped,
            self.visual_failures,
            self.alerts_raised,
            self.critical_alerts
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::{synthetic_clip, synthetic_frame};
    use crate::inference::{LabelOracleBackend, ScriptedBackend};
    use crate::types::BabyState;
    use rand::{rngs::StdRng, SeedableRng};

    fn cfg() -> MonitorConfig {
        let mut cfg = MonitorConfig::default();
        cfg.inference.backoff_base_ms = 0;
        cfg
    }

    fn frame() -> Vec<u8> {
        synthetic_frame(BabyState::Asleep, 64, 64)
    }

    #[tokio::test]
    async fn test_face_down_frame_raises_critical() {
        let backend = Arc::new(ScriptedBackend::new([
            r#"{"baby_present": true, "face_down": true, "sleeping": true, "severity": 8}"#,
        ]));
        let mut coordinator = PipelineCoordinator::new(&cfg(), backend);
        let outcome = coordinator
            .process(RawInput::frame("w1", "test", frame()))
            .await
            .unwrap();
        assert_eq!(outcome.scene.state, BabyState::Asleep);
        assert_eq!(outcome.scene.severity, 9);
        let rules: Vec<&str> = outcome.alerts.iter().map(|a| a.rule.as_str()).collect();
        assert_eq!(rules, vec!["face_down", "severity"]);
        assert_eq!(coordinator.stats().critical_alerts, 2);
    }

    #[tokio::test]
    async fn test_garbage_input_is_skipped() {
        let backend = Arc::new(ScriptedBackend::new(Vec::<String>::new()));
        let mut coordinator = PipelineCoordinator::new(&cfg(), backend.clone());
        let out = coordinator
            .process(RawInput::frame("junk", "test", b"not an image".to_vec()))
            .await;
        assert!(out.is_none());
        assert_eq!(coordinator.stats().windows_skipped, 1);
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_bundle_with_failed_vision_uses_audio() {
        let mut rng = StdRng::seed_from_u64(7);
        let clip = synthetic_clip(BabyState::AwakeCrying, 1.0, 16_000, &mut rng).unwrap();
        let backend = Arc::new(ScriptedBackend::new(Vec::<String>::new()));
        let mut coordinator = PipelineCoordinator::new(&cfg(), backend);
        let outcome = coordinator
            .process(RawInput::bundle("w1", "test", frame(), clip))
            .await
            .unwrap();
        assert!(outcome.scene.visual_failed());
        assert_eq!(outcome.scene.state, BabyState::AwakeCrying);
        assert_eq!(outcome.scene.modalities, vec![Modality::Audio]);
        assert_eq!(coordinator.stats().visual_failures, 1);
    }

    #[tokio::test]
    async fn test_oracle_follows_labels() {
        let mut coordinator = PipelineCoordinator::new(&cfg(), Arc::new(LabelOracleBackend::new()));
        let raw = RawInput::frame("w1", "test", frame()).with_label(Some("not-present".into()));
        let outcome = coordinator.process(raw).await.unwrap();
        assert_eq!(outcome.scene.state, BabyState::NotPresent);
        assert_eq!(outcome.scene.ground_truth.as_deref(), Some("not-present"));
    }

    #[tokio::test]
    async fn test_disabled_visual_skips_backend() {
        let mut cfg = cfg();
        cfg.inference.enable_visual = false;
        let backend = Arc::new(ScriptedBackend::new(Vec::<String>::new()));
        let mut coordinator = PipelineCoordinator::new(&cfg, backend.clone());
        let outcome = coordinator
            .process(RawInput::frame("w1", "test", frame()))
            .await
            .unwrap();
        assert_eq!(outcome.scene.state, BabyState::Unknown);
        assert_eq!(backend.calls(), 0);
    }
}

//! Visual analyzer: VLM call with timeout, retry and lenient parsing

use super::parsing::parse_model_output;
use super::prompts::{build_visual_prompt, CLASSIFICATION_PROMPT};
use super::{InferenceError, VisionBackend, VisionRequest};
use crate::config::defaults::RETRY_BACKOFF_MAX_MS;
use crate::config::InferenceConfig;
use crate::types::{BabyState, FeatureList, FeatureStatus, Modality, NormalizedImage};
use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub struct VisualAnalyzer {
    backend: Arc<dyn VisionBackend>,
    timeout: Duration,
    max_attempts: u32,
    backoff_base_ms: u64,
}

impl VisualAnalyzer {
    pub fn new(backend: Arc<dyn VisionBackend>, cfg: &InferenceConfig) -> Self {
        Self {
            backend,
            timeout: Duration::from_secs(cfg.timeout_secs),
            max_attempts: cfg.max_attempts.max(1),
            backoff_base_ms: cfg.backoff_base_ms,
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.backend_name()
    }

    /// Run the model on one frame.
    ///
    /// Never returns an error: exhausted attempts yield a `Failed` list.
    /// After an unparseable answer the remaining attempts use the shorter
    /// classification prompt, whose bare-label answer still parses.
    pub async fn analyze(
        &self,
        window_id: &str,
        image: &NormalizedImage,
        label: Option<&str>,
        previous: Option<BabyState>,
    ) -> FeatureList {
        let started = Instant::now();
        let mut prompt = build_visual_prompt(previous);

        let mut last_error = String::new();
        for attempt in 1..=self.max_attempts {
            let request = VisionRequest {
                prompt: &prompt,
                image,
                label,
            };
            match self.attempt(request).await {
                Ok((features, label_only)) => {
                    debug!(
                        window_id,
                        attempt,
                        severity = features.severity,
                        label_only,
                        "Visual features parsed"
                    );
                    let status = if label_only {
                        FeatureStatus::Degraded("model answered with a bare label".into())
                    } else {
                        FeatureStatus::Ok
                    };
                    return FeatureList {
                        modality: Modality::Visual,
                        window_id: window_id.to_string(),
                        produced_at: Utc::now(),
                        analyzer: self.backend_name().to_string(),
                        status,
                        features: features.to_map(),
                        latency_ms: started.elapsed().as_millis() as u64,
                    };
                }
                Err(e) => {
                    warn!(
                        window_id,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Visual inference attempt failed"
                    );
                    last_error = e.to_string();
                    if matches!(e, InferenceError::Parse(_)) && prompt != CLASSIFICATION_PROMPT {
                        debug!(window_id, "Switching to the classification prompt");
                        prompt = CLASSIFICATION_PROMPT.to_string();
                    }
                    if attempt < self.max_attempts {
                        tokio::time::sleep(backoff_delay(self.backoff_base_ms, attempt)).await;
                    }
                }
            }
        }

        let mut failed = FeatureList::failed(
            Modality::Visual,
            window_id,
            self.backend_name(),
            format!("{} attempts failed, last error: {last_error}", self.max_attempts),
        );
        failed.latency_ms = started.elapsed().as_millis() as u64;
        failed
    }

    async fn attempt(
        &self,
        request: VisionRequest<'_>,
    ) -> Result<(crate::types::VisualFeatures, bool), InferenceError> {
        let text = tokio::time::timeout(self.timeout, self.backend.generate(request))
            .await
            .map_err(|_| InferenceError::Timeout(self.timeout.as_secs()))??;
        Ok(parse_model_output(&text)?.into_features())
    }
}

/// Exponential backoff with up to 50 % jitter, capped.
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    if base_ms == 0 {
        return Duration::ZERO;
    }
    let exp = base_ms
        .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
        .min(RETRY_BACKOFF_MAX_MS);
    let jitter = rand::thread_rng().gen_range(0..=exp / 2);
    Duration::from_millis((exp + jitter).min(RETRY_BACKOFF_MAX_MS))
}

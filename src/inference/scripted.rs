//! Offline vision backends: canned responses and a ground-truth oracle

use super::parsing::derive_fields;
use super::{InferenceError, VisionBackend, VisionRequest};
use crate::types::BabyState;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Returns queued responses in order; used by tests and demos.
pub struct ScriptedBackend {
    script: Mutex<VecDeque<String>>,
    /// Answer once the script runs out; `None` makes an exhausted script an error
    fallback: Option<String>,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Mutex::new(responses.into_iter().map(Into::into).collect()),
            fallback: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Answer with `response` once the queue is empty.
    pub fn with_fallback(mut self, response: impl Into<String>) -> Self {
        self.fallback = Some(response.into());
        self
    }

    /// Number of `generate` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl VisionBackend for ScriptedBackend {
    async fn generate(&self, _request: VisionRequest<'_>) -> Result<String, InferenceError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let next = self
            .script
            .lock()
            .map_err(|_| InferenceError::Backend("script lock poisoned".into()))?
            .pop_front();
        next.or_else(|| self.fallback.clone())
            .ok_or_else(|| InferenceError::Backend("script exhausted".into()))
    }

    fn backend_name(&self) -> &str {
        "scripted"
    }
}

/// Answers from the window's ground-truth label, for dry runs without a model.
#[derive(Debug, Default)]
pub struct LabelOracleBackend;

impl LabelOracleBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl VisionBackend for LabelOracleBackend {
    async fn generate(&self, request: VisionRequest<'_>) -> Result<String, InferenceError> {
        let label = request
            .label
            .ok_or_else(|| InferenceError::Backend("window has no ground-truth label".into()))?;
        let state = BabyState::from_label(label)
            .ok_or_else(|| InferenceError::Backend(format!("unknown label '{label}'")))?;
        let features = derive_fields(state);
        serde_json::to_string(&features).map_err(|e| InferenceError::Backend(e.to_string()))
    }

    fn backend_name(&self) -> &str {
        "label-oracle"
    }
}

//! Multi-modal inference (Phase 3)
//!
//! ## Architecture
//!
//! - **VisualAnalyzer**: sends each frame to a [`VisionBackend`] with the
//!   structured prompt, retries with backoff, and parses the answer leniently.
//! - **AudioAnalyzer**: deterministic acoustic cry detector (loudness,
//!   zero-crossing rate, autocorrelation pitch). No model involved.
//!
//! Both produce a [`FeatureList`](crate::types::FeatureList) per window; a
//! failed analyzer yields a `Failed` list instead of an error so the window
//! still reaches aggregation.

mod audio;
mod openai_compat;
pub mod parsing;
pub mod prompts;
mod scripted;
mod visual;

pub use audio::AudioAnalyzer;
pub use openai_compat::{ChatRequest, OpenAiCompatBackend};
pub use parsing::{parse_model_output, ModelOutput, ParseError};
pub use scripted::{LabelOracleBackend, ScriptedBackend};
pub use visual::VisualAnalyzer;

use crate::config::InferenceConfig;
use crate::types::NormalizedImage;
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("backend returned no content")]
    EmptyResponse,

    #[error("backend timed out after {0} s")]
    Timeout(u64),

    #[error("unparseable model output: {0}")]
    Parse(#[from] ParseError),

    #[error("backend error: {0}")]
    Backend(String),
}

/// One request to a vision backend
#[derive(Debug, Clone, Copy)]
pub struct VisionRequest<'a> {
    pub prompt: &'a str,
    pub image: &'a NormalizedImage,
    /// Ground-truth label when replaying a labelled dataset
    pub label: Option<&'a str>,
}

/// Unified trait for vision-language backends
#[async_trait]
pub trait VisionBackend: Send + Sync {
    /// Generate the model's raw text answer for a frame and prompt
    async fn generate(&self, request: VisionRequest<'_>) -> Result<String, InferenceError>;

    /// Backend name for logging and feature provenance
    fn backend_name(&self) -> &str;
}

/// Build the backend selected by `inference.backend`.
pub fn build_backend(cfg: &InferenceConfig) -> Result<Arc<dyn VisionBackend>, InferenceError> {
    match cfg.backend.as_str() {
        "openai" => Ok(Arc::new(OpenAiCompatBackend::new(cfg)?)),
        "oracle" => Ok(Arc::new(LabelOracleBackend::new())),
        other => Err(InferenceError::Backend(format!("unknown backend '{other}'"))),
    }
}

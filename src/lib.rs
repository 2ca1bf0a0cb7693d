//! CradleWatch: multi-modal baby monitoring
//!
//! Camera frames and microphone clips flow through a five-phase pipeline
//! that ends in a per-window scene summary and rule-based alerts.
//!
//! ## Architecture
//!
//! - **Acquisition**: dataset manifests, watched directories, stdin, synthetic
//! - **Preprocessing**: format checks, frame encoding, 16 kHz mono audio
//! - **Inference**: vision-language model backend plus an acoustic cry analyzer
//! - **Aggregation**: modality fusion, severity floors, temporal smoothing
//! - **Alerting**: pluggable rules with per-rule cooldowns and notifiers

pub mod acquisition;
pub mod aggregation;
pub mod alerting;
pub mod api;
pub mod config;
pub mod evaluation;
pub mod inference;
pub mod pipeline;
pub mod preprocessing;
pub mod storage;
pub mod types;

pub use config::MonitorConfig;
pub use pipeline::{AppState, PipelineCoordinator, PipelineStats, ProcessingLoop, SystemStatus};
pub use storage::{HistoryStorage, StorageError, StorageStats};
pub use types::{Alert, AlertSeverity, BabyState, RawInput, SceneSummary};

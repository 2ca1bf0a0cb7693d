//! Processing Pipeline Module
//!
//! ## 5-Phase Pipeline Architecture
//!
//! ```text
//! PHASE 1: Input Acquisition (dataset, directory, stdin, synthetic)
//! PHASE 2: Preprocessing (format checks, base64 frame, 16 kHz mono audio)
//! PHASE 3: Multi-Modal Inference (VLM + acoustic cry analyzer, concurrent)
//! PHASE 4: Aggregation & Summarization (fused state, smoothing, summary)
//! PHASE 5: Alerting (rules, cooldowns, persistence, notifiers)
//! ```
//!
//! Windows are processed one at a time in input order; the loop awaits the
//! whole window before pulling the next one.

mod coordinator;
pub mod processing_loop;
mod state;

pub use coordinator::{PipelineCoordinator, PipelineStats, WindowOutcome};
pub use processing_loop::ProcessingLoop;
pub use state::*;

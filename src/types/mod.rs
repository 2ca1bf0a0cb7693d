//! Shared data structures for the monitoring pipeline
//!
//! This module defines the core types passed between stages:
//! - Phase 1: RawInput (frame, audio clip, or both)
//! - Phase 2: NormalizedInput (fixed-format image/audio)
//! - Phase 3: FeatureList (per-modality structured features)
//! - Phase 4: SceneSummary (classification + natural-language summary)
//! - Phase 5: Alert (triggered rule)

mod input;
mod features;
mod scene;
mod alert;

pub use input::*;
pub use features::*;
pub use scene::*;
pub use alert::*;

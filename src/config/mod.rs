//! Monitor Configuration Module
//!
//! Provides monitor configuration loaded from TOML files: preprocessing
//! limits, VLM backend settings, aggregation floors, and alert thresholds.
//!
//! ## Loading Order
//!
//! 1. `CRADLEWATCH_CONFIG` environment variable (path to TOML file)
//! 2. `monitor_config.toml` in the current working directory
//! 3. Built-in defaults
//!
//! Validation runs after environment overrides are merged, so a bad
//! `CRADLEWATCH_SERVER_ADDR` fails startup like a bad file value would.

mod monitor_config;
pub mod defaults;
pub mod validation;

pub use monitor_config::*;


//! System-wide default constants.
//!
//! Values that are not operator-tunable through `monitor_config.toml`.
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Configuration
// ============================================================================

/// Environment variable holding an explicit config file path.
pub const CONFIG_ENV_VAR: &str = "CRADLEWATCH_CONFIG";

/// Config file looked up in the working directory when the env var is unset.
pub const LOCAL_CONFIG_FILE: &str = "monitor_config.toml";

/// Overrides `inference.api_key` so secrets stay out of the TOML file.
pub const VLM_API_KEY_ENV_VAR: &str = "CRADLEWATCH_VLM_API_KEY";

/// Overrides `server.addr`.
pub const SERVER_ADDR_ENV_VAR: &str = "CRADLEWATCH_SERVER_ADDR";

// ============================================================================
// Pipeline
// ============================================================================

/// Log a progress line every N processed windows.
pub const PROGRESS_LOG_INTERVAL: u64 = 10;

/// Capacity of the in-process alert broadcast channel.
pub const ALERT_CHANNEL_CAPACITY: usize = 256;

// ============================================================================
// Inference
// ============================================================================

/// Analysis frame length for the acoustic analyzer (milliseconds).
pub const AUDIO_FRAME_MS: u32 = 32;

/// Frames quieter than this (dBFS) are treated as unvoiced.
pub const AUDIO_VOICING_FLOOR_DBFS: f64 = -50.0;

/// Minimum normalised autocorrelation peak for a frame to count as voiced.
pub const AUDIO_VOICING_THRESHOLD: f64 = 0.3;

/// Upper bound on a single retry backoff sleep (milliseconds).
pub const RETRY_BACKOFF_MAX_MS: u64 = 10_000;

// ============================================================================
// API
// ============================================================================

/// Default `limit` for list endpoints.
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Hard cap on `limit` for list endpoints.
pub const MAX_LIST_LIMIT: usize = 500;

/// API version string reported in response envelopes.
pub const API_VERSION: &str = "v1";

//! Monitor Configuration - operator-tunable TOML values
//!
//! Each struct implements `Default` with the values used when no config file
//! is present, so a bare `cradlewatch` run behaves sensibly.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;
use super::validation::{self, ValidationWarning};

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a monitor deployment.
///
/// Load with `MonitorConfig::load()` which searches:
/// 1. `$CRADLEWATCH_CONFIG` env var
/// 2. `./monitor_config.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Monitor identification
    #[serde(default)]
    pub monitor: MonitorInfo,

    /// Input normalisation limits
    #[serde(default)]
    pub preprocessing: PreprocessingConfig,

    /// VLM backend and acoustic analyzer settings
    #[serde(default)]
    pub inference: InferenceConfig,

    /// Fusion floors and temporal smoothing
    #[serde(default)]
    pub aggregation: AggregationConfig,

    /// Rule thresholds and cooldowns
    #[serde(default)]
    pub alerting: AlertingConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// History database
    #[serde(default)]
    pub storage: StorageConfig,
}

impl MonitorConfig {
    /// Load configuration using the standard search order:
    /// 1. `$CRADLEWATCH_CONFIG` environment variable
    /// 2. `./monitor_config.toml` in the current working directory
    /// 3. Built-in defaults
    ///
    /// Environment overrides are applied on top of whichever source wins,
    /// and the merged result is validated.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_file_or_default().with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup` (an env var reader in production) and
    /// validate the merged config. Warnings are logged.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.apply_overrides(lookup);
        for w in self.validate()? {
            warn!("{}", w);
        }
        Ok(self)
    }

    fn load_file_or_default() -> Self {
        // 1. Check env var
        if let Ok(path) = std::env::var(defaults::CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), monitor = %config.monitor.name, "Loaded monitor config from CRADLEWATCH_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from CRADLEWATCH_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "CRADLEWATCH_CONFIG points to non-existent file, falling back");
            }
        }

        // 2. Check ./monitor_config.toml
        let local = PathBuf::from(defaults::LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(monitor = %config.monitor.name, "Loaded monitor config from ./monitor_config.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./monitor_config.toml, using defaults");
                }
            }
        }

        // 3. Defaults
        info!("No monitor_config.toml found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let (config, warnings) = Self::from_toml_str(&contents)?;
        for w in &warnings {
            warn!(path = %path.display(), "{}", w);
        }
        Ok(config)
    }

    /// Parse and validate a TOML document.
    ///
    /// Two passes: unknown keys are collected as warnings first, then the
    /// document is deserialized and validated. Returns the non-fatal warnings
    /// alongside the config.
    pub fn from_toml_str(contents: &str) -> Result<(Self, Vec<ValidationWarning>), ConfigError> {
        let mut warnings = validation::validate_unknown_keys(contents);
        let config: Self = toml::from_str(contents)?;
        warnings.extend(config.validate()?);
        Ok((config, warnings))
    }

    /// Apply `CRADLEWATCH_VLM_API_KEY` and `CRADLEWATCH_SERVER_ADDR`.
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(key) = non_empty(defaults::VLM_API_KEY_ENV_VAR) {
            self.inference.api_key = Some(key);
        }
        if let Some(addr) = non_empty(defaults::SERVER_ADDR_ENV_VAR) {
            self.server.addr = addr;
        }
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Copy safe to expose over the API (secrets removed).
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.inference.api_key.is_some() {
            copy.inference.api_key = Some("***".to_string());
        }
        copy
    }

    /// Validate all values for internal consistency.
    ///
    /// Returns the non-fatal warnings on success; any hard error fails the
    /// whole config with every problem listed.
    pub fn validate(&self) -> Result<Vec<ValidationWarning>, ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        // Preprocessing
        let p = &self.preprocessing;
        if p.max_image_bytes == 0 {
            errors.push("preprocessing.max_image_bytes must be > 0".to_string());
        }
        if !(8_000..=48_000).contains(&p.target_sample_rate) {
            errors.push(format!(
                "preprocessing.target_sample_rate = {} is outside 8000-48000 Hz",
                p.target_sample_rate
            ));
        }
        if !p.max_audio_secs.is_finite() || p.max_audio_secs <= 0.0 {
            errors.push(format!(
                "preprocessing.max_audio_secs = {} must be a positive number",
                p.max_audio_secs
            ));
        } else if f64::from(p.min_audio_ms) >= p.max_audio_secs * 1000.0 {
            errors.push(format!(
                "preprocessing.min_audio_ms ({}) must be shorter than max_audio_secs ({:.1} s)",
                p.min_audio_ms, p.max_audio_secs
            ));
        }

        // Inference
        let i = &self.inference;
        if !BACKENDS.contains(&i.backend.as_str()) {
            errors.push(format!(
                "inference.backend = '{}' is not one of {:?}",
                i.backend, BACKENDS
            ));
        }
        if i.backend == "openai" && i.base_url.trim().is_empty() {
            errors.push("inference.base_url must be set for the openai backend".to_string());
        }
        if i.max_attempts == 0 {
            errors.push("inference.max_attempts must be >= 1".to_string());
        }
        if i.timeout_secs == 0 {
            errors.push("inference.timeout_secs must be > 0".to_string());
        }
        if !(0.0..=2.0).contains(&i.temperature) {
            errors.push(format!(
                "inference.temperature = {} is outside 0.0-2.0",
                i.temperature
            ));
        }
        if !i.enable_visual && !i.enable_audio {
            errors.push("inference: at least one of enable_visual / enable_audio must be true".to_string());
        }
        let a = &i.audio;
        if !a.cry_pitch_min_hz.is_finite() || !a.cry_pitch_max_hz.is_finite() {
            errors.push("inference.audio: pitch bounds must be finite".to_string());
        } else if a.cry_pitch_min_hz <= 0.0 || a.cry_pitch_min_hz >= a.cry_pitch_max_hz {
            errors.push(format!(
                "inference.audio.cry_pitch_min_hz ({:.0}) must be > 0 and < cry_pitch_max_hz ({:.0})",
                a.cry_pitch_min_hz, a.cry_pitch_max_hz
            ));
        }
        if !(0.0..=1.0).contains(&a.cry_min_voiced_ratio) {
            errors.push(format!(
                "inference.audio.cry_min_voiced_ratio = {} is outside 0.0-1.0",
                a.cry_min_voiced_ratio
            ));
        }
        if !a.cry_loudness_dbfs.is_finite() || a.cry_loudness_dbfs > 0.0 {
            errors.push(format!(
                "inference.audio.cry_loudness_dbfs = {} must be a finite value <= 0",
                a.cry_loudness_dbfs
            ));
        }

        // Aggregation
        let g = &self.aggregation;
        if g.smoothing_window == 0 {
            errors.push("aggregation.smoothing_window must be >= 1".to_string());
        }
        if !(0.0..=1.0).contains(&g.audio_cry_confidence_min) {
            errors.push(format!(
                "aggregation.audio_cry_confidence_min = {} is outside 0.0-1.0",
                g.audio_cry_confidence_min
            ));
        }
        for (name, value) in [
            ("face_down_severity", g.face_down_severity),
            ("hazard_severity", g.hazard_severity),
            ("crying_severity", g.crying_severity),
        ] {
            if value > 10 {
                errors.push(format!("aggregation.{name} = {value} exceeds 10"));
            }
        }

        // Alerting
        let al = &self.alerting;
        if !(1..=10).contains(&al.severity_threshold) {
            errors.push(format!(
                "alerting.severity_threshold = {} is outside 1-10",
                al.severity_threshold
            ));
        }
        if al.crying_windows == 0 {
            errors.push("alerting.crying_windows must be >= 1".to_string());
        }
        if al.degraded_windows == 0 {
            errors.push("alerting.degraded_windows must be >= 1".to_string());
        }
        for rule in &al.disabled_rules {
            if !BUILTIN_RULES.contains(&rule.as_str()) {
                errors.push(format!(
                    "alerting.disabled_rules: unknown rule '{rule}' (known: {})",
                    BUILTIN_RULES.join(", ")
                ));
            }
        }

        // Server
        let port = self
            .server
            .addr
            .rsplit_once(':')
            .and_then(|(host, port)| (!host.is_empty()).then_some(port))
            .and_then(|port| port.parse::<u16>().ok());
        if port.is_none() {
            errors.push(format!(
                "server.addr = '{}' must be HOST:PORT",
                self.server.addr
            ));
        }

        // Storage
        if self.storage.db_path.trim().is_empty() {
            errors.push("storage.db_path must not be empty".to_string());
        }

        let (range_errors, warnings) = validation::validate_ranges(self);
        errors.extend(range_errors);

        if errors.is_empty() {
            Ok(warnings)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config I/O error ({}): {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("config validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}

// ============================================================================
// Monitor Info
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorInfo {
    /// Display name (e.g. the room)
    #[serde(default = "default_monitor_name")]
    pub name: String,

    /// Poll interval for directory sources (milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_monitor_name() -> String {
    "nursery".to_string()
}
fn default_poll_interval_ms() -> u64 { 500 }

impl Default for MonitorInfo {
    fn default() -> Self {
        Self {
            name: default_monitor_name(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

// ============================================================================
// Preprocessing
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Frames larger than this are rejected.
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,

    /// Frames with a side shorter than this are rejected (when the header
    /// exposes dimensions).
    #[serde(default = "default_min_image_dim")]
    pub min_image_dim: u32,

    /// Audio is resampled to this rate (Hz).
    #[serde(default = "default_target_sample_rate")]
    pub target_sample_rate: u32,

    /// Longer clips are truncated.
    #[serde(default = "default_max_audio_secs")]
    pub max_audio_secs: f64,

    /// Shorter clips are rejected.
    #[serde(default = "default_min_audio_ms")]
    pub min_audio_ms: u32,
}

fn default_max_image_bytes() -> usize { 10 * 1024 * 1024 }
fn default_min_image_dim() -> u32 { 32 }
fn default_target_sample_rate() -> u32 { 16_000 }
fn default_max_audio_secs() -> f64 { 30.0 }
fn default_min_audio_ms() -> u32 { 250 }

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            max_image_bytes: default_max_image_bytes(),
            min_image_dim: default_min_image_dim(),
            target_sample_rate: default_target_sample_rate(),
            max_audio_secs: default_max_audio_secs(),
            min_audio_ms: default_min_audio_ms(),
        }
    }
}

// ============================================================================
// Inference
// ============================================================================

/// Accepted values for `inference.backend`.
pub const BACKENDS: &[&str] = &["openai", "oracle"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// `openai` (OpenAI-compatible HTTP server) or `oracle` (derive answers
    /// from ground-truth labels, for offline dry runs)
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Base URL of the OpenAI-compatible server (without `/v1`)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Bearer token. Prefer `CRADLEWATCH_VLM_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-attempt request timeout (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Total attempts per window including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First retry delay; doubles per attempt (milliseconds)
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_true")]
    pub enable_visual: bool,

    #[serde(default = "default_true")]
    pub enable_audio: bool,

    #[serde(default)]
    pub audio: AudioAnalyzerConfig,
}

fn default_backend() -> String {
    "openai".to_string()
}
fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_model() -> String {
    "Qwen/Qwen2.5-VL-7B-Instruct".to_string()
}
fn default_timeout_secs() -> u64 { 60 }
fn default_max_attempts() -> u32 { 3 }
fn default_backoff_base_ms() -> u64 { 500 }
fn default_max_tokens() -> u32 { 512 }
fn default_temperature() -> f64 { 0.1 }
fn default_true() -> bool { true }

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            enable_visual: true,
            enable_audio: true,
            audio: AudioAnalyzerConfig::default(),
        }
    }
}

/// Acoustic cry detector thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioAnalyzerConfig {
    /// Clip RMS loudness must reach this level (dBFS)
    #[serde(default = "default_cry_loudness_dbfs")]
    pub cry_loudness_dbfs: f64,

    /// Infant cry fundamental is roughly 250-700 Hz
    #[serde(default = "default_cry_pitch_min_hz")]
    pub cry_pitch_min_hz: f64,

    #[serde(default = "default_cry_pitch_max_hz")]
    pub cry_pitch_max_hz: f64,

    /// Fraction of frames that must be voiced in the cry band
    #[serde(default = "default_cry_min_voiced_ratio")]
    pub cry_min_voiced_ratio: f64,
}

fn default_cry_loudness_dbfs() -> f64 { -35.0 }
fn default_cry_pitch_min_hz() -> f64 { 250.0 }
fn default_cry_pitch_max_hz() -> f64 { 700.0 }
fn default_cry_min_voiced_ratio() -> f64 { 0.3 }

impl Default for AudioAnalyzerConfig {
    fn default() -> Self {
        Self {
            cry_loudness_dbfs: default_cry_loudness_dbfs(),
            cry_pitch_min_hz: default_cry_pitch_min_hz(),
            cry_pitch_max_hz: default_cry_pitch_max_hz(),
            cry_min_voiced_ratio: default_cry_min_voiced_ratio(),
        }
    }
}

// ============================================================================
// Aggregation
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Number of recent window states considered for `stable_state`
    #[serde(default = "default_smoothing_window")]
    pub smoothing_window: usize,

    /// Audio cries below this confidence do not override the visual verdict
    #[serde(default = "default_audio_cry_confidence_min")]
    pub audio_cry_confidence_min: f64,

    /// Severity floor when the baby is face-down
    #[serde(default = "default_face_down_severity")]
    pub face_down_severity: u8,

    /// Severity floor when any hazard is visible
    #[serde(default = "default_hazard_severity")]
    pub hazard_severity: u8,

    /// Severity floor while crying
    #[serde(default = "default_crying_severity")]
    pub crying_severity: u8,
}

fn default_smoothing_window() -> usize { 5 }
fn default_audio_cry_confidence_min() -> f64 { 0.5 }
fn default_face_down_severity() -> u8 { 9 }
fn default_hazard_severity() -> u8 { 6 }
fn default_crying_severity() -> u8 { 3 }

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            smoothing_window: default_smoothing_window(),
            audio_cry_confidence_min: default_audio_cry_confidence_min(),
            face_down_severity: default_face_down_severity(),
            hazard_severity: default_hazard_severity(),
            crying_severity: default_crying_severity(),
        }
    }
}

// ============================================================================
// Alerting
// ============================================================================

/// Names of the built-in alert rules, in evaluation order.
pub const BUILTIN_RULES: &[&str] = &[
    "face_down",
    "hazard",
    "severity",
    "sustained_crying",
    "left_crib",
    "model_notify",
    "inference_degraded",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertingConfig {
    /// Minimum time between alerts from the same rule (seconds, window time)
    #[serde(default = "default_cooldown_seconds")]
    pub default_cooldown_seconds: u64,

    /// Whether critical alerts bypass the cooldown
    #[serde(default = "default_true")]
    pub critical_bypass_cooldown: bool,

    /// `severity` rule fires at or above this value
    #[serde(default = "default_severity_threshold")]
    pub severity_threshold: u8,

    /// Consecutive crying windows before `sustained_crying` fires
    #[serde(default = "default_crying_windows")]
    pub crying_windows: usize,

    /// Consecutive failed visual windows before `inference_degraded` fires
    #[serde(default = "default_degraded_windows")]
    pub degraded_windows: usize,

    /// Hazards escalated to Critical (substring match, case-insensitive)
    #[serde(default = "default_critical_hazards")]
    pub critical_hazards: Vec<String>,

    /// Built-in rules to skip
    #[serde(default)]
    pub disabled_rules: Vec<String>,
}

fn default_cooldown_seconds() -> u64 { 60 }
fn default_severity_threshold() -> u8 { 7 }
fn default_crying_windows() -> usize { 3 }
fn default_degraded_windows() -> usize { 3 }
fn default_critical_hazards() -> Vec<String> {
    ["cord", "plastic bag", "pillow", "strap"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for AlertingConfig {
    fn default() -> Self {
        Self {
            default_cooldown_seconds: default_cooldown_seconds(),
            critical_bypass_cooldown: true,
            severity_threshold: default_severity_threshold(),
            crying_windows: default_crying_windows(),
            degraded_windows: default_degraded_windows(),
            critical_hazards: default_critical_hazards(),
            disabled_rules: Vec::new(),
        }
    }
}

impl AlertingConfig {
    pub fn is_enabled(&self, rule: &str) -> bool {
        !self.disabled_rules.iter().any(|r| r == rule)
    }
}

// ============================================================================
// Server
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server bind address.
    ///
    /// Can be overridden by `CRADLEWATCH_SERVER_ADDR` env var or `--addr` CLI flag.
    #[serde(default = "default_server_addr")]
    pub addr: String,
}

fn default_server_addr() -> String {
    "0.0.0.0:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_server_addr(),
        }
    }
}

// ============================================================================
// Storage
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Scenes and alerts older than this are pruned at startup (hours, 0 = keep all)
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,
}

fn default_db_path() -> String {
    "./data/cradlewatch.db".to_string()
}
fn default_retention_hours() -> u64 { 168 }

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            retention_hours: default_retention_hours(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let warnings = MonitorConfig::default().validate().expect("defaults must validate");
        assert!(warnings.is_empty(), "unexpected warnings: {:?}", warnings);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let (config, _) = MonitorConfig::from_toml_str(
            r#"
[alerting]
severity_threshold = 8
"#,
        )
        .unwrap();
        assert_eq!(config.alerting.severity_threshold, 8);
        assert_eq!(config.alerting.crying_windows, 3);
        assert_eq!(config.preprocessing.target_sample_rate, 16_000);
    }

    #[test]
    fn test_inverted_pitch_band_rejected() {
        let mut config = MonitorConfig::default();
        config.inference.audio.cry_pitch_min_hz = 800.0;
        config.inference.audio.cry_pitch_max_hz = 300.0;
        match config.validate() {
            Err(ConfigError::Validation(errors)) => {
                assert!(errors.iter().any(|e| e.contains("cry_pitch_min_hz")));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_disabled_rule_rejected() {
        let mut config = MonitorConfig::default();
        config.alerting.disabled_rules = vec!["face_dwn".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let mut config = MonitorConfig::default();
        config.inference.backend = "gemini".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides_are_validated() {
        let lookup = |name: &str| match name {
            defaults::SERVER_ADDR_ENV_VAR => Some("no-port-here".to_string()),
            _ => None,
        };
        match MonitorConfig::default().with_overrides(lookup) {
            Err(ConfigError::Validation(errors)) => {
                assert!(errors.iter().any(|e| e.contains("server.addr")), "{errors:?}");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_env_overrides_applied() {
        let lookup = |name: &str| match name {
            defaults::SERVER_ADDR_ENV_VAR => Some("127.0.0.1:9000".to_string()),
            defaults::VLM_API_KEY_ENV_VAR => Some("  ".to_string()),
            _ => None,
        };
        let config = MonitorConfig::default().with_overrides(lookup).unwrap();
        assert_eq!(config.server.addr, "127.0.0.1:9000");
        assert!(config.inference.api_key.is_none());
    }

    #[test]
    fn test_redacted_hides_api_key() {
        let mut config = MonitorConfig::default();
        config.inference.api_key = Some("sk-secret".to_string());
        assert_eq!(config.redacted().inference.api_key.as_deref(), Some("***"));
    }

    #[test]
    fn test_to_toml_round_trips() {
        let config = MonitorConfig::default();
        let text = config.to_toml().unwrap();
        let (parsed, warnings) = MonitorConfig::from_toml_str(&text).unwrap();
        assert!(warnings.is_empty(), "{:?}", warnings);
        assert_eq!(parsed.storage.db_path, config.storage.db_path);
    }
}

//! Config Validation Tests
//!
//! Typo detection and range validation, exercised independently from the
//! rest of the pipeline.

use cradlewatch::config::validation::{known_config_keys, suggest_correction, validate_unknown_keys};
use cradlewatch::config::{ConfigError, MonitorConfig};

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_alerting_key_warns_with_suggestion() {
    let toml_str = r#"
[alerting]
crying_window = 4
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert_eq!(warnings[0].field, "alerting.crying_window");
    assert_eq!(
        warnings[0].suggestion.as_deref(),
        Some("alerting.crying_windows"),
        "Should suggest the correct spelling"
    );
}

#[test]
fn typo_in_nested_audio_section() {
    let toml_str = r#"
[inference.audio]
cry_pitch_mn_hz = 250.0
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1);
    assert_eq!(
        warnings[0].suggestion.as_deref(),
        Some("inference.audio.cry_pitch_min_hz")
    );
}

#[test]
fn unknown_section_has_no_close_suggestion() {
    let warnings = validate_unknown_keys("[telemetry]\nendpoint = \"x\"\n");
    assert_eq!(warnings.len(), 2);
    assert!(warnings.iter().all(|w| w.suggestion.is_none()));
}

#[test]
fn valid_keys_produce_no_warnings() {
    let toml_str = r#"
[monitor]
name = "Nursery"

[inference]
backend = "oracle"
enable_audio = true

[alerting]
disabled_rules = ["model_notify"]
"#;
    assert!(validate_unknown_keys(toml_str).is_empty());
}

#[test]
fn exact_key_is_its_own_suggestion() {
    let known = known_config_keys();
    assert_eq!(
        suggest_correction("server.addr", &known).as_deref(),
        Some("server.addr")
    );
    assert!(suggest_correction("completely.unrelated.key", &known).is_none());
}

// ============================================================================
// Range Validation
// ============================================================================

#[test]
fn defaults_validate_cleanly() {
    let warnings = MonitorConfig::default().validate().unwrap();
    assert!(warnings.is_empty());
}

#[test]
fn inverted_pitch_band_rejected() {
    let toml_str = r#"
[inference.audio]
cry_pitch_min_hz = 900.0
cry_pitch_max_hz = 300.0
"#;
    match MonitorConfig::from_toml_str(toml_str) {
        Err(ConfigError::Validation(errors)) => {
            assert!(errors.iter().any(|e| e.contains("cry_pitch_min_hz")));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn every_problem_is_reported() {
    let toml_str = r#"
[inference]
backend = "llama"
max_attempts = 0

[alerting]
severity_threshold = 11
disabled_rules = ["nap_time"]
"#;
    let Err(ConfigError::Validation(errors)) = MonitorConfig::from_toml_str(toml_str) else {
        panic!("expected validation errors");
    };
    assert_eq!(errors.len(), 4, "{errors:?}");
}

#[test]
fn both_modalities_disabled_rejected() {
    let mut cfg = MonitorConfig::default();
    cfg.inference.enable_visual = false;
    cfg.inference.enable_audio = false;
    assert!(matches!(cfg.validate(), Err(ConfigError::Validation(_))));
}

#[test]
fn suspicious_values_only_warn() {
    let toml_str = r#"
[aggregation]
smoothing_window = 120
"#;
    let (config, warnings) = MonitorConfig::from_toml_str(toml_str).unwrap();
    assert_eq!(config.aggregation.smoothing_window, 120);
    assert!(warnings.iter().any(|w| w.field == "aggregation.smoothing_window"));
}

#[test]
fn pitch_above_nyquist_rejected() {
    let toml_str = r#"
[preprocessing]
target_sample_rate = 8000

[inference.audio]
cry_pitch_max_hz = 5000.0
"#;
    assert!(MonitorConfig::from_toml_str(toml_str).is_err());
}

#[test]
fn toml_round_trip_preserves_values() {
    let mut cfg = MonitorConfig::default();
    cfg.monitor.name = "Twins room".to_string();
    cfg.alerting.crying_windows = 5;
    let text = cfg.to_toml().unwrap();
    let (parsed, warnings) = MonitorConfig::from_toml_str(&text).unwrap();
    assert!(warnings.is_empty(), "{warnings:?}");
    assert_eq!(parsed.monitor.name, "Twins room");
    assert_eq!(parsed.alerting.crying_windows, 5);
}

//! Checks that run on top of serde when a monitor config is loaded.
//!
//! Unknown keys become warnings with a nearest-key suggestion, since serde
//! drops them silently. Range checks split into hard errors, which stop
//! startup, and warnings for values that are legal but odd.

use serde::Serialize;
use std::collections::HashSet;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone, Serialize)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl ValidationWarning {
    fn odd_value(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
            suggestion: None,
        }
    }
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

/// Dotted paths of every field `MonitorConfig` accepts.
///
/// Keep in step with the structs in monitor_config.rs.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [monitor]
        "monitor",
        "monitor.name",
        "monitor.poll_interval_ms",
        // [preprocessing]
        "preprocessing",
        "preprocessing.max_image_bytes",
        "preprocessing.min_image_dim",
        "preprocessing.target_sample_rate",
        "preprocessing.max_audio_secs",
        "preprocessing.min_audio_ms",
        // [inference]
        "inference",
        "inference.backend",
        "inference.base_url",
        "inference.model",
        "inference.api_key",
        "inference.timeout_secs",
        "inference.max_attempts",
        "inference.backoff_base_ms",
        "inference.max_tokens",
        "inference.temperature",
        "inference.enable_visual",
        "inference.enable_audio",
        // [inference.audio]
        "inference.audio",
        "inference.audio.cry_loudness_dbfs",
        "inference.audio.cry_pitch_min_hz",
        "inference.audio.cry_pitch_max_hz",
        "inference.audio.cry_min_voiced_ratio",
        // [aggregation]
        "aggregation",
        "aggregation.smoothing_window",
        "aggregation.audio_cry_confidence_min",
        "aggregation.face_down_severity",
        "aggregation.hazard_severity",
        "aggregation.crying_severity",
        // [alerting]
        "alerting",
        "alerting.default_cooldown_seconds",
        "alerting.critical_bypass_cooldown",
        "alerting.severity_threshold",
        "alerting.crying_windows",
        "alerting.degraded_windows",
        "alerting.critical_hazards",
        "alerting.disabled_rules",
        // [server]
        "server",
        "server.addr",
        // [storage]
        "storage",
        "storage.db_path",
        "storage.retention_hours",
    ];
    keys.iter().copied().collect()
}

/// Every dotted key path in a parsed document, tables included.
///
/// `[inference.audio] cry_loudness_dbfs = -30` contributes `inference`,
/// `inference.audio` and `inference.audio.cry_loudness_dbfs`.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let Some(table) = value.as_table() else {
        return Vec::new();
    };
    table
        .iter()
        .flat_map(|(key, child)| {
            let path = match prefix {
                "" => key.clone(),
                _ => format!("{prefix}.{key}"),
            };
            std::iter::once(path.clone()).chain(walk_toml_keys(child, &path))
        })
        .collect()
}

/// Edit distance over chars, one DP row.
fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = (above + 1)
                .min(row[j] + 1)
                .min(diagonal + usize::from(ca != *cb));
            diagonal = above;
        }
    }
    row[b.len()]
}

/// Largest edit distance still offered as a "did you mean"
const MAX_SUGGESTION_DISTANCE: usize = 3;

/// Closest known key to `unknown`, ties broken alphabetically.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|&candidate| (edit_distance(unknown, candidate), candidate))
        .filter(|(distance, _)| *distance <= MAX_SUGGESTION_DISTANCE)
        .min()
        .map(|(_, candidate)| candidate.to_string())
}

/// Warn about keys `MonitorConfig` does not know.
///
/// Serde silently ignores such keys, so without this a typo just falls back
/// to the default. Unparseable input yields no warnings; the serde pass
/// reports it.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let Ok(document) = raw_toml.parse::<toml::Value>() else {
        return Vec::new();
    };
    let known = known_config_keys();
    walk_toml_keys(&document, "")
        .into_iter()
        .filter(|path| !known.contains(path.as_str()))
        .map(|path| ValidationWarning {
            suggestion: suggest_correction(&path, &known),
            message: format!("Unknown config key '{path}'"),
            field: path,
        })
        .collect()
}

/// Value checks that serde cannot express. Returns `(errors, warnings)`.
pub fn validate_ranges(config: &super::MonitorConfig) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let p = &config.preprocessing;
    if p.min_image_dim > 4096 {
        errors.push(format!(
            "preprocessing.min_image_dim = {} rejects every realistic camera frame",
            p.min_image_dim
        ));
    }
    if p.max_image_bytes > 50 * 1024 * 1024 {
        warnings.push(ValidationWarning::odd_value(
            "preprocessing.max_image_bytes",
            format!(
                "max_image_bytes = {} is above 50 MiB; VLM servers usually reject such payloads",
                p.max_image_bytes
            ),
        ));
    }

    let i = &config.inference;
    if i.timeout_secs > 600 {
        warnings.push(ValidationWarning::odd_value(
            "inference.timeout_secs",
            format!(
                "timeout_secs = {} stalls the pipeline for over 10 minutes per attempt",
                i.timeout_secs
            ),
        ));
    }
    if i.max_attempts > 10 {
        warnings.push(ValidationWarning::odd_value(
            "inference.max_attempts",
            format!("max_attempts = {} is unusually high", i.max_attempts),
        ));
    }
    if i.audio.cry_pitch_max_hz > f64::from(config.preprocessing.target_sample_rate) / 2.0 {
        errors.push(format!(
            "inference.audio.cry_pitch_max_hz = {:.0} is above the Nyquist limit of target_sample_rate",
            i.audio.cry_pitch_max_hz
        ));
    }

    let g = &config.aggregation;
    if g.smoothing_window > 60 {
        warnings.push(ValidationWarning::odd_value(
            "aggregation.smoothing_window",
            format!(
                "smoothing_window = {} makes the stable state very slow to react",
                g.smoothing_window
            ),
        ));
    }

    let a = &config.alerting;
    if a.default_cooldown_seconds > 3600 {
        warnings.push(ValidationWarning::odd_value(
            "alerting.default_cooldown_seconds",
            format!(
                "default_cooldown_seconds = {} suppresses repeats for over an hour",
                a.default_cooldown_seconds
            ),
        ));
    }
    if !a.critical_bypass_cooldown {
        warnings.push(ValidationWarning::odd_value(
            "alerting.critical_bypass_cooldown",
            "critical_bypass_cooldown = false can suppress repeated face-down alerts",
        ));
    }

    (errors, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("cord", "cord"), 0);
        assert_eq!(edit_distance("smoothing_windw", "smoothing_window"), 1);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("abc", ""), 3);
        assert_eq!(edit_distance("kitten", "sitting"), 3);
    }

    #[test]
    fn test_nested_tables_are_walked() {
        let doc: toml::Value = "[inference.audio]\ncry_loudness_dbfs = -30.0\n".parse().unwrap();
        let mut keys = walk_toml_keys(&doc, "");
        keys.sort();
        assert_eq!(
            keys,
            vec![
                "inference".to_string(),
                "inference.audio".to_string(),
                "inference.audio.cry_loudness_dbfs".to_string(),
            ]
        );
    }

    #[test]
    fn test_misspelled_key_gets_suggestion() {
        let warnings = validate_unknown_keys("[aggregation]\nsmoothing_windw = 7\n");
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, "aggregation.smoothing_windw");
        assert_eq!(
            warnings[0].suggestion.as_deref(),
            Some("aggregation.smoothing_window")
        );
        assert!(warnings[0].to_string().contains("did you mean"));
    }

    #[test]
    fn test_unparseable_toml_is_left_to_serde() {
        assert!(validate_unknown_keys("[[[").is_empty());
    }

    #[test]
    fn test_pitch_above_nyquist_is_error() {
        let mut config = MonitorConfig::default();
        config.preprocessing.target_sample_rate = 8_000;
        config.inference.audio.cry_pitch_max_hz = 5_000.0;
        let (errors, _) = validate_ranges(&config);
        assert!(errors.iter().any(|e| e.contains("Nyquist")));
    }

    #[test]
    fn test_ranges_defaults_clean() {
        let (errors, warnings) = validate_ranges(&MonitorConfig::default());
        assert!(errors.is_empty(), "{:?}", errors);
        assert!(warnings.is_empty(), "{:?}", warnings);
    }
}

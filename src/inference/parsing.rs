//! Lenient parser for vision-model answers
//!
//! Models wrap their JSON in reasoning blocks, markdown fences and prose,
//! escape underscores, and leave trailing commas. The parser cleans all of
//! that up and, failing JSON entirely, falls back to a bare class label.

use crate::types::{clamp_severity, normalize_hazards, BabyState, VisualFeatures};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("no JSON object or class label in model output: {snippet:?}")]
    Unrecognized { snippet: String },

    #[error("invalid JSON object: {0}")]
    InvalidJson(String),
}

/// What the model answered with
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput {
    /// A JSON object following the structured prompt
    Structured(VisualFeatures),
    /// Only a class label was recoverable
    Label(BabyState),
}

impl ModelOutput {
    /// Visual features plus whether they were reconstructed from a bare label.
    pub fn into_features(self) -> (VisualFeatures, bool) {
        match self {
            ModelOutput::Structured(f) => (f.normalized(), false),
            ModelOutput::Label(state) => (derive_fields(state), true),
        }
    }
}

fn trailing_comma_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r",(\s*[}\]])").expect("static regex"))
}

/// Strip `<think>` reasoning, keeping the final answer.
fn strip_think_tags(text: &str) -> &str {
    // ASCII lowering keeps byte offsets valid for slicing `text`
    let lower = text.to_ascii_lowercase();
    if let Some(end) = lower.rfind("</think>") {
        return text[end + "</think>".len()..].trim();
    }
    if let Some(start) = lower.find("<think>") {
        let before = text[..start].trim();
        if !before.is_empty() {
            return before;
        }
        return text[start + "<think>".len()..].trim();
    }
    text.trim()
}

/// Normalise raw model text: reasoning, fences, escaped underscores, trailing commas.
pub fn clean_model_text(text: &str) -> String {
    let text = strip_think_tags(text);
    let without_fences: Vec<&str> = text
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect();
    let joined = without_fences.join("\n").replace(r"\_", "_");
    trailing_comma_re().replace_all(&joined, "$1").trim().to_string()
}

/// Find and parse the JSON object in cleaned text.
pub fn extract_json_object(cleaned: &str) -> Result<Map<String, Value>, ParseError> {
    if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(cleaned) {
        return Ok(obj);
    }
    let (start, end) = match (cleaned.find('{'), cleaned.rfind('}')) {
        (Some(s), Some(e)) if s < e => (s, e),
        _ => {
            return Err(ParseError::Unrecognized {
                snippet: snippet(cleaned),
            })
        }
    };
    match serde_json::from_str::<Value>(&cleaned[start..=end]) {
        Ok(Value::Object(obj)) => Ok(obj),
        Ok(other) => Err(ParseError::InvalidJson(format!("expected object, got {other}"))),
        Err(e) => Err(ParseError::InvalidJson(e.to_string())),
    }
}

fn snippet(text: &str) -> String {
    text.chars().take(120).collect()
}

/// Bool from `true`, `"yes"`, `"no"`, `1`, ...
pub fn lenient_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "y" | "1" => Some(true),
            "false" | "no" | "n" | "0" | "none" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Number from `7`, `7.0`, `"7"`, `"7/10"`
pub fn lenient_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let digits: String = s
                .trim()
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            digits.parse().ok()
        }
        _ => None,
    }
}

/// Hazard list from an array or a comma-separated string
pub fn lenient_hazards(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Value::String(s) if !s.trim().eq_ignore_ascii_case("none") => {
            s.split(',').map(|h| h.to_string()).collect()
        }
        _ => Vec::new(),
    }
}

/// Flags implied by a class label alone.
pub fn derive_fields(state: BabyState) -> VisualFeatures {
    VisualFeatures {
        baby_present: state != BabyState::NotPresent,
        sleeping: state == BabyState::Asleep,
        crying: state == BabyState::AwakeCrying,
        description: format!("Baby state: {state}."),
        ..VisualFeatures::default()
    }
}

/// Build visual features from a parsed object.
///
/// A `label`/`state` key seeds the flags; explicit keys override it.
pub fn features_from_object(obj: &Map<String, Value>) -> VisualFeatures {
    let seeded = ["label", "state", "class"]
        .iter()
        .filter_map(|k| obj.get(*k).and_then(Value::as_str))
        .find_map(BabyState::from_label);
    let mut f = match seeded {
        Some(state) => derive_fields(state),
        None => VisualFeatures::default(),
    };

    let flag = |key: &str| obj.get(key).and_then(lenient_bool);
    if let Some(v) = flag("baby_present") {
        f.baby_present = v;
    }
    if let Some(v) = flag("face_down") {
        f.face_down = v;
    }
    if let Some(v) = flag("crying") {
        f.crying = v;
    }
    if let Some(v) = flag("sleeping") {
        f.sleeping = v;
    }
    if let Some(sev) = obj.get("severity").and_then(lenient_number) {
        f.severity = clamp_severity(sev);
    }
    if let Some(h) = obj.get("hazards") {
        f.hazards = normalize_hazards(&lenient_hazards(h));
    }
    f.notify = flag("notify").unwrap_or(f.severity >= 7);
    if let Some(desc) = ["description", "summary", "scene"]
        .iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))
    {
        f.description = desc.trim().to_string();
    }
    f
}

/// Earliest class label mentioned anywhere in the text.
pub fn find_label(text: &str) -> Option<BabyState> {
    let lower = text.to_lowercase();
    let candidates = [
        ("awake/crying", BabyState::AwakeCrying),
        ("awake/peaceful", BabyState::AwakePeaceful),
        ("not-present", BabyState::NotPresent),
        ("not present", BabyState::NotPresent),
        ("asleep", BabyState::Asleep),
    ];
    candidates
        .iter()
        .filter_map(|(needle, state)| lower.find(needle).map(|pos| (pos, *state)))
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, state)| state)
}

/// Parse a raw model answer.
pub fn parse_model_output(text: &str) -> Result<ModelOutput, ParseError> {
    let cleaned = clean_model_text(text);
    match extract_json_object(&cleaned) {
        Ok(obj) => Ok(ModelOutput::Structured(features_from_object(&obj))),
        Err(json_err) => match find_label(&cleaned) {
            Some(state) => Ok(ModelOutput::Label(state)),
            None => Err(json_err),
        },
    }
}

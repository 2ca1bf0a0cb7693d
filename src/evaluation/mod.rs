//! Offline evaluation of model predictions against labelled ground truth
//!
//! Ground truth is a JSON array of dataset records (`image`, `baby_present`,
//! `face_down`, `crying`, `sleeping`, `notify`, `severity`, `hazards`).
//! Predictions are a JSON array of `{ "filename", "prediction" }` where the
//! prediction is either an object or the model's raw text. Records are joined
//! on the image file name.

mod metrics;

pub use metrics::{BinaryMetrics, EvaluationReport, HazardMetrics, SeverityMetrics};

use crate::inference::parsing::{
    clean_model_text, derive_fields, extract_json_object, find_label, lenient_bool, lenient_hazards,
    lenient_number,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Boolean fields compared with confusion-matrix metrics
pub const BOOL_CATEGORIES: [&str; 5] = ["baby_present", "face_down", "crying", "sleeping", "notify"];

#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("no matching entries between ground truth and predictions")]
    NoOverlap,
}

/// One entry of a predictions file
#[derive(Debug, Clone, Deserialize)]
pub struct PredictionRecord {
    pub filename: String,
    pub prediction: Value,
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map_or_else(|| path.to_string(), |n| n.to_string_lossy().into_owned())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, EvaluationError> {
    let text = std::fs::read_to_string(path).map_err(|source| EvaluationError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| EvaluationError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Turn a prediction into a JSON object.
///
/// Text goes through the lenient model-output cleanup; a bare class label is
/// expanded into the fields it implies.
pub fn parse_prediction(prediction: &Value) -> Option<Map<String, Value>> {
    match prediction {
        Value::Object(obj) => Some(obj.clone()),
        Value::String(text) => {
            let cleaned = clean_model_text(text);
            if let Ok(obj) = extract_json_object(&cleaned) {
                return Some(obj);
            }
            match serde_json::to_value(derive_fields(find_label(&cleaned)?)) {
                Ok(Value::Object(obj)) => Some(obj),
                _ => None,
            }
        }
        _ => None,
    }
}

fn hazard_set(value: &Value) -> BTreeSet<String> {
    lenient_hazards(value)
        .into_iter()
        .map(|h| h.trim().to_lowercase())
        .filter(|h| !h.is_empty())
        .collect()
}

/// Compare predictions against ground-truth records.
pub fn evaluate(
    ground_truth: &[Value],
    predictions: &[PredictionRecord],
) -> Result<EvaluationReport, EvaluationError> {
    let truth_map: BTreeMap<String, &Map<String, Value>> = ground_truth
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|obj| {
            let image = obj.get("image").and_then(Value::as_str)?;
            Some((file_name(image), obj))
        })
        .collect();

    let mut unparsed = 0;
    let mut pred_map: BTreeMap<String, Map<String, Value>> = BTreeMap::new();
    for record in predictions {
        match parse_prediction(&record.prediction) {
            Some(obj) => {
                pred_map.insert(file_name(&record.filename), obj);
            }
            None => {
                warn!(filename = %record.filename, "Unparseable prediction");
                unparsed += 1;
            }
        }
    }

    let common: Vec<&String> = truth_map.keys().filter(|k| pred_map.contains_key(*k)).collect();
    if common.is_empty() {
        return Err(EvaluationError::NoOverlap);
    }

    let mut categories: Vec<BinaryMetrics> =
        BOOL_CATEGORIES.iter().map(|c| BinaryMetrics::new(c)).collect();
    let mut severity = SeverityMetrics::default();
    let mut hazards = HazardMetrics::default();

    for key in &common {
        let (Some(truth), Some(pred)) = (truth_map.get(*key), pred_map.get(*key)) else {
            continue;
        };

        for metric in &mut categories {
            let flag = |obj: &Map<String, Value>| {
                obj.get(&metric.category)
                    .and_then(lenient_bool)
                    .unwrap_or(false)
            };
            let (t, p) = (flag(truth), flag(pred));
            metric.record(key, t, p);
        }

        let sev = |obj: &Map<String, Value>| obj.get("severity").and_then(lenient_number);
        if let (Some(t), Some(p)) = (sev(truth), sev(pred)) {
            severity.record(key, t, p);
        }

        if let (Some(t), Some(p)) = (truth.get("hazards"), pred.get("hazards")) {
            hazards.record(key, &hazard_set(t), &hazard_set(p));
        }
    }

    categories.iter_mut().for_each(BinaryMetrics::finish);
    severity.finish();

    Ok(EvaluationReport {
        ground_truth_count: truth_map.len(),
        prediction_count: predictions.len(),
        unparsed_predictions: unparsed,
        matched: common.len(),
        categories,
        severity,
        hazards,
    })
}

/// Load both files and evaluate.
pub fn evaluate_files(
    predictions_path: &Path,
    ground_truth_path: &Path,
) -> Result<EvaluationReport, EvaluationError> {
    info!(path = %ground_truth_path.display(), "Loading ground truth");
    let truth: Vec<Value> = read_json(ground_truth_path)?;
    info!(path = %predictions_path.display(), "Loading predictions");
    let predictions: Vec<PredictionRecord> = read_json(predictions_path)?;
    evaluate(&truth, &predictions)
}

//! Evaluation Tests
//!
//! Scores prediction files on disk against a ground-truth manifest.

use cradlewatch::evaluation::{evaluate_files, EvaluationError};
use serde_json::json;
use std::path::Path;

fn write_json(dir: &Path, name: &str, value: &serde_json::Value) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, serde_json::to_vec_pretty(value).unwrap()).unwrap();
    path
}

fn ground_truth() -> serde_json::Value {
    json!([
        {"id": "a", "image": "images/a.png", "label": "asleep", "baby_present": true,
         "sleeping": true, "crying": false, "face_down": false, "notify": false,
         "severity": 1, "hazards": []},
        {"id": "b", "image": "images/b.png", "label": "awake/crying", "baby_present": true,
         "sleeping": false, "crying": true, "face_down": false, "notify": true,
         "severity": 6, "hazards": ["blanket"]},
        {"id": "c", "image": "images/c.png", "label": "asleep", "baby_present": true,
         "sleeping": true, "crying": false, "face_down": true, "notify": true,
         "severity": 9, "hazards": ["pillow", "cord"]},
        {"id": "d", "image": "images/d.png", "label": "not-present", "baby_present": false,
         "severity": 0, "hazards": []}
    ])
}

#[test]
fn scores_mixed_prediction_formats() {
    let dir = tempfile::tempdir().unwrap();
    let truth = write_json(dir.path(), "dataset.json", &ground_truth());
    let predictions = write_json(
        dir.path(),
        "predictions.json",
        &json!([
            {"filename": "a.png", "prediction": {"baby_present": true, "sleeping": true, "severity": 1, "hazards": []}},
            {"filename": "b.png", "prediction": "<think>loud</think>\n```json\n{\"baby_present\": true, \"crying\": true, \"notify\": true, \"severity\": 4, \"hazards\": \"Blanket\"}\n```"},
            {"filename": "c.png", "prediction": {"baby_present": true, "sleeping": true, "face_down": false, "notify": false, "severity": 5, "hazards": ["toy"]}},
            {"filename": "d.png", "prediction": "awake/peaceful"}
        ]),
    );

    let report = evaluate_files(&predictions, &truth).unwrap();
    assert_eq!(report.matched, 4);
    assert_eq!(report.unparsed_predictions, 0);

    let category = |name: &str| report.categories.iter().find(|m| m.category == name).unwrap();

    // d: truth absent, bare label implies present
    let present = category("baby_present");
    assert_eq!((present.tp, present.tn, present.fp, present.fn_), (3, 0, 1, 0));

    // c: face down missed
    let face_down = category("face_down");
    assert_eq!((face_down.tp, face_down.fn_, face_down.tn), (0, 1, 3));
    assert_eq!(face_down.recall, 0.0);
    assert_eq!(face_down.errors.len(), 1);

    let crying = category("crying");
    assert_eq!(crying.tp, 1);
    assert!((crying.f1 - 1.0).abs() < 1e-9);

    // (1,1) (6,4) (9,5) and (0,0) from the label's derived fields
    assert_eq!(report.severity.count, 4);
    assert!((report.severity.mae - 1.5).abs() < 1e-9);
    assert!((report.severity.bias + 1.5).abs() < 1e-9);
    assert_eq!(report.severity.mismatches.len(), 2);

    // b matches after lower-casing, c shares nothing
    assert_eq!(report.hazards.exact, 3);
    assert_eq!(report.hazards.no_match, 1);

    let text = report.to_string();
    assert!(text.contains("--- FACE DOWN ---"));
    assert!(text.contains("--- HAZARDS ---"));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let truth = write_json(dir.path(), "dataset.json", &ground_truth());
    let err = evaluate_files(&dir.path().join("nope.json"), &truth).unwrap_err();
    assert!(matches!(err, EvaluationError::Io { .. }));
}

#[test]
fn malformed_json_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let truth = write_json(dir.path(), "dataset.json", &ground_truth());
    let predictions = dir.path().join("predictions.json");
    std::fs::write(&predictions, "[{\"filename\": ").unwrap();
    let err = evaluate_files(&predictions, &truth).unwrap_err();
    assert!(matches!(err, EvaluationError::Json { .. }));
}

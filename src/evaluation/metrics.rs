//! Evaluation metrics and the comparison report

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Mismatches listed per section in the text report
const TOP_ERRORS: usize = 5;

/// Confusion-matrix metrics for one boolean field
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct BinaryMetrics {
    pub category: String,
    pub tp: usize,
    pub tn: usize,
    pub fp: usize,
    #[serde(rename = "fn")]
    pub fn_: usize,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub errors: Vec<String>,
}

impl BinaryMetrics {
    pub fn new(category: &str) -> Self {
        Self {
            category: category.to_string(),
            ..Self::default()
        }
    }

    pub fn record(&mut self, key: &str, truth: bool, pred: bool) {
        match (truth, pred) {
            (true, true) => self.tp += 1,
            (false, false) => self.tn += 1,
            (false, true) => self.fp += 1,
            (true, false) => self.fn_ += 1,
        }
        if truth != pred {
            self.errors.push(format!("{key}: expected {truth}, got {pred}"));
        }
    }

    pub fn total(&self) -> usize {
        self.tp + self.tn + self.fp + self.fn_
    }

    /// Derive the ratios; undefined ratios are 0.
    pub fn finish(&mut self) {
        let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
        self.accuracy = ratio(self.tp + self.tn, self.total());
        self.precision = ratio(self.tp, self.tp + self.fp);
        self.recall = ratio(self.tp, self.tp + self.fn_);
        self.f1 = if self.precision + self.recall > 0.0 {
            2.0 * self.precision * self.recall / (self.precision + self.recall)
        } else {
            0.0
        };
    }
}

/// Severity regression metrics
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct SeverityMetrics {
    pub count: usize,
    pub mae: f64,
    pub mse: f64,
    /// Mean of (prediction - truth); positive means over-predicting
    pub bias: f64,
    pub mismatches: Vec<String>,
    #[serde(skip)]
    pairs: Vec<(f64, f64)>,
}

impl SeverityMetrics {
    pub fn record(&mut self, key: &str, truth: f64, pred: f64) {
        self.pairs.push((truth, pred));
        if (truth - pred).abs() > f64::EPSILON {
            self.mismatches.push(format!("{key}: expected {truth}, got {pred}"));
        }
    }

    pub fn finish(&mut self) {
        self.count = self.pairs.len();
        if self.count == 0 {
            return;
        }
        let n = self.count as f64;
        self.mae = self.pairs.iter().map(|(t, p)| (t - p).abs()).sum::<f64>() / n;
        self.mse = self.pairs.iter().map(|(t, p)| (t - p).powi(2)).sum::<f64>() / n;
        self.bias = self.pairs.iter().map(|(t, p)| p - t).sum::<f64>() / n;
    }
}

/// Set-based hazard agreement
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct HazardMetrics {
    pub total: usize,
    pub exact: usize,
    pub partial: usize,
    pub no_match: usize,
    pub mismatches: Vec<String>,
}

impl HazardMetrics {
    pub fn record(&mut self, key: &str, truth: &BTreeSet<String>, pred: &BTreeSet<String>) {
        self.total += 1;
        if truth == pred {
            self.exact += 1;
        } else if !truth.is_disjoint(pred) {
            self.partial += 1;
            self.mismatches
                .push(format!("{key}: partial, expected {truth:?}, got {pred:?}"));
        } else {
            self.no_match += 1;
            self.mismatches
                .push(format!("{key}: mismatch, expected {truth:?}, got {pred:?}"));
        }
    }
}

/// Full comparison of predictions against ground truth
#[derive(Debug, Clone, Default, Serialize)]
pub struct EvaluationReport {
    pub ground_truth_count: usize,
    pub prediction_count: usize,
    /// Predictions whose text could not be parsed
    pub unparsed_predictions: usize,
    /// Entries present in both files
    pub matched: usize,
    pub categories: Vec<BinaryMetrics>,
    pub severity: SeverityMetrics,
    pub hazards: HazardMetrics,
}

fn pct(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        100.0 * num as f64 / den as f64
    }
}

fn write_top(f: &mut fmt::Formatter<'_>, label: &str, errors: &[String]) -> fmt::Result {
    if errors.is_empty() {
        return Ok(());
    }
    let shown: Vec<&str> = errors.iter().take(TOP_ERRORS).map(String::as_str).collect();
    writeln!(f, "  {label}: {}", shown.join("; "))?;
    if errors.len() > TOP_ERRORS {
        writeln!(f, "  ... and {} more.", errors.len() - TOP_ERRORS)?;
    }
    Ok(())
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(60);
        writeln!(
            f,
            "Found {} matching entries (ground truth: {}, predictions: {}, unparsed: {}).",
            self.matched, self.ground_truth_count, self.prediction_count, self.unparsed_predictions
        )?;
        writeln!(f, "{rule}")?;
        writeln!(f, "DETAILED COMPARISON REPORT")?;
        writeln!(f, "{rule}")?;

        for m in &self.categories {
            writeln!(f)?;
            writeln!(f, "--- {} ---", m.category.replace('_', " ").to_uppercase())?;
            writeln!(
                f,
                "  Accuracy:  {:.2}% ({}/{})",
                100.0 * m.accuracy,
                m.tp + m.tn,
                m.total()
            )?;
            writeln!(f, "  Precision: {:.2}%", 100.0 * m.precision)?;
            writeln!(f, "  Recall:    {:.2}%", 100.0 * m.recall)?;
            writeln!(f, "  F1 Score:  {:.2}", m.f1)?;
            writeln!(
                f,
                "  Confusion Matrix: [TP={}, TN={}, FP={}, FN={}]",
                m.tp, m.tn, m.fp, m.fn_
            )?;
            write_top(f, "Top errors", &m.errors)?;
        }

        writeln!(f)?;
        writeln!(f, "--- SEVERITY ---")?;
        if self.severity.count == 0 {
            writeln!(f, "  No valid severity data found.")?;
        } else {
            writeln!(f, "  Mean Absolute Error (MAE): {:.4}", self.severity.mae)?;
            writeln!(f, "  Mean Squared Error (MSE):  {:.4}", self.severity.mse)?;
            writeln!(
                f,
                "  Prediction Bias (Mean Diff): {:.4} (positive means over-predicting)",
                self.severity.bias
            )?;
            if !self.severity.mismatches.is_empty() {
                writeln!(f, "  Total Mismatches: {}", self.severity.mismatches.len())?;
            }
            write_top(f, "Top errors", &self.severity.mismatches)?;
        }

        writeln!(f)?;
        writeln!(f, "--- HAZARDS ---")?;
        let h = &self.hazards;
        if h.total == 0 {
            writeln!(f, "  No hazard data found.")?;
        } else {
            writeln!(f, "  Exact Matches:   {} ({:.2}%)", h.exact, pct(h.exact, h.total))?;
            writeln!(f, "  Partial Matches: {} ({:.2}%)", h.partial, pct(h.partial, h.total))?;
            writeln!(f, "  No Matches:      {} ({:.2}%)", h.no_match, pct(h.no_match, h.total))?;
            write_top(f, "Top mismatches", &h.mismatches)?;
        }

        writeln!(f)?;
        writeln!(f, "{rule}")?;
        write!(f, "END OF REPORT")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_metrics_arithmetic() {
        let mut m = BinaryMetrics::new("crying");
        // TP, TP, FP, FN, TN
        for (t, p) in [(true, true), (true, true), (false, true), (true, false), (false, false)] {
            m.record("k", t, p);
        }
        m.finish();
        assert_eq!((m.tp, m.tn, m.fp, m.fn_), (2, 1, 1, 1));
        assert!((m.accuracy - 0.6).abs() < 1e-9);
        assert!((m.precision - 2.0 / 3.0).abs() < 1e-9);
        assert!((m.recall - 2.0 / 3.0).abs() < 1e-9);
        assert!((m.f1 - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(m.errors.len(), 2);
    }

    #[test]
    fn test_undefined_ratios_are_zero() {
        let mut m = BinaryMetrics::new("face_down");
        m.record("k", false, false);
        m.finish();
        assert_eq!(m.accuracy, 1.0);
        assert_eq!(m.precision, 0.0);
        assert_eq!(m.recall, 0.0);
        assert_eq!(m.f1, 0.0);
    }

    #[test]
    fn test_severity_metrics() {
        let mut s = SeverityMetrics::default();
        s.record("a", 2.0, 4.0);
        s.record("b", 6.0, 5.0);
        s.record("c", 3.0, 3.0);
        s.finish();
        assert_eq!(s.count, 3);
        assert!((s.mae - 1.0).abs() < 1e-9);
        assert!((s.mse - 5.0 / 3.0).abs() < 1e-9);
        assert!((s.bias - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(s.mismatches.len(), 2);
    }

    #[test]
    fn test_hazard_agreement() {
        let set = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>();
        let mut h = HazardMetrics::default();
        h.record("a", &set(&[]), &set(&[]));
        h.record("b", &set(&["cord", "pillow"]), &set(&["cord"]));
        h.record("c", &set(&["cord"]), &set(&["toy"]));
        h.record("d", &set(&[]), &set(&["toy"]));
        assert_eq!((h.exact, h.partial, h.no_match), (1, 1, 2));
        assert_eq!(h.mismatches.len(), 3);
    }

    #[test]
    fn test_report_renders() {
        let mut m = BinaryMetrics::new("baby_present");
        m.record("k", true, true);
        m.finish();
        let report = EvaluationReport {
            matched: 1,
            categories: vec![m],
            ..EvaluationReport::default()
        };
        let text = report.to_string();
        assert!(text.contains("--- BABY PRESENT ---"));
        assert!(text.contains("Accuracy:  100.00% (1/1)"));
        assert!(text.contains("No valid severity data found."));
        assert!(text.ends_with("END OF REPORT"));
    }
}

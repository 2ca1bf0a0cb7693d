//! Built-in alert rules
//!
//! Evaluated in this order:
//!
//! 1. **face_down** - Critical when the baby lies face down
//! 2. **hazard** - Warning on any hazard, Critical for listed hazards
//! 3. **severity** - Critical at or above the severity threshold
//! 4. **sustained_crying** - Warning after N consecutive crying windows
//! 5. **left_crib** - Warning when the smoothed state turns `not-present`
//! 6. **model_notify** - Info when the model asked to notify and nothing else fired
//! 7. **inference_degraded** - Warning after N failed visual windows in a row

use crate::config::AlertingConfig;
use crate::types::{AlertCandidate, AlertSeverity, BabyState, SceneSummary};
use std::collections::VecDeque;

/// Cross-window context visible to rules
#[derive(Debug)]
pub struct RuleContext<'a> {
    /// Per-window states, oldest first, current window last
    pub recent_states: &'a VecDeque<BabyState>,
    /// Smoothed state before this window
    pub previous_stable: Option<BabyState>,
    /// Consecutive windows (including this one) whose visual analysis failed
    pub consecutive_visual_failures: usize,
    /// Alerts already emitted this window (cooled-down matches excluded)
    pub matched: usize,
}

/// Trait for alert rules
pub trait AlertRule: Send + Sync {
    /// Rule name, used for cooldown tracking and `disabled_rules`
    fn name(&self) -> &str;

    fn evaluate(&self, scene: &SceneSummary, ctx: &RuleContext<'_>) -> Option<AlertCandidate>;
}

pub struct FaceDownRule;

impl AlertRule for FaceDownRule {
    fn name(&self) -> &str {
        "face_down"
    }

    fn evaluate(&self, scene: &SceneSummary, _ctx: &RuleContext<'_>) -> Option<AlertCandidate> {
        scene.face_down.then(|| AlertCandidate {
            severity: AlertSeverity::Critical,
            title: "Baby is face down".to_string(),
            message: format!("Face-down position detected. {}", scene.summary),
        })
    }
}

pub struct HazardRule {
    critical_hazards: Vec<String>,
}

impl HazardRule {
    pub fn new(critical_hazards: &[String]) -> Self {
        Self {
            critical_hazards: critical_hazards
                .iter()
                .map(|h| h.trim().to_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
        }
    }

    fn is_critical(&self, hazard: &str) -> bool {
        self.critical_hazards.iter().any(|c| hazard.contains(c.as_str()))
    }
}

impl AlertRule for HazardRule {
    fn name(&self) -> &str {
        "hazard"
    }

    fn evaluate(&self, scene: &SceneSummary, _ctx: &RuleContext<'_>) -> Option<AlertCandidate> {
        if scene.hazards.is_empty() {
            return None;
        }
        let critical: Vec<&str> = scene
            .hazards
            .iter()
            .map(String::as_str)
            .filter(|h| self.is_critical(h))
            .collect();
        let severity = if critical.is_empty() {
            AlertSeverity::Warning
        } else {
            AlertSeverity::Critical
        };
        Some(AlertCandidate {
            severity,
            title: "Hazard near the baby".to_string(),
            message: format!("Hazards detected: {}.", scene.hazards.join(", ")),
        })
    }
}

pub struct SeverityRule {
    threshold: u8,
}

impl SeverityRule {
    pub fn new(threshold: u8) -> Self {
        Self { threshold }
    }
}

impl AlertRule for SeverityRule {
    fn name(&self) -> &str {
        "severity"
    }

    fn evaluate(&self, scene: &SceneSummary, _ctx: &RuleContext<'_>) -> Option<AlertCandidate> {
        (scene.severity >= self.threshold).then(|| AlertCandidate {
            severity: AlertSeverity::Critical,
            title: format!("Severity {}/10", scene.severity),
            message: scene.summary.clone(),
        })
    }
}

pub struct SustainedCryingRule {
    windows: usize,
}

impl SustainedCryingRule {
    pub fn new(windows: usize) -> Self {
        Self {
            windows: windows.max(1),
        }
    }
}

impl AlertRule for SustainedCryingRule {
    fn name(&self) -> &str {
        "sustained_crying"
    }

    fn evaluate(&self, _scene: &SceneSummary, ctx: &RuleContext<'_>) -> Option<AlertCandidate> {
        let states = ctx.recent_states;
        if states.len() < self.windows {
            return None;
        }
        let sustained = states
            .iter()
            .rev()
            .take(self.windows)
            .all(|s| *s == BabyState::AwakeCrying);
        sustained.then(|| AlertCandidate {
            severity: AlertSeverity::Warning,
            title: "Baby has been crying".to_string(),
            message: format!("Crying detected in the last {} windows.", self.windows),
        })
    }
}

pub struct LeftCribRule;

impl AlertRule for LeftCribRule {
    fn name(&self) -> &str {
        "left_crib"
    }

    fn evaluate(&self, scene: &SceneSummary, ctx: &RuleContext<'_>) -> Option<AlertCandidate> {
        let was_present = ctx.previous_stable.is_some_and(BabyState::is_present);
        (was_present && scene.stable_state == BabyState::NotPresent).then(|| AlertCandidate {
            severity: AlertSeverity::Warning,
            title: "Baby no longer in view".to_string(),
            message: format!(
                "Crib changed from {} to not-present.",
                ctx.previous_stable.unwrap_or(BabyState::Unknown)
            ),
        })
    }
}

pub struct InferenceDegradedRule {
    windows: usize,
}

impl InferenceDegradedRule {
    pub fn new(windows: usize) -> Self {
        Self {
            windows: windows.max(1),
        }
    }
}

impl AlertRule for InferenceDegradedRule {
    fn name(&self) -> &str {
        "inference_degraded"
    }

    fn evaluate(&self, _scene: &SceneSummary, ctx: &RuleContext<'_>) -> Option<AlertCandidate> {
        (ctx.consecutive_visual_failures >= self.windows).then(|| AlertCandidate {
            severity: AlertSeverity::Warning,
            title: "Visual inference unavailable".to_string(),
            message: format!(
                "Visual analysis failed for {} consecutive windows; monitoring relies on audio.",
                ctx.consecutive_visual_failures
            ),
        })
    }
}

pub struct ModelNotifyRule;

impl AlertRule for ModelNotifyRule {
    fn name(&self) -> &str {
        "model_notify"
    }

    fn evaluate(&self, scene: &SceneSummary, ctx: &RuleContext<'_>) -> Option<AlertCandidate> {
        (scene.notify && ctx.matched == 0).then(|| AlertCandidate {
            severity: AlertSeverity::Info,
            title: "Model flagged this scene".to_string(),
            message: scene.summary.clone(),
        })
    }
}

/// Build the enabled built-in rules, in evaluation order.
pub fn default_rules(cfg: &AlertingConfig) -> Vec<Box<dyn AlertRule>> {
    let all: Vec<Box<dyn AlertRule>> = vec![
        Box::new(FaceDownRule),
        Box::new(HazardRule::new(&cfg.critical_hazards)),
        Box::new(SeverityRule::new(cfg.severity_threshold)),
        Box::new(SustainedCryingRule::new(cfg.crying_windows)),
        Box::new(LeftCribRule),
        Box::new(ModelNotifyRule),
        Box::new(InferenceDegradedRule::new(cfg.degraded_windows)),
    ];
    all.into_iter().filter(|r| cfg.is_enabled(r.name())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn scene() -> SceneSummary {
        SceneSummary {
            window_id: "w".into(),
            timestamp: Utc::now(),
            state: BabyState::Asleep,
            stable_state: BabyState::Asleep,
            severity: 0,
            hazards: vec![],
            face_down: false,
            crying: false,
            notify: false,
            summary: "Baby is asleep.".into(),
            confidence: 0.9,
            modalities: vec![],
            ground_truth: None,
            features: vec![],
        }
    }

    fn ctx(states: &VecDeque<BabyState>) -> RuleContext<'_> {
        RuleContext {
            recent_states: states,
            previous_stable: None,
            consecutive_visual_failures: 0,
            matched: 0,
        }
    }

    #[test]
    fn test_hazard_substring_match_is_critical() {
        let rule = HazardRule::new(&["cord".to_string()]);
        let states = VecDeque::new();
        let mut s = scene();
        s.hazards = vec!["loose blanket".into()];
        assert_eq!(rule.evaluate(&s, &ctx(&states)).unwrap().severity, AlertSeverity::Warning);
        s.hazards.push("window blind cord".into());
        assert_eq!(rule.evaluate(&s, &ctx(&states)).unwrap().severity, AlertSeverity::Critical);
    }

    #[test]
    fn test_severity_threshold() {
        let rule = SeverityRule::new(7);
        let states = VecDeque::new();
        let mut s = scene();
        s.severity = 6;
        assert!(rule.evaluate(&s, &ctx(&states)).is_none());
        s.severity = 7;
        assert!(rule.evaluate(&s, &ctx(&states)).is_some());
    }

    #[test]
    fn test_sustained_crying_needs_full_run() {
        let rule = SustainedCryingRule::new(3);
        let mut states: VecDeque<BabyState> =
            [BabyState::AwakeCrying, BabyState::AwakeCrying].into_iter().collect();
        assert!(rule.evaluate(&scene(), &ctx(&states)).is_none());
        states.push_back(BabyState::AwakeCrying);
        assert!(rule.evaluate(&scene(), &ctx(&states)).is_some());
        states.push_back(BabyState::Asleep);
        assert!(rule.evaluate(&scene(), &ctx(&states)).is_none());
    }

    #[test]
    fn test_left_crib_requires_transition() {
        let states = VecDeque::new();
        let mut s = scene();
        s.stable_state = BabyState::NotPresent;
        let mut c = ctx(&states);
        assert!(LeftCribRule.evaluate(&s, &c).is_none());
        c.previous_stable = Some(BabyState::NotPresent);
        assert!(LeftCribRule.evaluate(&s, &c).is_none());
        c.previous_stable = Some(BabyState::Asleep);
        assert!(LeftCribRule.evaluate(&s, &c).is_some());
    }

    #[test]
    fn test_model_notify_only_when_nothing_else_matched() {
        let states = VecDeque::new();
        let mut s = scene();
        s.notify = true;
        let mut c = ctx(&states);
        assert_eq!(
            ModelNotifyRule.evaluate(&s, &c).unwrap().severity,
            AlertSeverity::Info
        );
        c.matched = 1;
        assert!(ModelNotifyRule.evaluate(&s, &c).is_none());
    }

    #[test]
    fn test_rules_run_in_documented_order() {
        let names: Vec<String> = default_rules(&AlertingConfig::default())
            .iter()
            .map(|r| r.name().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "face_down",
                "hazard",
                "severity",
                "sustained_crying",
                "left_crib",
                "model_notify",
                "inference_degraded",
            ]
        );
    }

    #[test]
    fn test_disabled_rules_are_dropped() {
        let cfg = AlertingConfig {
            disabled_rules: vec!["model_notify".into(), "hazard".into()],
            ..AlertingConfig::default()
        };
        let names: Vec<String> = default_rules(&cfg).iter().map(|r| r.name().to_string()).collect();
        assert_eq!(
            names,
            vec!["face_down", "severity", "sustained_crying", "left_crib", "inference_degraded"]
        );
    }
}

//! Alerting (Phase 5)
//!
//! The [`AlertEngine`] runs the configured [`AlertRule`]s over each
//! [`SceneSummary`] in order and turns matches into [`Alert`]s.
//!
//! Cooldowns are measured on window timestamps rather than wall-clock time,
//! so replaying a dataset yields the same alerts however fast it runs.
//! Critical alerts skip the cooldown when `critical_bypass_cooldown` is set.

mod notifier;
mod rules;

pub use notifier::{ChannelNotifier, LogNotifier, Notifier};
pub use rules::{
    default_rules, AlertRule, FaceDownRule, HazardRule, InferenceDegradedRule, LeftCribRule,
    ModelNotifyRule, RuleContext, SeverityRule, SustainedCryingRule,
};

use crate::config::AlertingConfig;
use crate::types::{Alert, AlertSeverity, BabyState, SceneSummary};
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

pub struct AlertEngine {
    rules: Vec<Box<dyn AlertRule>>,
    cooldown: Duration,
    critical_bypass: bool,
    last_fired: HashMap<String, DateTime<Utc>>,
    next_id: u64,
    recent_states: VecDeque<BabyState>,
    history_len: usize,
    previous_stable: Option<BabyState>,
    consecutive_visual_failures: usize,
}

impl AlertEngine {
    /// Engine with the enabled built-in rules
    pub fn new(cfg: &AlertingConfig) -> Self {
        Self::with_rules(cfg, default_rules(cfg))
    }

    pub fn with_rules(cfg: &AlertingConfig, rules: Vec<Box<dyn AlertRule>>) -> Self {
        let history_len = cfg.crying_windows.max(1);
        Self {
            rules,
            cooldown: i64::try_from(cfg.default_cooldown_seconds)
                .ok()
                .and_then(Duration::try_seconds)
                .unwrap_or(Duration::MAX),
            critical_bypass: cfg.critical_bypass_cooldown,
            last_fired: HashMap::new(),
            next_id: 1,
            recent_states: VecDeque::with_capacity(history_len),
            history_len,
            previous_stable: None,
            consecutive_visual_failures: 0,
        }
    }

    /// Continue numbering after alerts already persisted
    pub fn with_next_id(mut self, next_id: u64) -> Self {
        self.next_id = next_id.max(1);
        self
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Evaluate all rules against one window; at most one alert per rule.
    pub fn evaluate(&mut self, scene: &SceneSummary) -> Vec<Alert> {
        if self.recent_states.len() == self.history_len {
            self.recent_states.pop_front();
        }
        self.recent_states.push_back(scene.state);
        if scene.visual_failed() {
            self.consecutive_visual_failures += 1;
        } else {
            self.consecutive_visual_failures = 0;
        }

        let mut ctx = RuleContext {
            recent_states: &self.recent_states,
            previous_stable: self.previous_stable,
            consecutive_visual_failures: self.consecutive_visual_failures,
            matched: 0,
        };

        let mut alerts = Vec::new();
        for rule in &self.rules {
            let Some(candidate) = rule.evaluate(scene, &ctx) else {
                continue;
            };

            let name = rule.name();
            let bypass = self.critical_bypass && candidate.severity == AlertSeverity::Critical;
            let cooling = self
                .last_fired
                .get(name)
                .is_some_and(|last| scene.timestamp.signed_duration_since(*last) < self.cooldown);
            if cooling && !bypass {
                debug!(rule = name, window_id = %scene.window_id, "Alert suppressed by cooldown");
                continue;
            }

            ctx.matched += 1;
            self.last_fired.insert(name.to_string(), scene.timestamp);
            alerts.push(Alert {
                id: self.next_id,
                timestamp: scene.timestamp,
                window_id: scene.window_id.clone(),
                rule: name.to_string(),
                severity: candidate.severity,
                title: candidate.title,
                message: candidate.message,
                state: scene.stable_state,
                acknowledged: false,
                acknowledged_at: None,
            });
            self.next_id += 1;
        }

        self.previous_stable = Some(scene.stable_state);
        alerts
    }
}

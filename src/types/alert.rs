//! Alerting types (Phase 5)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::BabyState;

/// Alert severity. Ordered: Info < Warning < Critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    #[default]
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertSeverity::Info => write!(f, "INFO"),
            AlertSeverity::Warning => write!(f, "WARNING"),
            AlertSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// What a rule returns when its condition matches
#[derive(Debug, Clone, PartialEq)]
pub struct AlertCandidate {
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
}

/// A triggered notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// Monotonic id assigned by the alert engine
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub window_id: String,
    /// Name of the rule that fired
    pub rule: String,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    pub state: BabyState,
    #[serde(default)]
    pub acknowledged: bool,
    #[serde(default)]
    pub acknowledged_at: Option<DateTime<Utc>>,
}

//! Application State and System Status
//!
//! Shared state for the monitoring pipeline, read by API handlers and
//! written by the processing loop.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Instant;

use super::WindowOutcome;
use crate::types::{Alert, AlertSeverity, SceneSummary};

/// Recent alerts kept in memory for the status endpoint
pub const MAX_RECENT_ALERTS: usize = 100;

/// Recent scenes kept in memory, served when history storage is unavailable
pub const MAX_RECENT_SCENES: usize = 200;

// ============================================================================
// Application State
// ============================================================================

/// Shared application state.
///
/// Wrapped in `Arc<RwLock<>>` for access across the async runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppState {
    /// Monitor name from config
    pub monitor_name: String,

    /// System uptime (serializes as seconds)
    #[serde(skip, default = "Instant::now")]
    pub uptime: Instant,

    /// Current system status
    pub status: SystemStatus,

    /// Input source in use
    pub source_name: String,

    /// Vision backend in use
    pub backend_name: String,

    /// Windows pulled from the source
    pub windows_received: u64,

    /// Windows that made it through aggregation
    pub windows_processed: u64,

    /// Windows rejected by preprocessing
    pub windows_skipped: u64,

    /// Windows whose visual analysis failed
    pub visual_failures: u64,

    pub alerts_raised: u64,
    pub critical_alerts: u64,

    /// Failed history writes
    pub storage_errors: u64,

    /// Failed notifier deliveries
    pub notification_errors: u64,

    /// Timestamp of the most recent processed window
    pub last_window_time: Option<chrono::DateTime<chrono::Utc>>,

    pub latest_scene: Option<SceneSummary>,

    /// Most recent scenes, newest last (bounded)
    #[serde(skip)]
    pub recent_scenes: VecDeque<SceneSummary>,

    /// Most recent alerts, newest last (bounded)
    #[serde(skip)]
    pub recent_alerts: VecDeque<Alert>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            monitor_name: "nursery".to_string(),
            uptime: Instant::now(),
            status: SystemStatus::Initializing,
            source_name: String::new(),
            backend_name: String::new(),
            windows_received: 0,
            windows_processed: 0,
            windows_skipped: 0,
            visual_failures: 0,
            alerts_raised: 0,
            critical_alerts: 0,
            storage_errors: 0,
            notification_errors: 0,
            last_window_time: None,
            latest_scene: None,
            recent_scenes: VecDeque::with_capacity(MAX_RECENT_SCENES),
            recent_alerts: VecDeque::with_capacity(MAX_RECENT_ALERTS),
        }
    }
}

impl AppState {
    pub fn new(monitor_name: impl Into<String>) -> Self {
        Self {
            monitor_name: monitor_name.into(),
            ..Self::default()
        }
    }

    /// Fold one processed window into the state.
    ///
    /// Status becomes `Alert` on a Critical alert, `Degraded` when visual
    /// inference failed, and `Monitoring` otherwise.
    pub fn record_outcome(&mut self, outcome: &WindowOutcome) {
        let scene = &outcome.scene;
        self.windows_processed += 1;
        self.last_window_time = Some(scene.timestamp);

        let visual_failed = scene.visual_failed();
        if visual_failed {
            self.visual_failures += 1;
        }

        let critical = outcome
            .alerts
            .iter()
            .any(|a| a.severity == AlertSeverity::Critical);
        self.status = if critical {
            SystemStatus::Alert
        } else if visual_failed {
            SystemStatus::Degraded
        } else {
            SystemStatus::Monitoring
        };

        for alert in &outcome.alerts {
            self.alerts_raised += 1;
            if alert.severity == AlertSeverity::Critical {
                self.critical_alerts += 1;
            }
            if self.recent_alerts.len() >= MAX_RECENT_ALERTS {
                self.recent_alerts.pop_front();
            }
            self.recent_alerts.push_back(alert.clone());
        }

        if self.recent_scenes.len() >= MAX_RECENT_SCENES {
            self.recent_scenes.pop_front();
        }
        self.recent_scenes.push_back(scene.clone());
        self.latest_scene = Some(scene.clone());
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.uptime.elapsed().as_secs()
    }
}

/// System operational status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemStatus {
    /// System is starting up
    Initializing,
    /// Normal operation
    Monitoring,
    /// Last window raised a Critical alert
    Alert,
    /// Visual inference failing; running on audio alone
    Degraded,
    /// Input source failed
    Error,
}

impl std::fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SystemStatus::Initializing => write!(f, "Initializing"),
            SystemStatus::Monitoring => write!(f, "Monitoring"),
            SystemStatus::Alert => write!(f, "Alert"),
            SystemStatus::Degraded => write!(f, "Degraded"),
            SystemStatus::Error => write!(f, "Error"),
        }
    }
}

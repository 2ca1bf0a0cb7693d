//! Alert notifiers
//!
//! Delivery to phones or external services is out of scope; these notifiers
//! log alerts and fan them out to in-process subscribers.

use crate::types::{Alert, AlertSeverity};
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, alert: &Alert) -> Result<()>;

    fn name(&self) -> &str;
}

/// Writes alerts to the tracing log at a level matching their severity
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, alert: &Alert) -> Result<()> {
        match alert.severity {
            AlertSeverity::Critical => error!(
                id = alert.id,
                rule = %alert.rule,
                window_id = %alert.window_id,
                "{} {}: {}", alert.severity, alert.title, alert.message
            ),
            AlertSeverity::Warning => warn!(
                id = alert.id,
                rule = %alert.rule,
                window_id = %alert.window_id,
                "{} {}: {}", alert.severity, alert.title, alert.message
            ),
            AlertSeverity::Info => info!(
                id = alert.id,
                rule = %alert.rule,
                window_id = %alert.window_id,
                "{} {}: {}", alert.severity, alert.title, alert.message
            ),
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// Broadcasts alerts to in-process subscribers
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: broadcast::Sender<Alert>,
}

impl ChannelNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Alert> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, alert: &Alert) -> Result<()> {
        // no subscribers is not a failure
        let _ = self.tx.send(alert.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "channel"
    }
}

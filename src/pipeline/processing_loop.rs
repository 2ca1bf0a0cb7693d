//! Processing loop shared across all input sources.
//!
//! Pulls windows from an [`InputSource`], runs them through the
//! [`PipelineCoordinator`], then persists, notifies and updates [`AppState`].

use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{AppState, PipelineCoordinator, PipelineStats, SystemStatus, WindowOutcome};
use crate::acquisition::{AcquisitionError, InputEvent, InputSource};
use crate::alerting::Notifier;
use crate::config::defaults::PROGRESS_LOG_INTERVAL;
use crate::storage::HistoryStorage;

/// Owns all state needed for the processing loop.
///
/// Built with [`new()`](ProcessingLoop::new), optionally given storage and
/// notifiers, then consumed by [`run()`](ProcessingLoop::run).
pub struct ProcessingLoop {
    coordinator: PipelineCoordinator,
    app_state: Arc<RwLock<AppState>>,
    storage: Option<HistoryStorage>,
    notifiers: Vec<Arc<dyn Notifier>>,
    cancel_token: CancellationToken,
}

impl ProcessingLoop {
    pub fn new(
        coordinator: PipelineCoordinator,
        app_state: Arc<RwLock<AppState>>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            coordinator,
            app_state,
            storage: None,
            notifiers: Vec::new(),
            cancel_token,
        }
    }

    pub fn with_storage(mut self, storage: HistoryStorage) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    /// Run until the source is exhausted or cancellation.
    ///
    /// A source error ends the loop and is returned after the final
    /// statistics are logged.
    pub async fn run<S: InputSource + ?Sized>(
        mut self,
        source: &mut S,
    ) -> Result<PipelineStats, AcquisitionError> {
        info!(source = source.source_name(), "Processing windows");
        {
            let mut state = self.app_state.write().await;
            state.source_name = source.source_name().to_string();
            state.status = SystemStatus::Monitoring;
        }

        let mut source_error = None;
        loop {
            let event = tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => {
                    info!("Shutdown signal received");
                    break;
                }
                result = source.next_input() => result,
            };

            let raw = match event {
                Ok(InputEvent::Input(raw)) => raw,
                Ok(InputEvent::Eof) => {
                    info!(source = source.source_name(), "Source reached end");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Input source failed");
                    self.app_state.write().await.status = SystemStatus::Error;
                    source_error = Some(e);
                    break;
                }
            };

            self.app_state.write().await.windows_received += 1;

            match self.coordinator.process(raw).await {
                Some(outcome) => self.handle_outcome(outcome).await,
                None => self.app_state.write().await.windows_skipped += 1,
            }

            let stats = self.coordinator.stats();
            if stats.windows_received % PROGRESS_LOG_INTERVAL == 0 {
                info!(
                    received = stats.windows_received,
                    processed = stats.windows_processed,
                    skipped = stats.windows_skipped,
                    alerts = stats.alerts_raised,
                    "Progress"
                );
            }
        }

        if let Some(storage) = &self.storage {
            if let Err(e) = storage.flush() {
                warn!(error = %e, "Failed to flush history storage");
            }
        }

        let stats = self.coordinator.stats();
        info!("FINAL STATISTICS");
        info!("   Windows received:   {}", stats.windows_received);
        info!("   Windows processed:  {}", stats.windows_processed);
        info!("   Windows skipped:    {}", stats.windows_skipped);
        info!("   Visual failures:    {}", stats.visual_failures);
        info!("   Alerts raised:      {}", stats.alerts_raised);
        info!("   Critical alerts:    {}", stats.critical_alerts);

        match source_error {
            Some(e) => Err(e),
            None => Ok(stats),
        }
    }

    async fn handle_outcome(&mut self, outcome: WindowOutcome) {
        let mut storage_errors = 0u64;
        if let Some(storage) = &self.storage {
            if let Err(e) = storage.store_scene(&outcome.scene) {
                warn!(window_id = %outcome.scene.window_id, error = %e, "Failed to persist scene");
                storage_errors += 1;
            }
            for alert in &outcome.alerts {
                if let Err(e) = storage.store_alert(alert) {
                    warn!(alert_id = alert.id, error = %e, "Failed to persist alert");
                    storage_errors += 1;
                }
            }
        }

        let mut notification_errors = 0u64;
        for alert in &outcome.alerts {
            for notifier in &self.notifiers {
                if let Err(e) = notifier.notify(alert).await {
                    warn!(notifier = notifier.name(), alert_id = alert.id, error = %e, "Notification failed");
                    notification_errors += 1;
                }
            }
        }

        info!(
            window_id = %outcome.scene.window_id,
            state = %outcome.scene.state,
            stable = %outcome.scene.stable_state,
            severity = outcome.scene.severity,
            alerts = outcome.alerts.len(),
            "{}",
            outcome.scene.summary
        );

        let mut state = self.app_state.write().await;
        state.storage_errors += storage_errors;
        state.notification_errors += notification_errors;
        state.record_outcome(&outcome);
    }
}

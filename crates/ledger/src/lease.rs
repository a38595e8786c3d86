//! Background sweep of expired assignments.

use std::sync::Arc;
use std::time::Duration;

use hive_core::ResultExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::marketplace::Marketplace;

/// Handle to a running sweeper.
pub struct LeaseSweeper {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl LeaseSweeper {
    /// Run [`Marketplace::expire_stale_assignments`] every `interval` until
    /// stopped.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn start(marketplace: Arc<Marketplace>, interval: Duration) -> Self {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let handle = tokio::spawn(async move {
            tracing::info!(interval_secs = interval.as_secs(), "lease sweeper started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let expired = marketplace
                            .expire_stale_assignments()
                            .await
                            .or_default_logged(0, "lease sweep failed");
                        if expired > 0 {
                            tracing::info!(expired, "expired stale assignments");
                        }
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("lease sweeper stopped");
        });

        Self { stop_tx, handle }
    }

    /// Signal the sweeper to stop and wait for it.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "lease sweeper task ended abnormally");
        }
    }
}

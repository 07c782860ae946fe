//! Background drivers for the checker and the applier.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use super::{UpdateApplier, UpdateChecker};

#[derive(Debug, Clone, Copy)]
pub struct SchedulerSettings {
    /// Delay before the first check.
    pub startup_delay: Duration,
    /// Time between checks. The checker still applies its own interval.
    pub poll_interval: Duration,
}

/// Sent to subscribers when a check finds a validated update. The receiver
/// is responsible for asking the user before applying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateNotice {
    pub version: String,
    pub changelog: String,
}

pub struct UpdateScheduler;

impl UpdateScheduler {
    /// Start polling `checker`. Dropping the returned handle stops the loop
    /// at its next wake-up, the same as [`SchedulerHandle::cancel`].
    pub fn start(checker: Arc<UpdateChecker>, settings: SchedulerSettings) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let (notices, _) = broadcast::channel(16);
        let tx = notices.clone();

        let task = tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(settings.startup_delay) => {}
                _ = shutdown_rx.changed() => return,
            }

            let mut interval = tokio::time::interval(settings.poll_interval);
            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = shutdown_rx.changed() => break,
                }

                if !checker.check().await {
                    continue;
                }
                if let Some(update) = checker.pending_update() {
                    let notice = UpdateNotice {
                        version: update.latest_version,
                        changelog: update.changelog,
                    };
                    if tx.send(notice).is_err() {
                        log::debug!("Update found but nobody is listening");
                    }
                }
            }
            log::debug!("Update scheduler stopped");
        });

        SchedulerHandle {
            shutdown: shutdown_tx,
            notices,
            task,
        }
    }
}

pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    notices: broadcast::Sender<UpdateNotice>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<UpdateNotice> {
        self.notices.subscribe()
    }

    /// Stop scheduling further checks. A check already running completes.
    pub fn cancel(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Wait for the loop to exit after [`cancel`](Self::cancel).
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            log::warn!("Update scheduler task failed: {}", e);
        }
    }
}

/// Apply an update without blocking the caller.
pub fn spawn_apply(applier: Arc<UpdateApplier>) -> JoinHandle<bool> {
    tokio::spawn(async move { applier.apply_update().await })
}

/// Convenience for front ends that poll with a deadline.
pub async fn wait_for_notice(
    rx: &mut broadcast::Receiver<UpdateNotice>,
    timeout: Duration,
) -> Option<UpdateNotice> {
    match tokio::time::timeout(timeout, rx.recv()).await {
        Ok(Ok(notice)) => Some(notice),
        Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => {
            log::warn!("Update listener lagged, skipped {} notices", skipped);
            None
        }
        Ok(Err(broadcast::error::RecvError::Closed)) | Err(_) => None,
    }
}

//! Sync scheduler
//!
//! Wraps a [`SyncService`] in a background task: local-edit notifications
//! are coalesced through a debounce timer into one append-push, and a poll
//! interval drives periodic pull-and-merge. Reconfiguring a backend means
//! shutting the engine down and starting a fresh one.

use crate::sync::SyncService;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Scheduler timing configuration
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Quiet period after the last edit before pushing
    pub debounce: Duration,
    /// Interval between scheduled pulls
    pub poll_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(800),
            poll_interval: Duration::from_secs(30),
        }
    }
}

/// Handle to a running sync task
pub struct SyncEngine {
    edits: mpsc::UnboundedSender<()>,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SyncEngine {
    /// Spawn the background task. The first pull runs immediately.
    #[must_use]
    pub fn start(service: Arc<SyncService>, config: EngineConfig) -> Self {
        let (edits, edit_rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run(service, config, edit_rx, shutdown_rx));
        Self {
            edits,
            shutdown,
            handle,
        }
    }

    /// Signal a local edit; pushes fire after the debounce quiet period
    pub fn notify_edit(&self) {
        let _ = self.edits.send(());
    }

    /// Stop the task, cancelling any armed timers
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}

async fn run(
    service: Arc<SyncService>,
    config: EngineConfig,
    mut edits: mpsc::UnboundedReceiver<()>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut poll = tokio::time::interval(config.poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let push_timer = tokio::time::sleep(config.debounce);
    tokio::pin!(push_timer);
    let mut push_armed = false;

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
            _ = poll.tick() => {
                match service.pull_and_merge().await {
                    Ok(Some(merged)) => {
                        tracing::debug!(backend = service.backend(), merged, "Scheduled pull complete");
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(backend = service.backend(), error = %e, "Scheduled pull failed");
                    }
                }
            }
            received = edits.recv() => {
                match received {
                    Some(()) => {
                        // Each edit restarts the quiet period
                        push_timer.as_mut().reset(Instant::now() + config.debounce);
                        push_armed = true;
                    }
                    None => break,
                }
            }
            () = &mut push_timer, if push_armed => {
                push_armed = false;
                match service.push_unacknowledged().await {
                    Ok(0) => {}
                    Ok(pushed) => {
                        tracing::debug!(backend = service.backend(), pushed, "Debounced push complete");
                    }
                    Err(e) => {
                        tracing::warn!(backend = service.backend(), error = %e, "Debounced push failed");
                    }
                }
            }
        }
    }

    tracing::debug!(backend = service.backend(), "Sync engine stopped");
}

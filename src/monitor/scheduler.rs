//! Periodic driver thread for a [`MonitorService`].

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, select, Receiver, Sender};
use tracing::{debug, error, info};

use crate::error::{AuthoringError, AuthoringResult};

use super::dispatcher::MonitorService;

/// Runs [`MonitorService::poll_once`] on a dedicated thread every interval.
///
/// Dropping the scheduler stops the thread and waits for the current round.
#[derive(Debug)]
pub struct MonitorScheduler {
    shutdown_tx: Option<Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl MonitorScheduler {
    /// Spawns the polling thread.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the thread cannot be spawned.
    pub fn start(service: Arc<MonitorService>, interval: Duration) -> AuthoringResult<Self> {
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let join = thread::Builder::new()
            .name("authoring-monitor".to_string())
            .spawn(move || worker_loop(&service, interval, &shutdown_rx))
            .map_err(|e| AuthoringError::internal(format!("failed to spawn monitor scheduler: {e}")))?;

        info!(interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX), "monitor scheduler started");
        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            join: Some(join),
        })
    }

    /// Signals the thread to stop and joins it. Idempotent.
    pub fn stop(&mut self) {
        // Dropping the sender disconnects the channel and wakes the worker.
        drop(self.shutdown_tx.take());
        if let Some(handle) = self.join.take() {
            if handle.join().is_err() {
                error!("monitor scheduler thread panicked");
            }
            info!("monitor scheduler stopped");
        }
    }

    /// True until [`stop`](Self::stop) is called.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.join.is_some()
    }
}

impl Drop for MonitorScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(service: &MonitorService, interval: Duration, shutdown_rx: &Receiver<()>) {
    loop {
        select! {
            recv(shutdown_rx) -> _ => break,
            default(interval) => {
                match service.poll_once() {
                    Ok(summary) => debug!(polled = summary.polled, changed = summary.changed, "poll round"),
                    Err(err) => error!(error = %err, "monitor poll round failed"),
                }
            }
        }
    }
}

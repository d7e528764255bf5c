//! Background high-water snapshots.

use crate::document::JournaledDocument;
use crate::error::{CoreError, CoreResult};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// Name of the monitor thread.
pub const MONITOR_THREAD_NAME: &str = "journaldoc-high-water";

/// Periodically snapshots a document whose journal passed its high water
/// mark.
///
/// The monitor holds only a weak reference, so it never keeps a document
/// alive. It stops when dropped, when [`stop`](Self::stop) is called, or
/// once the document is closed or dropped.
pub struct HighWaterMonitor {
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl HighWaterMonitor {
    /// Starts checking `document` every `interval`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] for a zero interval, or an I/O
    /// error if the thread cannot be spawned.
    pub fn spawn(document: &Arc<JournaledDocument>, interval: Duration) -> CoreResult<Self> {
        if interval.is_zero() {
            return Err(CoreError::invalid_operation(
                "high water monitor needs a non-zero interval",
            ));
        }

        let (shutdown, signal) = mpsc::channel::<()>();
        let document = Arc::downgrade(document);
        let handle = thread::Builder::new()
            .name(MONITOR_THREAD_NAME.to_string())
            .spawn(move || loop {
                match signal.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if !check(&document) {
                            break;
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;

        debug!(interval_ms = interval.as_millis(), "high water monitor started");
        Ok(Self {
            shutdown: Some(shutdown),
            handle: Some(handle),
        })
    }

    /// Starts a monitor using the document's configured snapshot interval.
    ///
    /// Returns `Ok(None)` if the interval is zero.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the thread cannot be spawned.
    pub fn from_config(document: &Arc<JournaledDocument>) -> CoreResult<Option<Self>> {
        let interval = document.config().snapshot_interval;
        if interval.is_zero() {
            return Ok(None);
        }
        Self::spawn(document, interval).map(Some)
    }

    /// Returns true while the monitor thread is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stops the monitor and waits for its thread to exit.
    pub fn stop(mut self) {
        self.shutdown_and_join();
    }

    fn shutdown_and_join(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            // the thread may already have exited on its own
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("high water monitor thread panicked");
            }
        }
    }
}

impl Drop for HighWaterMonitor {
    fn drop(&mut self) {
        self.shutdown_and_join();
    }
}

/// Runs one check. Returns false once the document is gone or closed.
fn check(document: &Weak<JournaledDocument>) -> bool {
    let Some(document) = document.upgrade() else {
        return false;
    };
    if !document.is_open() {
        return false;
    }
    match document.snapshot_if_high_water() {
        Ok(true) => debug!("high water snapshot taken"),
        Ok(false) => {}
        Err(e) => warn!(error = %e, "high water snapshot failed"),
    }
    true
}

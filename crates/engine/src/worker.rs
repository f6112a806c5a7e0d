//! Interval workers with cooperative shutdown
//!
//! Each background loop (reaper sweep, snapshot tick, merge tick) runs on
//! its own named thread. Sleeps happen in small slices so a shutdown
//! signal is observed within ~100 ms regardless of the tick interval.
//! A tick that fails is logged and retried on the next period.

use celltable_core::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// A named background thread running a fallible tick on a fixed interval.
pub struct Worker {
    name: String,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawn a worker that calls `tick` every `interval` until `shutdown`
    /// is set.
    pub fn spawn<F>(
        name: &str,
        interval: Duration,
        shutdown: Arc<AtomicBool>,
        mut tick: F,
    ) -> Self
    where
        F: FnMut() -> Result<()> + Send + 'static,
    {
        let thread_name = name.to_string();
        let loop_name = thread_name.clone();
        let handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                debug!(worker = %loop_name, ?interval, "worker started");
                while !shutdown.load(Ordering::Relaxed) {
                    // Sleep in slices so shutdown is observed promptly
                    let slice = Duration::from_millis(100).min(interval);
                    let mut elapsed = Duration::ZERO;
                    while elapsed < interval {
                        if shutdown.load(Ordering::Relaxed) {
                            debug!(worker = %loop_name, "worker stopping");
                            return;
                        }
                        thread::sleep(slice);
                        elapsed += slice;
                    }

                    if let Err(e) = tick() {
                        warn!(worker = %loop_name, error = %e, "tick failed; will retry");
                    }
                }
                debug!(worker = %loop_name, "worker stopping");
            })
            .expect("failed to spawn worker thread");

        Self {
            name: thread_name,
            handle: Some(handle),
        }
    }

    /// The worker's thread name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait for the worker thread to exit. The shutdown flag must already
    /// be set or this blocks until it is.
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

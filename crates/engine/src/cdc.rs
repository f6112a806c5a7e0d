//! Change-data-capture sink seam
//!
//! The core drives a sink with one event per written value or placed
//! tombstone. The core never blocks on the sink: `ChannelSink` uses a
//! bounded channel and drops events when the consumer falls behind; sink
//! implementations choose their own backpressure strategy beyond that.

use celltable_core::TimestampedValue;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use tracing::trace;

/// Kind of change captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CdcOperation {
    /// A value was written.
    Write,
    /// A tombstone was placed.
    Delete,
}

/// One captured change.
#[derive(Debug, Clone, PartialEq)]
pub struct CdcEvent {
    /// What happened.
    pub operation: CdcOperation,
    /// Target row.
    pub row_key: String,
    /// Target family.
    pub family: String,
    /// Target qualifier.
    pub qualifier: String,
    /// The value or tombstone as stored.
    pub value: TimestampedValue,
}

/// Consumer of captured changes. Implementations must not block the core.
pub trait CdcSink: Send + Sync {
    /// Accept one event; best effort.
    fn emit(&self, event: CdcEvent);
}

/// Sink that discards every event.
#[derive(Debug, Default)]
pub struct NullSink;

impl CdcSink for NullSink {
    fn emit(&self, _event: CdcEvent) {}
}

/// Bounded-channel sink. Events are delivered to the paired receiver;
/// when the channel is full (or the receiver is gone) the event is
/// dropped and counted.
pub struct ChannelSink {
    tx: SyncSender<CdcEvent>,
    dropped: AtomicU64,
}

impl ChannelSink {
    /// Create a sink with the given channel capacity, returning the sink
    /// and the consumer end.
    pub fn new(capacity: usize) -> (Self, Receiver<CdcEvent>) {
        let (tx, rx) = sync_channel(capacity);
        (
            Self {
                tx,
                dropped: AtomicU64::new(0),
            },
            rx,
        )
    }

    /// Number of events dropped so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl CdcSink for ChannelSink {
    fn emit(&self, event: CdcEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                trace!("dropped CDC event");
            }
        }
    }
}

//! Console counters

use core::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time snapshot of console activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsoleStats {
    /// Characters delivered into the receive queue
    pub rx_bytes: u64,
    /// Characters lost to receive queue overrun
    pub rx_dropped: u64,
    /// Transmissions that completed
    pub tx_frames: u64,
    pub tx_bytes: u64,
    /// Transmissions rejected by the driver or aborted by the hardware
    pub tx_errors: u64,
    /// Interrupt events the console had no use for
    pub ignored_events: u64,
}

#[derive(Debug, Default)]
pub(crate) struct TxCounters {
    frames: AtomicU64,
    bytes: AtomicU64,
    errors: AtomicU64,
    ignored_events: AtomicU64,
}

impl TxCounters {
    pub(crate) fn record_frame(&self, len: usize) {
        self.frames.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(len as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_ignored(&self) {
        self.ignored_events.fetch_add(1, Ordering::Relaxed);
    }

    /// Fill the transmit side of a snapshot
    pub(crate) fn fill(&self, stats: &mut ConsoleStats) {
        stats.tx_frames = self.frames.load(Ordering::Relaxed);
        stats.tx_bytes = self.bytes.load(Ordering::Relaxed);
        stats.tx_errors = self.errors.load(Ordering::Relaxed);
        stats.ignored_events = self.ignored_events.load(Ordering::Relaxed);
    }
}

//! Drop and throughput counters for a MIDI ring.
//!
//! Both halves of a ring share one `TransportStats`; the audio thread only
//! does relaxed `fetch_add`s, readers take a [`snapshot`](TransportStats::snapshot).

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct TransportStats {
    /// Events accepted by `write_event`
    events_written: AtomicU64,
    /// Writes refused because the ring was full
    write_overflows: AtomicU64,
    /// Writes refused because the payload was not a valid MIDI message
    malformed_rejected: AtomicU64,
    /// Events copied into a destination buffer
    events_delivered: AtomicU64,
    /// Events skipped because the destination was full
    dest_overflow_drops: AtomicU64,
    /// Events consumed but discarded by the channel filter
    filtered: AtomicU64,
    /// Events discarded by `flush`
    flushed: AtomicU64,
}

/// Point-in-time copy of [`TransportStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStatsSnapshot {
    pub events_written: u64,
    pub write_overflows: u64,
    pub malformed_rejected: u64,
    pub events_delivered: u64,
    pub dest_overflow_drops: u64,
    pub filtered: u64,
    pub flushed: u64,
}

impl TransportStatsSnapshot {
    /// Events that entered the ring and will never reach a destination.
    pub fn lost(&self) -> u64 {
        self.dest_overflow_drops + self.flushed
    }
}

impl TransportStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn record_written(&self) {
        self.events_written.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_write_overflow(&self) {
        self.write_overflows.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_malformed(&self) {
        self.malformed_rejected.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_delivered(&self, count: usize) {
        if count > 0 {
            self.events_delivered
                .fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    #[inline]
    pub(crate) fn record_dest_overflow(&self) {
        self.dest_overflow_drops.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_filtered(&self) {
        self.filtered.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_flushed(&self, count: usize) {
        if count > 0 {
            self.flushed.fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> TransportStatsSnapshot {
        TransportStatsSnapshot {
            events_written: self.events_written.load(Ordering::Relaxed),
            write_overflows: self.write_overflows.load(Ordering::Relaxed),
            malformed_rejected: self.malformed_rejected.load(Ordering::Relaxed),
            events_delivered: self.events_delivered.load(Ordering::Relaxed),
            dest_overflow_drops: self.dest_overflow_drops.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            flushed: self.flushed.load(Ordering::Relaxed),
        }
    }
}

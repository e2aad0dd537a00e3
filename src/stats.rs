//! Delivery counters shared with the real-time callback.

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of delivery statistics.
///
/// Counters accumulate over the lifetime of a [`DeliveryEngine`], across
/// device reconfiguration.
///
/// [`DeliveryEngine`]: crate::DeliveryEngine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    /// Slots the device played from producer data.
    pub periods_played: u64,
    /// Callback invocations that found no ready slot and played silence.
    pub underruns: u64,
    /// Filled slots the producer gave up on after the timeout.
    pub dropped_periods: u64,
    /// Frames handed to the ring by `ingest`.
    pub frames_ingested: u64,
}

/// Internal counters shared between the engine, the producer half and the
/// consumer half of the ring.
///
/// Updated with relaxed atomics only, so the real-time side can bump them
/// without waiting.
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub periods_played: AtomicU64,
    pub underruns: AtomicU64,
    pub dropped_periods: AtomicU64,
    pub frames_ingested: AtomicU64,
}

impl StatsCounters {
    pub fn snapshot(&self) -> DeliveryStats {
        DeliveryStats {
            periods_played: self.periods_played.load(Ordering::Relaxed),
            underruns: self.underruns.load(Ordering::Relaxed),
            dropped_periods: self.dropped_periods.load(Ordering::Relaxed),
            frames_ingested: self.frames_ingested.load(Ordering::Relaxed),
        }
    }
}

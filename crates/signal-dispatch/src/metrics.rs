//! Process-wide dispatch counters.
//!
//! Plain atomics so the CLI can print a summary without a metrics backend.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

static FLUSH_TOTAL: AtomicU64 = AtomicU64::new(0);
static FLUSH_FAILED: AtomicU64 = AtomicU64::new(0);
static FLUSH_SKIPPED: AtomicU64 = AtomicU64::new(0);
static BEACON_TOTAL: AtomicU64 = AtomicU64::new(0);
static BEACON_REFUSED: AtomicU64 = AtomicU64::new(0);
static ELEMENTS_SENT: AtomicU64 = AtomicU64::new(0);
static SNAPSHOTS_DROPPED: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchMetrics {
    pub flushes: u64,
    pub failures: u64,
    pub skipped: u64,
    pub beacons: u64,
    pub beacons_refused: u64,
    pub elements_sent: u64,
    pub snapshots_dropped: u64,
}

pub(crate) fn record_flush(elements: usize) {
    FLUSH_TOTAL.fetch_add(1, Ordering::Relaxed);
    ELEMENTS_SENT.fetch_add(elements as u64, Ordering::Relaxed);
}

pub(crate) fn record_failure() {
    FLUSH_FAILED.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_skipped() {
    FLUSH_SKIPPED.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_beacon(elements: usize, accepted: bool) {
    BEACON_TOTAL.fetch_add(1, Ordering::Relaxed);
    if accepted {
        ELEMENTS_SENT.fetch_add(elements as u64, Ordering::Relaxed);
    } else {
        BEACON_REFUSED.fetch_add(1, Ordering::Relaxed);
    }
}

pub(crate) fn record_dropped(snapshots: usize) {
    SNAPSHOTS_DROPPED.fetch_add(snapshots as u64, Ordering::Relaxed);
}

pub fn snapshot() -> DispatchMetrics {
    DispatchMetrics {
        flushes: FLUSH_TOTAL.load(Ordering::Relaxed),
        failures: FLUSH_FAILED.load(Ordering::Relaxed),
        skipped: FLUSH_SKIPPED.load(Ordering::Relaxed),
        beacons: BEACON_TOTAL.load(Ordering::Relaxed),
        beacons_refused: BEACON_REFUSED.load(Ordering::Relaxed),
        elements_sent: ELEMENTS_SENT.load(Ordering::Relaxed),
        snapshots_dropped: SNAPSHOTS_DROPPED.load(Ordering::Relaxed),
    }
}

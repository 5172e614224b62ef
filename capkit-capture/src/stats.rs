//! Session statistics aggregation
//!
//! The capture loop bumps atomic counters for every frame it delivers; the
//! caller side merges them with driver counters into one [`CaptureStats`]
//! snapshot under a short critical section.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use capkit_core::CaptureStats;
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct Times {
    start: Option<SystemTime>,
    end: Option<SystemTime>,
}

/// Thread-safe statistics accumulator for one session
#[derive(Debug, Default)]
pub struct StatsAccumulator {
    packets_received: AtomicU64,
    bytes_received: AtomicU64,
    times: Mutex<Times>,
    /// Last merged snapshot; counters never go below it
    last: Mutex<CaptureStats>,
}

impl StatsAccumulator {
    /// Create a new statistics accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a delivered packet of `wire_len` bytes
    pub fn record_packet(&self, wire_len: u64) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(wire_len, Ordering::Relaxed);
    }

    /// Stamp the start of the capture loop
    pub fn mark_started(&self) {
        let mut times = self.times.lock();
        times.start = Some(SystemTime::now());
        times.end = None;
    }

    /// Stamp the end of the capture loop; the first stamp wins
    pub fn mark_stopped(&self) {
        let mut times = self.times.lock();
        if times.start.is_some() && times.end.is_none() {
            times.end = Some(SystemTime::now());
        }
    }

    /// Pipeline counters only
    pub fn pipeline_snapshot(&self) -> CaptureStats {
        let times = self.times.lock();
        CaptureStats {
            packets_received: self.packets_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            start_time: times.start,
            end_time: times.end,
            ..Default::default()
        }
    }

    /// Merge pipeline counters with the driver's and the previous snapshot
    ///
    /// Each counter is the maximum of the three sources, so a driver that
    /// resets its own counters never makes the session counters go back.
    pub fn merge(&self, driver: Option<&CaptureStats>) -> CaptureStats {
        let pipeline = self.pipeline_snapshot();

        let mut last = self.last.lock();
        let mut merged = match driver {
            Some(driver) => pipeline.max_with(driver),
            None => pipeline.clone(),
        }
        .max_with(&last);
        // Times are owned by the session, never by the driver
        merged.start_time = pipeline.start_time;
        merged.end_time = pipeline.end_time;

        *last = merged.clone();
        merged
    }

    /// Last merged snapshot, without consulting any source
    pub fn last(&self) -> CaptureStats {
        self.last.lock().clone()
    }

    /// Get packets received count
    pub fn packets_received(&self) -> u64 {
        self.packets_received.load(Ordering::Relaxed)
    }

    /// Get bytes received count
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }
}

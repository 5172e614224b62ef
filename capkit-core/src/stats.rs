//! Capture statistics value type

use std::time::{Duration, SystemTime};

/// Statistics for one capture session
///
/// Always handed out by value; holding a `CaptureStats` never observes later
/// updates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Number of packets received
    pub packets_received: u64,
    /// Number of packets dropped by the capture process / kernel buffer
    pub packets_dropped: u64,
    /// Number of packets dropped by the interface
    pub packets_if_dropped: u64,
    /// Total bytes received (wire length)
    pub bytes_received: u64,
    /// When the capture loop started
    pub start_time: Option<SystemTime>,
    /// When the capture loop ended
    pub end_time: Option<SystemTime>,
}

impl CaptureStats {
    /// Create new empty statistics
    pub fn new() -> Self {
        Self::default()
    }

    /// Field-wise maximum of the counters; timestamps prefer `self`
    pub fn max_with(&self, other: &CaptureStats) -> CaptureStats {
        CaptureStats {
            packets_received: self.packets_received.max(other.packets_received),
            packets_dropped: self.packets_dropped.max(other.packets_dropped),
            packets_if_dropped: self.packets_if_dropped.max(other.packets_if_dropped),
            bytes_received: self.bytes_received.max(other.bytes_received),
            start_time: self.start_time.or(other.start_time),
            end_time: self.end_time.or(other.end_time),
        }
    }

    /// Time between start and end (or now, while still running)
    pub fn duration(&self) -> Duration {
        match self.start_time {
            Some(start) => {
                let end = self.end_time.unwrap_or_else(SystemTime::now);
                end.duration_since(start).unwrap_or_default()
            }
            None => Duration::ZERO,
        }
    }

    /// Calculate drop rate as percentage
    pub fn drop_rate(&self) -> f64 {
        let total = self.total_packets();
        if total == 0 {
            return 0.0;
        }
        (self.packets_dropped as f64 / total as f64) * 100.0
    }

    /// Check if there are significant drops
    pub fn has_significant_drops(&self, threshold_percent: f64) -> bool {
        self.drop_rate() > threshold_percent
    }

    /// Get total packets (received + dropped)
    pub fn total_packets(&self) -> u64 {
        self.packets_received + self.packets_dropped
    }

    /// Average packet rate over the capture duration
    pub fn packets_per_second(&self) -> f64 {
        rate(self.packets_received, self.duration())
    }

    /// Average byte rate over the capture duration
    pub fn bytes_per_second(&self) -> f64 {
        rate(self.bytes_received, self.duration())
    }

    /// Format statistics as human-readable string
    pub fn format(&self) -> String {
        format!(
            "Received: {} packets ({} bytes)\n\
             Dropped: {} packets ({:.2}%)\n\
             IF Dropped: {} packets\n\
             Duration: {:.2}s\n\
             Rate: {:.2} pps, {:.2} KB/s",
            self.packets_received,
            self.bytes_received,
            self.packets_dropped,
            self.drop_rate(),
            self.packets_if_dropped,
            self.duration().as_secs_f64(),
            self.packets_per_second(),
            self.bytes_per_second() / 1024.0
        )
    }
}

fn rate(count: u64, duration: Duration) -> f64 {
    let secs = duration.as_secs_f64();
    if secs > 0.0 {
        count as f64 / secs
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(received: u64, dropped: u64) -> CaptureStats {
        CaptureStats {
            packets_received: received,
            packets_dropped: dropped,
            ..CaptureStats::default()
        }
    }

    #[test]
    fn test_capture_stats_new() {
        let stats = CaptureStats::new();
        assert_eq!(stats.packets_received, 0);
        assert_eq!(stats.packets_dropped, 0);
        assert_eq!(stats.bytes_received, 0);
        assert_eq!(stats.duration(), Duration::ZERO);
    }

    #[test]
    fn test_drop_rate() {
        let stats = sample(90, 10);
        assert_eq!(stats.drop_rate(), 10.0);
        assert!(stats.has_significant_drops(5.0));
        assert!(!stats.has_significant_drops(15.0));
        assert_eq!(sample(0, 0).drop_rate(), 0.0);
    }

    #[test]
    fn test_total_packets() {
        assert_eq!(sample(100, 10).total_packets(), 110);
    }

    #[test]
    fn test_max_with_keeps_larger_counters() {
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(10);
        let a = CaptureStats {
            packets_received: 5,
            bytes_received: 100,
            start_time: Some(start),
            ..CaptureStats::default()
        };
        let b = CaptureStats {
            packets_received: 3,
            packets_dropped: 2,
            bytes_received: 400,
            ..CaptureStats::default()
        };

        let merged = a.max_with(&b);
        assert_eq!(merged.packets_received, 5);
        assert_eq!(merged.packets_dropped, 2);
        assert_eq!(merged.bytes_received, 400);
        assert_eq!(merged.start_time, Some(start));
    }

    #[test]
    fn test_rates_use_start_and_end() {
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        let stats = CaptureStats {
            packets_received: 1000,
            bytes_received: 64_000,
            start_time: Some(start),
            end_time: Some(start + Duration::from_secs(10)),
            ..CaptureStats::default()
        };

        assert_eq!(stats.duration(), Duration::from_secs(10));
        assert_eq!(stats.packets_per_second(), 100.0);
        assert_eq!(stats.bytes_per_second(), 6400.0);

        let formatted = stats.format();
        assert!(formatted.contains("1000"));
        assert!(formatted.contains("64000"));
    }
}

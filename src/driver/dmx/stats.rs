//! send loop counters, readable from any thread without locking

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct SendStats {
    pub(crate) frames_sent: AtomicU64,
    pub(crate) write_failures: AtomicU64,
    // ticks with no transport attached
    pub(crate) frames_dropped: AtomicU64,
    window_start: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SendStatsSnapshot {
    pub frames_sent: u64,
    pub write_failures: u64,
    pub frames_dropped: u64,
    pub elapsed: Duration,
}

impl SendStatsSnapshot {
    /// frames per second actually written since the driver was created
    pub fn send_rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.frames_sent as f64 / secs
        } else {
            0.0
        }
    }
}

impl Default for SendStats {
    fn default() -> Self {
        Self::new()
    }
}

impl SendStats {
    pub fn new() -> Self {
        Self {
            frames_sent: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            window_start: Instant::now(),
        }
    }

    pub(crate) fn record_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SendStatsSnapshot {
        SendStatsSnapshot {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            elapsed: self.window_start.elapsed(),
        }
    }
}

//! Progress tracking utilities.
//!
//! A thread-safe tracker that logs progress when an internal count crosses
//! interval boundaries; safe to share between workers.

use std::sync::atomic::{AtomicU64, Ordering};

use log::info;

use crate::logging::format_count;

/// Thread-safe progress tracker logging at regular intervals.
pub struct ProgressTracker {
    interval: u64,
    message: String,
    count: AtomicU64,
}

impl ProgressTracker {
    /// Creates a tracker with a default interval of 1,000,000 items.
    #[must_use]
    pub fn new(message: &str) -> Self {
        Self { interval: 1_000_000, message: message.to_string(), count: AtomicU64::new(0) }
    }

    /// Sets the logging interval.
    #[must_use]
    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval.max(1);
        self
    }

    /// Adds `n` items, logging if an interval boundary was crossed.
    pub fn log_if_needed(&self, n: u64) {
        let previous = self.count.fetch_add(n, Ordering::Relaxed);
        let current = previous + n;
        if previous / self.interval != current / self.interval {
            info!("{} {}", self.message, format_count(current));
        }
    }

    /// The current count.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Logs the final count if it did not land exactly on an interval.
    pub fn log_final(&self) {
        let count = self.count();
        if count % self.interval != 0 {
            info!("{} {} (complete)", self.message, format_count(count));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_counts_accumulate() {
        let tracker = ProgressTracker::new("Processed regions").with_interval(100);
        for _ in 0..250 {
            tracker.log_if_needed(1);
        }
        assert_eq!(tracker.count(), 250);
        tracker.log_final();
    }

    #[test]
    fn test_thread_safe() {
        let tracker = Arc::new(ProgressTracker::new("Processed reads").with_interval(1000));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        tracker.log_if_needed(1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(tracker.count(), 2000);
    }
}

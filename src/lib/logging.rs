//! Logging utilities for formatted output.
//!
//! Count formatting, the end-of-run calling summary, and a small operation
//! timer for the CLI commands.

use std::time::Instant;

use crate::metrics::CallingMetrics;

/// Formats a count with thousands separators (e.g. "1,234,567").
#[must_use]
pub fn format_count(count: u64) -> String {
    let digits = count.to_string();
    let mut result = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// Logs the end-of-run calling summary.
pub fn log_calling_summary(metrics: &CallingMetrics) {
    log::info!("Calling Summary:");
    log::info!("  Regions processed: {}", format_count(metrics.regions_processed));
    if metrics.regions_cancelled > 0 {
        log::info!("  Regions cancelled: {}", format_count(metrics.regions_cancelled));
    }
    if metrics.regions_failed > 0 {
        log::warn!("  Regions failed: {}", format_count(metrics.regions_failed));
    }
    log::info!("  Germline calls: {}", format_count(metrics.germline_calls));
    log::info!("  De novo calls: {}", format_count(metrics.denovo_calls));
    if metrics.short_haplotype_retries > 0 {
        log::info!(
            "  Haplotype expansion retries: {}",
            format_count(metrics.short_haplotype_retries)
        );
    }
}

/// Logs an operation's start on creation, then a one-line completion
/// summary with the observed throughput.
pub struct OperationTimer {
    operation: String,
    start_time: Instant,
}

impl OperationTimer {
    /// Creates a new operation timer and logs the start.
    #[must_use]
    pub fn new(operation: &str) -> Self {
        log::info!("{operation} ...");
        Self { operation: operation.to_string(), start_time: Instant::now() }
    }

    /// Logs the completion with item count and rate.
    pub fn log_completion(&self, count: u64) {
        let secs = self.start_time.elapsed().as_secs_f64();
        if secs < 1e-3 {
            log::info!("{} finished: {}", self.operation, format_count(count));
        } else {
            log::info!(
                "{} finished: {} in {:.1}s ({:.0} items/s)",
                self.operation,
                format_count(count),
                secs,
                count as f64 / secs
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(1_234_567), "1,234,567");
    }

    #[test]
    fn test_log_calling_summary() {
        log_calling_summary(&CallingMetrics::new());
        let metrics = CallingMetrics {
            regions_processed: 100,
            regions_failed: 1,
            germline_calls: 40,
            denovo_calls: 2,
            short_haplotype_retries: 3,
            ..CallingMetrics::default()
        };
        log_calling_summary(&metrics);
    }

    #[test]
    fn test_operation_timer() {
        let timer = OperationTimer::new("Test");
        timer.log_completion(1000);
        // Hit the timed branch too
        std::thread::sleep(std::time::Duration::from_millis(5));
        timer.log_completion(1000);
    }
}

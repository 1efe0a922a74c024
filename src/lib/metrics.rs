//! Structured metrics for a calling run.

use serde::Serialize;

/// Counters accumulated over one calling run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CallingMetrics {
    /// Calling regions fully processed
    pub regions_processed: u64,
    /// Regions abandoned due to cancellation
    pub regions_cancelled: u64,
    /// Regions aborted by an unrecoverable error
    pub regions_failed: u64,
    /// Germline variant calls emitted
    pub germline_calls: u64,
    /// De novo calls emitted
    pub denovo_calls: u64,
    /// Haplotype expand-and-retry rounds triggered by short haplotypes
    pub short_haplotype_retries: u64,
}

impl CallingMetrics {
    /// Creates zeroed metrics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total calls of any kind.
    #[must_use]
    pub fn total_calls(&self) -> u64 {
        self.germline_calls + self.denovo_calls
    }

    /// Folds another run's counters into this one.
    pub fn merge(&mut self, other: &CallingMetrics) {
        self.regions_processed += other.regions_processed;
        self.regions_cancelled += other.regions_cancelled;
        self.regions_failed += other.regions_failed;
        self.germline_calls += other.germline_calls;
        self.denovo_calls += other.denovo_calls;
        self.short_haplotype_retries += other.short_haplotype_retries;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_calls() {
        let metrics = CallingMetrics {
            germline_calls: 10,
            denovo_calls: 2,
            ..CallingMetrics::default()
        };
        assert_eq!(metrics.total_calls(), 12);
    }

    #[test]
    fn test_merge() {
        let mut a = CallingMetrics {
            regions_processed: 5,
            germline_calls: 3,
            ..CallingMetrics::default()
        };
        let b = CallingMetrics {
            regions_processed: 2,
            denovo_calls: 1,
            short_haplotype_retries: 4,
            ..CallingMetrics::default()
        };
        a.merge(&b);
        assert_eq!(a.regions_processed, 7);
        assert_eq!(a.germline_calls, 3);
        assert_eq!(a.denovo_calls, 1);
        assert_eq!(a.short_haplotype_retries, 4);
    }

}

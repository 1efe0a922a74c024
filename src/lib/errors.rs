//! Custom error types for triocall operations.

use thiserror::Error;

/// Result type alias for triocall operations
pub type Result<T> = std::result::Result<T, TriocallError>;

/// Error type for triocall operations
#[derive(Error, Debug)]
pub enum TriocallError {
    /// The buffered haplotype cannot contain the read even after the maximal
    /// lateral shift of the alignment window. Recoverable: the caller expands
    /// the haplotype by at least `required_extension` bases and retries.
    #[error("Haplotype over {region} is too short for alignment (needs {required_extension} more bases)")]
    ShortHaplotype {
        /// Region of the haplotype that was too short
        region: String,
        /// Minimum number of bases the haplotype must be extended by
        required_extension: u32,
    },

    /// Regions on different contigs were mixed in a single operation
    #[error("Contig mismatch: '{lhs}' vs '{rhs}'")]
    DomainError {
        /// Contig name of the left operand
        lhs: String,
        /// Contig name of the right operand
        rhs: String,
    },

    /// An internal invariant was violated
    #[error("Logic error in {context}: {reason}")]
    LogicError {
        /// The operation that detected the violation
        context: &'static str,
        /// Explanation of the violated invariant
        reason: String,
    },

    /// `evaluate`/`align` was called before `reset` buffered a haplotype
    #[error("No haplotype buffered: call reset() before evaluate()/align()")]
    MissingHaplotype,

    /// A call type has no registered annotation routine
    #[error("Call type '{call_type}' is not in the annotator registry")]
    UnregisteredCallType {
        /// Name of the unregistered call type
        call_type: String,
    },

    /// A sub-region query fell outside the queried object's region
    #[error("Region [{begin}, {end}) is not contained by [{outer_begin}, {outer_end})")]
    OutOfRange {
        /// Begin of the requested sub-region
        begin: u64,
        /// End of the requested sub-region
        end: u64,
        /// Begin of the containing region
        outer_begin: u64,
        /// End of the containing region
        outer_end: u64,
    },

    /// Invalid parameter value provided
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// The parameter name
        parameter: String,
        /// Explanation of why it's invalid
        reason: String,
    },

    /// Required contig not found in the reference
    #[error("Reference contig '{contig}' not found")]
    ContigNotFound {
        /// The contig name
        contig: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_haplotype_message() {
        let error = TriocallError::ShortHaplotype {
            region: "chr1:100-200".to_string(),
            required_extension: 7,
        };
        let msg = format!("{error}");
        assert!(msg.contains("chr1:100-200"));
        assert!(msg.contains("7 more bases"));
    }

    #[test]
    fn test_domain_error_message() {
        let error =
            TriocallError::DomainError { lhs: "chr1".to_string(), rhs: "chr2".to_string() };
        let msg = format!("{error}");
        assert!(msg.contains("chr1"));
        assert!(msg.contains("chr2"));
    }

    #[test]
    fn test_out_of_range_message() {
        let error =
            TriocallError::OutOfRange { begin: 5, end: 20, outer_begin: 0, outer_end: 12 };
        let msg = format!("{error}");
        assert!(msg.contains("[5, 20)"));
        assert!(msg.contains("[0, 12)"));
    }

    #[test]
    fn test_unregistered_call_type_message() {
        let error =
            TriocallError::UnregisteredCallType { call_type: "CellVariant".to_string() };
        assert!(format!("{error}").contains("CellVariant"));
    }
}

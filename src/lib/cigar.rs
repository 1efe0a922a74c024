//! CIGAR string representation for read and haplotype alignments.
//!
//! Supports the full SAM op alphabet {M, I, D, N, S, H, P, =, X} with
//! parse/format round-tripping and the query/reference length accounting the
//! likelihood layer needs to place a read inside a haplotype.

use std::fmt;
use std::str::FromStr;

use crate::errors::{Result, TriocallError};

/// A single CIGAR operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CigarOpKind {
    /// Alignment match or mismatch (M)
    AlignMatch,
    /// Insertion to the reference (I)
    Insertion,
    /// Deletion from the reference (D)
    Deletion,
    /// Skipped region from the reference (N)
    Skip,
    /// Soft clipping (S)
    SoftClip,
    /// Hard clipping (H)
    HardClip,
    /// Padding (P)
    Padding,
    /// Sequence match (=)
    SequenceMatch,
    /// Sequence mismatch (X)
    SequenceMismatch,
}

impl CigarOpKind {
    /// True iff the op consumes query (read) bases.
    #[must_use]
    pub fn consumes_query(self) -> bool {
        matches!(
            self,
            Self::AlignMatch
                | Self::Insertion
                | Self::SoftClip
                | Self::SequenceMatch
                | Self::SequenceMismatch
        )
    }

    /// True iff the op consumes reference bases.
    #[must_use]
    pub fn consumes_reference(self) -> bool {
        matches!(
            self,
            Self::AlignMatch
                | Self::Deletion
                | Self::Skip
                | Self::SequenceMatch
                | Self::SequenceMismatch
        )
    }

    /// The SAM character for this op.
    #[must_use]
    pub fn to_char(self) -> char {
        match self {
            Self::AlignMatch => 'M',
            Self::Insertion => 'I',
            Self::Deletion => 'D',
            Self::Skip => 'N',
            Self::SoftClip => 'S',
            Self::HardClip => 'H',
            Self::Padding => 'P',
            Self::SequenceMatch => '=',
            Self::SequenceMismatch => 'X',
        }
    }

    /// Parses a SAM op character.
    pub fn from_char(c: char) -> Result<Self> {
        match c {
            'M' => Ok(Self::AlignMatch),
            'I' => Ok(Self::Insertion),
            'D' => Ok(Self::Deletion),
            'N' => Ok(Self::Skip),
            'S' => Ok(Self::SoftClip),
            'H' => Ok(Self::HardClip),
            'P' => Ok(Self::Padding),
            '=' => Ok(Self::SequenceMatch),
            'X' => Ok(Self::SequenceMismatch),
            other => Err(TriocallError::InvalidParameter {
                parameter: "cigar".to_string(),
                reason: format!("unknown CIGAR op '{other}'"),
            }),
        }
    }
}

/// A run-length-encoded CIGAR operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CigarOp {
    /// Run length of the operation
    pub len: u32,
    /// Operation kind
    pub kind: CigarOpKind,
}

impl CigarOp {
    /// Creates a new op.
    #[must_use]
    pub fn new(len: u32, kind: CigarOpKind) -> Self {
        Self { len, kind }
    }
}

impl fmt::Display for CigarOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.len, self.kind.to_char())
    }
}

/// A full CIGAR string: an ordered run of operations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CigarString(pub Vec<CigarOp>);

impl CigarString {
    /// Creates a CIGAR from ops, merging adjacent runs of the same kind.
    #[must_use]
    pub fn from_ops(ops: Vec<CigarOp>) -> Self {
        let mut merged: Vec<CigarOp> = Vec::with_capacity(ops.len());
        for op in ops {
            if op.len == 0 {
                continue;
            }
            match merged.last_mut() {
                Some(last) if last.kind == op.kind => last.len += op.len,
                _ => merged.push(op),
            }
        }
        Self(merged)
    }

    /// The operations in order.
    #[must_use]
    pub fn ops(&self) -> &[CigarOp] {
        &self.0
    }

    /// Total query (read) bases consumed.
    #[must_use]
    pub fn query_len(&self) -> u64 {
        self.0.iter().filter(|op| op.kind.consumes_query()).map(|op| u64::from(op.len)).sum()
    }

    /// Total reference bases consumed.
    #[must_use]
    pub fn reference_len(&self) -> u64 {
        self.0.iter().filter(|op| op.kind.consumes_reference()).map(|op| u64::from(op.len)).sum()
    }

    /// Leading soft-clip length, if any.
    #[must_use]
    pub fn leading_soft_clip(&self) -> u32 {
        match self.0.first() {
            Some(op) if op.kind == CigarOpKind::SoftClip => op.len,
            _ => 0,
        }
    }

    /// Trailing soft-clip length, if any.
    #[must_use]
    pub fn trailing_soft_clip(&self) -> u32 {
        match self.0.last() {
            Some(op) if op.kind == CigarOpKind::SoftClip => op.len,
            _ => 0,
        }
    }
}

impl fmt::Display for CigarString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "*");
        }
        for op in &self.0 {
            write!(f, "{op}")?;
        }
        Ok(())
    }
}

impl FromStr for CigarString {
    type Err = TriocallError;

    fn from_str(s: &str) -> Result<Self> {
        if s == "*" {
            return Ok(Self::default());
        }
        let mut ops = Vec::new();
        let mut len: u32 = 0;
        let mut saw_digit = false;
        for c in s.chars() {
            if let Some(d) = c.to_digit(10) {
                len = len * 10 + d;
                saw_digit = true;
            } else {
                if !saw_digit {
                    return Err(TriocallError::InvalidParameter {
                        parameter: "cigar".to_string(),
                        reason: format!("op '{c}' without a length in '{s}'"),
                    });
                }
                ops.push(CigarOp::new(len, CigarOpKind::from_char(c)?));
                len = 0;
                saw_digit = false;
            }
        }
        if saw_digit {
            return Err(TriocallError::InvalidParameter {
                parameter: "cigar".to_string(),
                reason: format!("trailing length without an op in '{s}'"),
            });
        }
        Ok(Self(ops))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display_round_trip() {
        for s in ["4=", "10M", "3S5M2I4M1D6M2S", "5H10M5H", "2=1X2=", "*"] {
            let cigar: CigarString = s.parse().unwrap();
            assert_eq!(cigar.to_string(), s);
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("M".parse::<CigarString>().is_err());
        assert!("10".parse::<CigarString>().is_err());
        assert!("5Q".parse::<CigarString>().is_err());
    }

    #[test]
    fn test_lengths() {
        let cigar: CigarString = "3S5M2I4M1D6M".parse().unwrap();
        assert_eq!(cigar.query_len(), 20);
        assert_eq!(cigar.reference_len(), 16);
        assert_eq!(cigar.leading_soft_clip(), 3);
        assert_eq!(cigar.trailing_soft_clip(), 0);
    }

    #[test]
    fn test_from_ops_merges_runs() {
        let cigar = CigarString::from_ops(vec![
            CigarOp::new(2, CigarOpKind::SequenceMatch),
            CigarOp::new(3, CigarOpKind::SequenceMatch),
            CigarOp::new(0, CigarOpKind::Insertion),
            CigarOp::new(1, CigarOpKind::SequenceMismatch),
        ]);
        assert_eq!(cigar.to_string(), "5=1X");
    }

    #[test]
    fn test_consumption_flags() {
        assert!(CigarOpKind::Insertion.consumes_query());
        assert!(!CigarOpKind::Insertion.consumes_reference());
        assert!(CigarOpKind::Deletion.consumes_reference());
        assert!(!CigarOpKind::Deletion.consumes_query());
        assert!(!CigarOpKind::HardClip.consumes_query());
        assert!(!CigarOpKind::Padding.consumes_reference());
    }
}

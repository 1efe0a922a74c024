//! Allele and variant types.
//!
//! An [`Allele`] is a (region, sequence) pair local to a contig: reference
//! alleles carry the reference bases over their region, insertions have an
//! empty region and non-empty sequence, deletions the reverse. A
//! [`Variant`] pairs the reference and alternative sequences over one
//! genomic region.

use std::cmp::Ordering;
use std::fmt;

use bstr::BStr;

use crate::region::{ContigRegion, GenomicRegion};

/// A contig-local allele: a half-open region plus replacement sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Allele {
    region: ContigRegion,
    sequence: Vec<u8>,
}

impl Allele {
    /// Creates an allele over `region` asserting `sequence`.
    #[must_use]
    pub fn new(region: ContigRegion, sequence: impl Into<Vec<u8>>) -> Self {
        Self { region, sequence: sequence.into() }
    }

    /// The region this allele replaces.
    #[inline]
    #[must_use]
    pub fn region(&self) -> &ContigRegion {
        &self.region
    }

    /// The replacement sequence.
    #[inline]
    #[must_use]
    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }

    /// True iff the allele adds bases without consuming reference.
    #[inline]
    #[must_use]
    pub fn is_insertion(&self) -> bool {
        self.region.is_empty() && !self.sequence.is_empty()
    }

    /// True iff the allele removes reference bases.
    #[inline]
    #[must_use]
    pub fn is_deletion(&self) -> bool {
        !self.region.is_empty() && self.sequence.is_empty()
    }

    /// True iff the allele changes sequence length.
    #[inline]
    #[must_use]
    pub fn is_indel(&self) -> bool {
        self.region.size() != self.sequence.len() as u64
    }

    /// Signed change in sequence length this allele introduces.
    #[inline]
    #[must_use]
    pub fn indel_balance(&self) -> i64 {
        self.sequence.len() as i64 - self.region.size() as i64
    }

    /// The sub-allele over `sub`, which must be contained in this allele's
    /// region. Only meaningful for non-insertion alleles whose sequence
    /// consumes their region one-to-one.
    #[must_use]
    pub fn splice(&self, sub: &ContigRegion) -> Allele {
        debug_assert!(self.region.contains(sub));
        if self.is_insertion() {
            return self.clone();
        }
        let offset = (sub.begin() - self.region.begin()) as usize;
        let len = sub.size() as usize;
        let end = (offset + len).min(self.sequence.len());
        Allele::new(*sub, self.sequence[offset.min(self.sequence.len())..end].to_vec())
    }
}

impl fmt::Display for Allele {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.region, BStr::new(&self.sequence))
    }
}

impl PartialOrd for Allele {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Allele {
    fn cmp(&self, other: &Self) -> Ordering {
        self.region.cmp(&other.region).then_with(|| self.sequence.cmp(&other.sequence))
    }
}

/// A reference/alternative allele pair over one genomic region.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Variant {
    region: GenomicRegion,
    ref_sequence: Vec<u8>,
    alt_sequence: Vec<u8>,
}

impl Variant {
    /// Creates a variant replacing `ref_sequence` with `alt_sequence` over `region`.
    #[must_use]
    pub fn new(
        region: GenomicRegion,
        ref_sequence: impl Into<Vec<u8>>,
        alt_sequence: impl Into<Vec<u8>>,
    ) -> Self {
        Self { region, ref_sequence: ref_sequence.into(), alt_sequence: alt_sequence.into() }
    }

    /// The variant's region.
    #[inline]
    #[must_use]
    pub fn region(&self) -> &GenomicRegion {
        &self.region
    }

    /// The reference sequence over the region.
    #[inline]
    #[must_use]
    pub fn ref_sequence(&self) -> &[u8] {
        &self.ref_sequence
    }

    /// The alternative sequence.
    #[inline]
    #[must_use]
    pub fn alt_sequence(&self) -> &[u8] {
        &self.alt_sequence
    }

    /// The reference allele of this variant, contig-local.
    #[must_use]
    pub fn ref_allele(&self) -> Allele {
        Allele::new(*self.region.contig_region(), self.ref_sequence.clone())
    }

    /// The alternative allele of this variant, contig-local.
    #[must_use]
    pub fn alt_allele(&self) -> Allele {
        Allele::new(*self.region.contig_region(), self.alt_sequence.clone())
    }

    /// The mirror variant with reference and alternative swapped.
    #[must_use]
    pub fn reversed(&self) -> Variant {
        Variant::new(self.region.clone(), self.alt_sequence.clone(), self.ref_sequence.clone())
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}>{}",
            self.region,
            BStr::new(&self.ref_sequence),
            BStr::new(&self.alt_sequence)
        )
    }
}

impl PartialOrd for Variant {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Variant {
    fn cmp(&self, other: &Self) -> Ordering {
        self.region
            .cmp(&other.region)
            .then_with(|| self.ref_sequence.cmp(&other.ref_sequence))
            .then_with(|| self.alt_sequence.cmp(&other.alt_sequence))
    }
}

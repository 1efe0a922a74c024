//! Aligned sequencing read representation.
//!
//! [`AlignedRead`] carries everything the likelihood layer needs: mapped
//! region, sequence, per-base qualities, CIGAR, mapping quality, the SAM-like
//! flag set, the optional mate segment, and the read group. The mate's
//! inferred template length is stored signed, as the SAM specification
//! permits negative values for the rightmost read of a pair.

use crate::cigar::CigarString;
use crate::region::GenomicRegion;

/// SAM-like per-read flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadFlags {
    /// Template has multiple segments
    pub multiple_segments: bool,
    /// All segments in the template are properly aligned
    pub all_segments_aligned: bool,
    /// Read is unmapped
    pub unmapped: bool,
    /// Read is mapped to the reverse strand
    pub reverse_mapped: bool,
    /// Secondary alignment
    pub secondary: bool,
    /// Did not pass quality control
    pub qc_fail: bool,
    /// PCR or optical duplicate
    pub duplicate: bool,
    /// Supplementary alignment
    pub supplementary: bool,
}

/// The mate segment of a paired read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Contig the mate is mapped to
    pub contig: String,
    /// Mate's mapped begin position
    pub begin: u64,
    /// Inferred template length; negative for the rightmost segment
    pub inferred_template_length: i64,
    /// Mate is unmapped
    pub unmapped: bool,
    /// Mate is reverse-strand mapped
    pub reverse_mapped: bool,
}

/// An aligned sequencing read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedRead {
    name: String,
    region: GenomicRegion,
    sequence: Vec<u8>,
    qualities: Vec<u8>,
    cigar: CigarString,
    mapping_quality: u8,
    flags: ReadFlags,
    next_segment: Option<Segment>,
    read_group: String,
}

impl AlignedRead {
    /// The read name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The mapped region (aligned span on the reference).
    #[must_use]
    pub fn region(&self) -> &GenomicRegion {
        &self.region
    }

    /// The read's nucleotide sequence.
    #[must_use]
    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }

    /// Per-base Phred qualities, same length as the sequence.
    #[must_use]
    pub fn qualities(&self) -> &[u8] {
        &self.qualities
    }

    /// The alignment CIGAR.
    #[must_use]
    pub fn cigar(&self) -> &CigarString {
        &self.cigar
    }

    /// Phred-scale mapping quality.
    #[must_use]
    pub fn mapping_quality(&self) -> u8 {
        self.mapping_quality
    }

    /// The SAM-like flag set.
    #[must_use]
    pub fn flags(&self) -> &ReadFlags {
        &self.flags
    }

    /// True iff mapped to the reverse strand.
    #[must_use]
    pub fn is_reverse_mapped(&self) -> bool {
        self.flags.reverse_mapped
    }

    /// The mate segment, if the template has one.
    #[must_use]
    pub fn next_segment(&self) -> Option<&Segment> {
        self.next_segment.as_ref()
    }

    /// The read group identifier.
    #[must_use]
    pub fn read_group(&self) -> &str {
        &self.read_group
    }

    /// Read length in bases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    /// True iff the read has no bases.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

/// Builder for [`AlignedRead`], primarily for constructing reads in tests
/// and at the read-source boundary.
#[derive(Debug, Clone)]
pub struct AlignedReadBuilder {
    name: String,
    region: GenomicRegion,
    sequence: Vec<u8>,
    qualities: Option<Vec<u8>>,
    cigar: Option<CigarString>,
    mapping_quality: u8,
    flags: ReadFlags,
    next_segment: Option<Segment>,
    read_group: String,
}

impl AlignedReadBuilder {
    /// Starts a builder for a read mapped at `region` with `sequence`.
    #[must_use]
    pub fn new(region: GenomicRegion, sequence: impl Into<Vec<u8>>) -> Self {
        Self {
            name: "read".to_string(),
            region,
            sequence: sequence.into(),
            qualities: None,
            cigar: None,
            mapping_quality: 60,
            flags: ReadFlags::default(),
            next_segment: None,
            read_group: "A".to_string(),
        }
    }

    /// Sets the read name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets per-base qualities (must match the sequence length).
    #[must_use]
    pub fn qualities(mut self, qualities: impl Into<Vec<u8>>) -> Self {
        self.qualities = Some(qualities.into());
        self
    }

    /// Sets a uniform per-base quality.
    #[must_use]
    pub fn uniform_quality(mut self, quality: u8) -> Self {
        self.qualities = Some(vec![quality; self.sequence.len()]);
        self
    }

    /// Sets the CIGAR. Defaults to a full-length `=` run.
    #[must_use]
    pub fn cigar(mut self, cigar: CigarString) -> Self {
        self.cigar = Some(cigar);
        self
    }

    /// Sets the mapping quality.
    #[must_use]
    pub fn mapping_quality(mut self, mapping_quality: u8) -> Self {
        self.mapping_quality = mapping_quality;
        self
    }

    /// Sets the flag set.
    #[must_use]
    pub fn flags(mut self, flags: ReadFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Marks the read reverse-strand mapped.
    #[must_use]
    pub fn reverse_mapped(mut self) -> Self {
        self.flags.reverse_mapped = true;
        self
    }

    /// Attaches the mate segment.
    #[must_use]
    pub fn next_segment(mut self, segment: Segment) -> Self {
        self.flags.multiple_segments = true;
        self.next_segment = Some(segment);
        self
    }

    /// Sets the read group.
    #[must_use]
    pub fn read_group(mut self, read_group: impl Into<String>) -> Self {
        self.read_group = read_group.into();
        self
    }

    /// Finalizes the read.
    ///
    /// # Panics
    /// Panics if explicit qualities don't match the sequence length; the
    /// builder is a construction-time API and length mismatch is a
    /// programming error.
    #[must_use]
    pub fn build(self) -> AlignedRead {
        let qualities =
            self.qualities.unwrap_or_else(|| vec![30; self.sequence.len()]);
        assert_eq!(
            qualities.len(),
            self.sequence.len(),
            "AlignedRead: quality and sequence length mismatch"
        );
        let cigar = self.cigar.unwrap_or_else(|| {
            format!("{}=", self.sequence.len()).parse().expect("valid default cigar")
        });
        AlignedRead {
            name: self.name,
            region: self.region,
            sequence: self.sequence,
            qualities,
            cigar,
            mapping_quality: self.mapping_quality,
            flags: self.flags,
            next_segment: self.next_segment,
            read_group: self.read_group,
        }
    }
}

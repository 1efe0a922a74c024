//! Haplotype construction and queries.
//!
//! A [`Haplotype`] is a candidate local sequence over a genomic region: an
//! ordered, non-overlapping set of explicit alleles laid over reference
//! flanks, with the full nucleotide sequence materialized once at build time.
//! Haplotypes are immutable after construction; equality and ordering use
//! `(region, sequence)` only, so two haplotypes with different allele
//! decompositions but the same rendered sequence compare equal (see
//! [`have_same_alleles`] for the stricter predicate and
//! [`unique_least_complex`] for de-duplication that keeps the simplest
//! decomposition).
//!
//! Coordinate convention for zero-length (insertion) alleles: an insertion
//! anchored at position `p` renders immediately before the reference base at
//! `p`. A sub-region query `[a, b)` therefore includes the insertion iff
//! `a <= p < b`, and an empty query `[p, p)` yields exactly the insertion.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::fmt;
use std::hash::{BuildHasher, Hash, Hasher};

use ahash::RandomState;
use bstr::BStr;

use crate::allele::{Allele, Variant};
use crate::errors::{Result, TriocallError};
use crate::reference::ReferenceGenome;
use crate::region::{ContigRegion, GenomicRegion};

/// Fixed seeds so haplotype hashes are stable across threads and runs.
const HASH_STATE: RandomState = RandomState::with_seeds(
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
);

/// A candidate local sequence: region + explicit alleles + rendered bases.
#[derive(Debug, Clone)]
pub struct Haplotype {
    region: GenomicRegion,
    explicit_alleles: Vec<Allele>,
    explicit_region: Option<ContigRegion>,
    sequence: Vec<u8>,
    cached_hash: u64,
}

impl Haplotype {
    fn from_parts(
        region: GenomicRegion,
        explicit_alleles: Vec<Allele>,
        sequence: Vec<u8>,
    ) -> Self {
        let explicit_region = match (explicit_alleles.first(), explicit_alleles.last()) {
            (Some(first), Some(last)) => {
                Some(first.region().encompassing_region(last.region()))
            }
            _ => None,
        };
        let mut hasher = HASH_STATE.build_hasher();
        region.hash(&mut hasher);
        sequence.hash(&mut hasher);
        let cached_hash = hasher.finish();
        Self { region, explicit_alleles, explicit_region, sequence, cached_hash }
    }

    /// The region this haplotype represents.
    #[inline]
    #[must_use]
    pub fn region(&self) -> &GenomicRegion {
        &self.region
    }

    /// The explicit (asserted) alleles, sorted and non-overlapping.
    #[inline]
    #[must_use]
    pub fn explicit_alleles(&self) -> &[Allele] {
        &self.explicit_alleles
    }

    /// Envelope of the first and last explicit allele, if any.
    #[inline]
    #[must_use]
    pub fn explicit_region(&self) -> Option<&ContigRegion> {
        self.explicit_region.as_ref()
    }

    /// The fully materialized nucleotide sequence over `region`.
    #[inline]
    #[must_use]
    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }

    /// Number of bases in the rendered sequence.
    #[inline]
    #[must_use]
    pub fn sequence_len(&self) -> usize {
        self.sequence.len()
    }

    /// The hash computed at construction.
    #[inline]
    #[must_use]
    pub fn cached_hash(&self) -> u64 {
        self.cached_hash
    }

    /// True iff an allele participates in queries over `sub` (see the module
    /// docs for the insertion anchoring convention).
    fn allele_in_range(allele: &Allele, sub: &ContigRegion) -> bool {
        let ar = allele.region();
        if sub.is_empty() {
            ar.is_empty() && ar.begin() == sub.begin()
        } else if ar.is_empty() {
            sub.begin() <= ar.begin() && ar.begin() < sub.end()
        } else {
            ar.begin() < sub.end() && sub.begin() < ar.end()
        }
    }

    fn overlapping_alleles(&self, sub: &ContigRegion) -> &[Allele] {
        let first = self
            .explicit_alleles
            .iter()
            .position(|a| Self::allele_in_range(a, sub));
        let Some(first) = first else { return &[] };
        let count = self.explicit_alleles[first..]
            .iter()
            .take_while(|a| Self::allele_in_range(a, sub))
            .count();
        &self.explicit_alleles[first..first + count]
    }

    /// Slices reference bases from the rendered sequence for a sub-region
    /// lying entirely in a reference flank. Left-flank regions are offset
    /// from the front; right-flank regions from the back, since indels in the
    /// explicit region shift absolute coordinates.
    fn reference_flank_slice(&self, sub: &ContigRegion) -> &[u8] {
        let own = self.region.contig_region();
        let in_left_flank = match &self.explicit_region {
            Some(explicit) => sub.end() <= explicit.begin(),
            None => true,
        };
        if in_left_flank {
            let offset = (sub.begin() - own.begin()) as usize;
            &self.sequence[offset..offset + sub.size() as usize]
        } else {
            let from_end = (own.end() - sub.begin()) as usize;
            let start = self.sequence.len() - from_end;
            &self.sequence[start..start + sub.size() as usize]
        }
    }

    /// The haplotype's rendered sequence over `sub ⊆ region`.
    ///
    /// For sub-regions disjoint from the explicit region this is pure
    /// reference; otherwise reference flanks are stitched around the
    /// (possibly boundary-spliced) explicit alleles.
    ///
    /// # Errors
    /// [`TriocallError::OutOfRange`] if `sub` is not contained in the
    /// haplotype's region.
    pub fn sequence_of(&self, sub: &ContigRegion) -> Result<Vec<u8>> {
        let own = self.region.contig_region();
        if !own.contains(sub) {
            return Err(TriocallError::OutOfRange {
                begin: sub.begin(),
                end: sub.end(),
                outer_begin: own.begin(),
                outer_end: own.end(),
            });
        }
        if self.explicit_alleles.is_empty() {
            let offset = (sub.begin() - own.begin()) as usize;
            return Ok(self.sequence[offset..offset + sub.size() as usize].to_vec());
        }
        if sub.is_empty() {
            // An empty query renders the insertion anchored there, if any
            let overlapped = self.overlapping_alleles(sub);
            return Ok(overlapped.first().map(|a| a.sequence().to_vec()).unwrap_or_default());
        }
        let overlapped = self.overlapping_alleles(sub);
        if overlapped.is_empty() {
            return Ok(self.reference_flank_slice(sub).to_vec());
        }

        let mut result = Vec::with_capacity(sub.size() as usize);
        let first = &overlapped[0];
        if sub.begin() < first.region().begin() {
            let lead = ContigRegion::new(sub.begin(), first.region().begin());
            result.extend_from_slice(self.reference_flank_slice(&lead));
        }
        let last_index = overlapped.len() - 1;
        for (i, allele) in overlapped.iter().enumerate() {
            if allele.region().is_empty() || sub.contains(allele.region()) {
                result.extend_from_slice(allele.sequence());
            } else {
                // Boundary allele only partially inside the query
                let part = allele.region().overlapped_region(sub);
                debug_assert!(i == 0 || i == last_index);
                result.extend_from_slice(allele.splice(&part).sequence());
            }
        }
        let last = &overlapped[last_index];
        if last.region().end() < sub.end() {
            let tail = ContigRegion::new(last.region().end().max(sub.begin()), sub.end());
            result.extend_from_slice(self.reference_flank_slice(&tail));
        }
        Ok(result)
    }

    /// True iff this haplotype asserts `allele`: either it is one of the
    /// explicit alleles, or the haplotype's rendering of the allele's region
    /// equals the allele's sequence. Insertions match only explicit
    /// insertions at the same locus.
    #[must_use]
    pub fn contains(&self, allele: &Allele) -> bool {
        if !self.region.contig_region().contains(allele.region()) {
            return false;
        }
        if allele.is_insertion() {
            return self
                .explicit_alleles
                .iter()
                .any(|e| e.region() == allele.region() && e.sequence() == allele.sequence());
        }
        match self.sequence_of(allele.region()) {
            Ok(rendered) => rendered == allele.sequence(),
            Err(_) => false,
        }
    }

    /// Stricter containment: `allele` must be an explicit allele, or a
    /// reference allele lying wholly in a non-indel flank.
    #[must_use]
    pub fn includes(&self, allele: &Allele) -> bool {
        if !self.region.contig_region().contains(allele.region()) {
            return false;
        }
        if let Some(explicit) = &self.explicit_region {
            if explicit.contains(allele.region()) {
                return self.explicit_alleles.binary_search(allele).is_ok();
            }
            if explicit.overlaps(allele.region()) || allele.is_indel() {
                return false;
            }
        } else if allele.is_indel() {
            return false;
        }
        match self.sequence_of(allele.region()) {
            Ok(rendered) => rendered == allele.sequence(),
            Err(_) => false,
        }
    }

    /// Variants asserted by `self` but not contained in `other`, expressed
    /// against `other`'s rendering of each differing region.
    ///
    /// # Errors
    /// [`TriocallError::OutOfRange`] if an explicit allele of `self` falls
    /// outside `other`'s region.
    pub fn difference(&self, other: &Haplotype) -> Result<Vec<Variant>> {
        let mut result = Vec::with_capacity(self.explicit_alleles.len());
        for allele in &self.explicit_alleles {
            if !other.contains(allele) {
                let region =
                    GenomicRegion::from_contig_region(self.region.contig(), *allele.region());
                let ref_sequence = other.sequence_of(allele.region())?;
                result.push(Variant::new(region, ref_sequence, allele.sequence().to_vec()));
            }
        }
        Ok(result)
    }

    /// The sub-haplotype over `sub`, carrying fully contained explicit
    /// alleles, left/right-partial splices at the boundaries, and zero-length
    /// insertions per the module's anchoring convention.
    ///
    /// # Errors
    /// [`TriocallError::DomainError`] for a different contig;
    /// [`TriocallError::OutOfRange`] if `sub` is not contained.
    pub fn splice(&self, sub: &GenomicRegion) -> Result<Haplotype> {
        if !self.region.is_same_contig(sub) {
            return Err(TriocallError::DomainError {
                lhs: self.region.contig().to_string(),
                rhs: sub.contig().to_string(),
            });
        }
        let sub_region = sub.contig_region();
        let own = self.region.contig_region();
        if !own.contains(sub_region) {
            return Err(TriocallError::OutOfRange {
                begin: sub_region.begin(),
                end: sub_region.end(),
                outer_begin: own.begin(),
                outer_end: own.end(),
            });
        }
        if sub_region == own {
            return Ok(self.clone());
        }
        let sequence = self.sequence_of(sub_region)?;
        if self.explicit_alleles.is_empty() {
            return Ok(Haplotype::from_parts(sub.clone(), Vec::new(), sequence));
        }
        if sub_region.is_empty() {
            // An empty splice keeps the insertion anchored here, or asserts
            // an explicitly empty allele when there is none.
            let overlapped = self.overlapping_alleles(sub_region);
            let alleles = match overlapped.first() {
                Some(insertion) => vec![insertion.clone()],
                None => vec![Allele::new(*sub_region, Vec::new())],
            };
            return Ok(Haplotype::from_parts(sub.clone(), alleles, sequence));
        }
        let overlapped = self.overlapping_alleles(sub_region);
        let mut alleles = Vec::with_capacity(overlapped.len());
        let last_index = overlapped.len().saturating_sub(1);
        for (i, allele) in overlapped.iter().enumerate() {
            if allele.region().is_empty() || sub_region.contains(allele.region()) {
                alleles.push(allele.clone());
            } else {
                let part = allele.region().overlapped_region(sub_region);
                debug_assert!(i == 0 || i == last_index);
                alleles.push(allele.splice(&part));
            }
        }
        Ok(Haplotype::from_parts(sub.clone(), alleles, sequence))
    }

    /// Rebuilds the haplotype over a region grown by `n` bases on each side,
    /// filling the new flanks from the reference. The left edge saturates at
    /// coordinate zero.
    pub fn expand<R: ReferenceGenome + ?Sized>(
        &self,
        n: u64,
        reference: &R,
    ) -> Result<Haplotype> {
        if n == 0 {
            return Ok(self.clone());
        }
        let expanded = self.region.expand(n as i64);
        let mut builder = HaplotypeBuilder::new(expanded, reference);
        for allele in &self.explicit_alleles {
            builder.push_back(allele.clone())?;
        }
        builder.build()
    }

    /// True iff this haplotype asserts nothing beyond the reference.
    pub fn is_reference<R: ReferenceGenome + ?Sized>(&self, reference: &R) -> Result<bool> {
        if self.explicit_alleles.is_empty() {
            return Ok(true);
        }
        Ok(self.sequence == reference.fetch_sequence(&self.region)?)
    }
}

impl PartialEq for Haplotype {
    fn eq(&self, other: &Self) -> bool {
        self.region == other.region && self.sequence == other.sequence
    }
}

impl Eq for Haplotype {}

impl PartialOrd for Haplotype {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Haplotype {
    fn cmp(&self, other: &Self) -> Ordering {
        self.region.cmp(&other.region).then_with(|| self.sequence.cmp(&other.sequence))
    }
}

impl Hash for Haplotype {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.cached_hash);
    }
}

impl fmt::Display for Haplotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.region, BStr::new(&self.sequence))
    }
}

/// True iff two haplotypes have identical explicit allele decompositions.
#[must_use]
pub fn have_same_alleles(lhs: &Haplotype, rhs: &Haplotype) -> bool {
    lhs.explicit_alleles == rhs.explicit_alleles
}

/// True iff two haplotypes render identically over `region`.
pub fn are_equal_in_region(
    lhs: &Haplotype,
    rhs: &Haplotype,
    region: &GenomicRegion,
) -> Result<bool> {
    Ok(lhs.splice(region)? == rhs.splice(region)?)
}

/// Complexity comparator used to pick a canonical representative among equal
/// haplotypes: fewer explicit alleles wins; ties break on the smaller
/// difference against the reference haplotype when one is supplied; the final
/// tie-break prefers the decomposition with fewer indels position-wise.
pub struct IsLessComplex {
    reference: Option<Haplotype>,
}

impl IsLessComplex {
    /// Creates the comparator, optionally against a reference haplotype.
    #[must_use]
    pub fn new(reference: Option<Haplotype>) -> Self {
        Self { reference }
    }

    /// True iff `lhs` is no more complex than `rhs`.
    #[must_use]
    pub fn is_less_complex(&self, lhs: &Haplotype, rhs: &Haplotype) -> bool {
        if lhs.explicit_alleles.len() != rhs.explicit_alleles.len() {
            return lhs.explicit_alleles.len() < rhs.explicit_alleles.len();
        }
        if let Some(reference) = &self.reference {
            if let (Ok(lhs_diff), Ok(rhs_diff)) =
                (lhs.difference(reference), rhs.difference(reference))
            {
                if lhs_diff.len() != rhs_diff.len() {
                    return lhs_diff.len() < rhs_diff.len();
                }
            }
        }
        let score: i32 = lhs
            .explicit_alleles
            .iter()
            .zip(&rhs.explicit_alleles)
            .map(|(l, r)| {
                if l == r {
                    0
                } else if l.is_indel() {
                    -i32::from(!r.is_indel())
                } else {
                    i32::from(r.is_indel())
                }
            })
            .sum();
        score >= 0
    }
}

/// Sorts and de-duplicates equal haplotypes, keeping the least complex
/// representative of each equal group. Returns the number removed.
pub fn unique_least_complex(
    haplotypes: &mut Vec<Haplotype>,
    reference: Option<Haplotype>,
) -> usize {
    let before = haplotypes.len();
    haplotypes.sort();
    let cmp = IsLessComplex::new(reference);
    let mut result: Vec<Haplotype> = Vec::with_capacity(before);
    for haplotype in haplotypes.drain(..) {
        match result.last_mut() {
            Some(kept) if *kept == haplotype => {
                if cmp.is_less_complex(&haplotype, kept) {
                    *kept = haplotype;
                }
            }
            _ => result.push(haplotype),
        }
    }
    *haplotypes = result;
    before - haplotypes.len()
}

/// Accumulates explicit alleles into a [`Haplotype`].
///
/// Pushes must be ordered (`push_back` strictly rightward, `push_front`
/// strictly leftward); a non-adjacent push fetches the intervening reference
/// interval and inserts it as an implicit reference allele, preserving the
/// non-overlap invariant. `build()` renders the sequence and caches the hash.
pub struct HaplotypeBuilder<'r, R: ReferenceGenome + ?Sized> {
    region: GenomicRegion,
    reference: &'r R,
    explicit_alleles: VecDeque<Allele>,
}

impl<'r, R: ReferenceGenome + ?Sized> HaplotypeBuilder<'r, R> {
    /// Starts a builder for a haplotype over `region`.
    pub fn new(region: GenomicRegion, reference: &'r R) -> Self {
        Self { region, reference, explicit_alleles: VecDeque::new() }
    }

    fn precedes(lhs: &ContigRegion, rhs: &ContigRegion) -> bool {
        // An insertion shares coordinates with its right neighbor, so the
        // ordering must accept begin == end boundaries without overlap.
        rhs.begin() >= lhs.end() && (rhs.begin() > lhs.begin() || rhs.end() > lhs.end())
    }

    fn intervening_reference_allele(
        &self,
        lhs: &ContigRegion,
        rhs: &ContigRegion,
    ) -> Result<Allele> {
        let gap = lhs.intervening_region(rhs);
        let sequence = self
            .reference
            .fetch_sequence(&GenomicRegion::from_contig_region(self.region.contig(), gap))?;
        Ok(Allele::new(gap, sequence))
    }

    /// Appends an allele after all current alleles.
    ///
    /// # Errors
    /// [`TriocallError::LogicError`] for an out-of-order push.
    pub fn push_back(&mut self, allele: Allele) -> Result<()> {
        if let Some(last) = self.explicit_alleles.back() {
            if !Self::precedes(last.region(), allele.region()) {
                return Err(TriocallError::LogicError {
                    context: "HaplotypeBuilder::push_back",
                    reason: format!(
                        "allele at {} is not after the previous allele at {}",
                        allele.region(),
                        last.region()
                    ),
                });
            }
            if !last.region().is_adjacent_to(allele.region()) {
                let filler =
                    self.intervening_reference_allele(last.region(), allele.region())?;
                self.explicit_alleles.push_back(filler);
            }
        }
        self.update_region(allele.region());
        self.explicit_alleles.push_back(allele);
        Ok(())
    }

    /// Prepends an allele before all current alleles.
    ///
    /// # Errors
    /// [`TriocallError::LogicError`] for an out-of-order push.
    pub fn push_front(&mut self, allele: Allele) -> Result<()> {
        if let Some(first) = self.explicit_alleles.front() {
            if !Self::precedes(allele.region(), first.region()) {
                return Err(TriocallError::LogicError {
                    context: "HaplotypeBuilder::push_front",
                    reason: format!(
                        "allele at {} is not before the first allele at {}",
                        allele.region(),
                        first.region()
                    ),
                });
            }
            if !allele.region().is_adjacent_to(first.region()) {
                let filler =
                    self.intervening_reference_allele(allele.region(), first.region())?;
                self.explicit_alleles.push_front(filler);
            }
        }
        self.update_region(allele.region());
        self.explicit_alleles.push_front(allele);
        Ok(())
    }

    fn update_region(&mut self, allele_region: &ContigRegion) {
        let new_region =
            self.region.contig_region().encompassing_region(allele_region);
        self.region = GenomicRegion::from_contig_region(self.region.contig(), new_region);
    }

    /// Renders the sequence and finalizes the haplotype.
    pub fn build(self) -> Result<Haplotype> {
        let region = self.region;
        let alleles: Vec<Allele> = self.explicit_alleles.into();
        let contig_region = *region.contig_region();
        let mut sequence = Vec::with_capacity(contig_region.size() as usize);
        match (alleles.first(), alleles.last()) {
            (Some(first), Some(last)) => {
                let lead = ContigRegion::new(contig_region.begin(), first.region().begin());
                sequence.extend(self.reference.fetch_sequence(
                    &GenomicRegion::from_contig_region(region.contig(), lead),
                )?);
                for allele in &alleles {
                    sequence.extend_from_slice(allele.sequence());
                }
                let tail = ContigRegion::new(last.region().end(), contig_region.end());
                sequence.extend(self.reference.fetch_sequence(
                    &GenomicRegion::from_contig_region(region.contig(), tail),
                )?);
            }
            _ => {
                sequence = self.reference.fetch_sequence(&region)?;
            }
        }
        Ok(Haplotype::from_parts(region, alleles, sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::InMemoryReference;

    fn reference() -> InMemoryReference {
        InMemoryReference::from_contigs([("chr1", "ACGTACGTACGT")])
    }

    fn r(begin: u64, end: u64) -> ContigRegion {
        ContigRegion::new(begin, end)
    }

    fn reference_haplotype(reference: &InMemoryReference) -> Haplotype {
        HaplotypeBuilder::new(GenomicRegion::new("chr1", 0, 12), reference).build().unwrap()
    }

    fn snv_haplotype(reference: &InMemoryReference) -> Haplotype {
        let mut builder = HaplotypeBuilder::new(GenomicRegion::new("chr1", 0, 12), reference);
        builder.push_back(Allele::new(r(5, 6), b"G".to_vec())).unwrap();
        builder.build().unwrap()
    }

    fn insertion_haplotype(reference: &InMemoryReference) -> Haplotype {
        let mut builder = HaplotypeBuilder::new(GenomicRegion::new("chr1", 0, 12), reference);
        builder.push_back(Allele::new(r(4, 4), b"TT".to_vec())).unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn test_reference_haplotype_sequence() {
        let reference = reference();
        let haplotype = reference_haplotype(&reference);
        assert_eq!(haplotype.sequence(), b"ACGTACGTACGT");
        assert!(haplotype.explicit_alleles().is_empty());
        assert!(haplotype.is_reference(&reference).unwrap());
        // Every sub-region renders pure reference
        for (begin, end) in [(0, 12), (0, 4), (4, 8), (11, 12), (5, 5)] {
            let sub = r(begin, end);
            assert_eq!(
                haplotype.sequence_of(&sub).unwrap(),
                reference
                    .fetch_sequence(&GenomicRegion::new("chr1", begin, end))
                    .unwrap()
            );
        }
    }

    #[test]
    fn test_snv_haplotype_sequence_and_contains() {
        let reference = reference();
        let haplotype = snv_haplotype(&reference);
        assert_eq!(haplotype.sequence_of(&r(0, 12)).unwrap(), b"ACGTAGGTACGT");
        assert!(haplotype.contains(&Allele::new(r(5, 6), b"G".to_vec())));
        assert!(!haplotype.contains(&Allele::new(r(5, 6), b"A".to_vec())));
        // Reference allele in a flank
        assert!(haplotype.contains(&Allele::new(r(0, 4), b"ACGT".to_vec())));
        assert!(!haplotype.contains(&Allele::new(r(0, 4), b"AAAA".to_vec())));
        assert!(!haplotype.is_reference(&reference).unwrap());
    }

    #[test]
    fn test_insertion_sequence_stitching() {
        let reference = reference();
        let haplotype = insertion_haplotype(&reference);
        // One ref T, two inserted T, one ref A
        assert_eq!(haplotype.sequence_of(&r(3, 5)).unwrap(), b"TTTA");
        assert_eq!(haplotype.sequence_of(&r(4, 4)).unwrap(), b"TT");
        assert_eq!(haplotype.sequence_of(&r(0, 4)).unwrap(), b"ACGT");
        assert_eq!(haplotype.sequence().len(), 14);
    }

    #[test]
    fn test_sequence_length_invariant() {
        let reference = reference();
        let mut builder =
            HaplotypeBuilder::new(GenomicRegion::new("chr1", 0, 12), &reference);
        builder.push_back(Allele::new(r(2, 2), b"AA".to_vec())).unwrap();
        builder.push_back(Allele::new(r(6, 9), b"".to_vec())).unwrap();
        let haplotype = builder.build().unwrap();
        // 12 + 2 (insertion) - 3 (deletion)
        assert_eq!(haplotype.sequence_len(), 11);
        let sub = r(0, 12);
        let balance: i64 =
            haplotype.explicit_alleles().iter().map(Allele::indel_balance).sum();
        assert_eq!(
            haplotype.sequence_of(&sub).unwrap().len() as i64,
            sub.size() as i64 + balance
        );
    }

    #[test]
    fn test_sequence_out_of_range() {
        let reference = reference();
        let haplotype = snv_haplotype(&reference);
        assert!(matches!(
            haplotype.sequence_of(&r(5, 20)),
            Err(TriocallError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_builder_fills_intervening_reference() {
        let reference = reference();
        let mut builder =
            HaplotypeBuilder::new(GenomicRegion::new("chr1", 0, 12), &reference);
        builder.push_back(Allele::new(r(2, 3), b"T".to_vec())).unwrap();
        builder.push_back(Allele::new(r(7, 8), b"A".to_vec())).unwrap();
        let haplotype = builder.build().unwrap();
        // The gap [3, 7) was filled with reference bases
        assert_eq!(haplotype.explicit_alleles().len(), 3);
        assert_eq!(haplotype.explicit_alleles()[1].region(), &r(3, 7));
        assert_eq!(haplotype.explicit_alleles()[1].sequence(), b"TACG");
        assert_eq!(haplotype.sequence_of(&r(0, 12)).unwrap(), b"ACTTACGAACGT");
    }

    #[test]
    fn test_builder_rejects_out_of_order_push() {
        let reference = reference();
        let mut builder =
            HaplotypeBuilder::new(GenomicRegion::new("chr1", 0, 12), &reference);
        builder.push_back(Allele::new(r(7, 8), b"A".to_vec())).unwrap();
        let result = builder.push_back(Allele::new(r(2, 3), b"T".to_vec()));
        assert!(matches!(result, Err(TriocallError::LogicError { .. })));
    }

    #[test]
    fn test_builder_push_front() {
        let reference = reference();
        let mut builder =
            HaplotypeBuilder::new(GenomicRegion::new("chr1", 0, 12), &reference);
        builder.push_front(Allele::new(r(7, 8), b"A".to_vec())).unwrap();
        builder.push_front(Allele::new(r(2, 3), b"T".to_vec())).unwrap();
        let haplotype = builder.build().unwrap();
        assert_eq!(haplotype.explicit_alleles().len(), 3);
        assert_eq!(haplotype.sequence_of(&r(0, 12)).unwrap(), b"ACTTACGAACGT");

        let mut builder =
            HaplotypeBuilder::new(GenomicRegion::new("chr1", 0, 12), &reference);
        builder.push_front(Allele::new(r(2, 3), b"T".to_vec())).unwrap();
        let result = builder.push_front(Allele::new(r(7, 8), b"A".to_vec()));
        assert!(matches!(result, Err(TriocallError::LogicError { .. })));
    }

    #[test]
    fn test_equality_ignores_decomposition() {
        let reference = reference();
        // Same rendered sequence via one MNV vs two SNVs separated by a
        // filled reference base
        let mut one = HaplotypeBuilder::new(GenomicRegion::new("chr1", 0, 12), &reference);
        one.push_back(Allele::new(r(4, 7), b"GCT".to_vec())).unwrap();
        let one = one.build().unwrap();

        let mut two = HaplotypeBuilder::new(GenomicRegion::new("chr1", 0, 12), &reference);
        two.push_back(Allele::new(r(4, 5), b"G".to_vec())).unwrap();
        two.push_back(Allele::new(r(6, 7), b"T".to_vec())).unwrap();
        let two = two.build().unwrap();

        assert_eq!(one, two);
        assert!(!have_same_alleles(&one, &two));
    }

    #[test]
    fn test_splice_preserves_insertion() {
        let reference = reference();
        let haplotype = insertion_haplotype(&reference);
        let spliced = haplotype.splice(&GenomicRegion::new("chr1", 4, 4)).unwrap();
        assert!(spliced.region().is_empty());
        assert_eq!(spliced.explicit_alleles().len(), 1);
        assert!(spliced.explicit_alleles()[0].is_insertion());
        assert_eq!(spliced.sequence(), b"TT");
    }

    #[test]
    fn test_splice_sequence_invariant() {
        let reference = reference();
        let haplotype = insertion_haplotype(&reference);
        for (begin, end) in [(0, 12), (3, 5), (4, 4), (0, 4), (4, 8), (5, 12)] {
            let sub = GenomicRegion::new("chr1", begin, end);
            let spliced = haplotype.splice(&sub).unwrap();
            assert_eq!(
                spliced.sequence(),
                haplotype.sequence_of(sub.contig_region()).unwrap().as_slice(),
                "splice/sequence mismatch over [{begin}, {end})"
            );
        }
    }

    #[test]
    fn test_splice_partial_boundary_allele() {
        let reference = reference();
        let mut builder =
            HaplotypeBuilder::new(GenomicRegion::new("chr1", 0, 12), &reference);
        builder.push_back(Allele::new(r(4, 7), b"GCT".to_vec())).unwrap();
        let haplotype = builder.build().unwrap();
        let spliced = haplotype.splice(&GenomicRegion::new("chr1", 5, 12)).unwrap();
        assert_eq!(spliced.explicit_alleles().len(), 1);
        assert_eq!(spliced.explicit_alleles()[0].region(), &r(5, 7));
        assert_eq!(spliced.explicit_alleles()[0].sequence(), b"CT");
        assert_eq!(spliced.sequence(), b"CTTACGT");
    }

    #[test]
    fn test_splice_contig_mismatch() {
        let reference = reference();
        let haplotype = snv_haplotype(&reference);
        let result = haplotype.splice(&GenomicRegion::new("chr2", 0, 4));
        assert!(matches!(result, Err(TriocallError::DomainError { .. })));
    }

    #[test]
    fn test_difference_and_mirror() {
        let reference = reference();
        let lhs = snv_haplotype(&reference);
        let rhs = reference_haplotype(&reference);
        let forward = lhs.difference(&rhs).unwrap();
        assert_eq!(forward.len(), 1);
        assert_eq!(forward[0].region(), &GenomicRegion::new("chr1", 5, 6));
        assert_eq!(forward[0].ref_sequence(), b"C");
        assert_eq!(forward[0].alt_sequence(), b"G");
        // The reference haplotype asserts nothing, so the reverse is empty;
        // for two alt haplotypes the difference mirrors ref/alt
        let mut other = HaplotypeBuilder::new(GenomicRegion::new("chr1", 0, 12), &reference);
        other.push_back(Allele::new(r(5, 6), b"T".to_vec())).unwrap();
        let other = other.build().unwrap();
        let ab = lhs.difference(&other).unwrap();
        let ba = other.difference(&lhs).unwrap();
        assert_eq!(ab.len(), 1);
        assert_eq!(ba.len(), 1);
        assert_eq!(ab[0], ba[0].reversed());
    }

    #[test]
    fn test_contains_insertion_against_explicit_only() {
        let reference = reference();
        let haplotype = insertion_haplotype(&reference);
        assert!(haplotype.contains(&Allele::new(r(4, 4), b"TT".to_vec())));
        assert!(!haplotype.contains(&Allele::new(r(4, 4), b"T".to_vec())));
        assert!(!haplotype.contains(&Allele::new(r(7, 7), b"TT".to_vec())));
    }

    #[test]
    fn test_includes_stricter_than_contains() {
        let reference = reference();
        let haplotype = snv_haplotype(&reference);
        // Explicit allele
        assert!(haplotype.includes(&Allele::new(r(5, 6), b"G".to_vec())));
        // Reference allele in a flank
        assert!(haplotype.includes(&Allele::new(r(0, 3), b"ACG".to_vec())));
        // Reference allele overlapping the explicit region is not included
        let overlapping = Allele::new(r(4, 7), b"AGG".to_vec());
        assert!(haplotype.contains(&overlapping));
        assert!(!haplotype.includes(&overlapping));
        // Indel flank alleles are never included
        assert!(!haplotype.includes(&Allele::new(r(1, 1), b"C".to_vec())));
    }

    #[test]
    fn test_expand_grows_flanks() {
        let reference = reference();
        let mut builder =
            HaplotypeBuilder::new(GenomicRegion::new("chr1", 4, 8), &reference);
        builder.push_back(Allele::new(r(5, 6), b"G".to_vec())).unwrap();
        let haplotype = builder.build().unwrap();
        assert_eq!(haplotype.sequence(), b"AGGT");

        let expanded = haplotype.expand(4, &reference).unwrap();
        assert_eq!(expanded.region(), &GenomicRegion::new("chr1", 0, 12));
        assert_eq!(expanded.sequence(), b"ACGTAGGTACGT");
        assert_eq!(expanded.explicit_alleles(), haplotype.explicit_alleles());
    }

    #[test]
    fn test_unique_least_complex() {
        let reference = reference();
        // Two decompositions of the same sequence plus a distinct haplotype
        let mut one = HaplotypeBuilder::new(GenomicRegion::new("chr1", 0, 12), &reference);
        one.push_back(Allele::new(r(4, 7), b"GCT".to_vec())).unwrap();
        let one = one.build().unwrap();

        let mut two = HaplotypeBuilder::new(GenomicRegion::new("chr1", 0, 12), &reference);
        two.push_back(Allele::new(r(4, 5), b"G".to_vec())).unwrap();
        two.push_back(Allele::new(r(6, 7), b"T".to_vec())).unwrap();
        let two = two.build().unwrap();

        let other = snv_haplotype(&reference);

        let mut haplotypes = vec![two.clone(), other.clone(), one.clone()];
        let removed = unique_least_complex(&mut haplotypes, None);
        assert_eq!(removed, 1);
        assert_eq!(haplotypes.len(), 2);
        // The single-allele decomposition is the kept representative
        let kept = haplotypes.iter().find(|h| **h == one).unwrap();
        assert_eq!(kept.explicit_alleles().len(), 1);
    }

    #[test]
    fn test_are_equal_in_region() {
        let reference = reference();
        let lhs = snv_haplotype(&reference);
        let rhs = reference_haplotype(&reference);
        assert!(are_equal_in_region(&lhs, &rhs, &GenomicRegion::new("chr1", 0, 4)).unwrap());
        assert!(!are_equal_in_region(&lhs, &rhs, &GenomicRegion::new("chr1", 4, 8)).unwrap());
    }

    #[test]
    fn test_cached_hash_stability() {
        let reference = reference();
        let a = snv_haplotype(&reference);
        let b = snv_haplotype(&reference);
        assert_eq!(a.cached_hash(), b.cached_hash());
        assert_ne!(a.cached_hash(), reference_haplotype(&reference).cached_hash());
    }
}

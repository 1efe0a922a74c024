//! Genotypes over a haplotype arena.
//!
//! A [`Genotype`] is an unordered multiset of haplotypes of fixed ploidy,
//! stored as sorted indices into a region-scoped haplotype arena (a
//! `&[Haplotype]` owned by the caller for the lifetime of one calling
//! region). Joint posterior entries hold these indices, never references, so
//! the trio model's sort-then-group marginalization gets a cheap total order
//! for free.

use std::cmp::Ordering;

use itertools::Itertools;

use crate::allele::Allele;
use crate::errors::Result;
use crate::haplotype::Haplotype;
use crate::region::GenomicRegion;

/// A fixed-ploidy multiset of haplotype arena indices, kept sorted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Genotype {
    indices: Vec<usize>,
}

impl Genotype {
    /// Creates a genotype from arena indices; the indices are sorted so that
    /// multiset equality is plain equality.
    #[must_use]
    pub fn new(mut indices: Vec<usize>) -> Self {
        indices.sort_unstable();
        Self { indices }
    }

    /// Number of haplotypes in the genotype.
    #[inline]
    #[must_use]
    pub fn ploidy(&self) -> usize {
        self.indices.len()
    }

    /// The sorted arena indices.
    #[inline]
    #[must_use]
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// True iff the genotype carries the haplotype at `index`.
    #[inline]
    #[must_use]
    pub fn contains_index(&self, index: usize) -> bool {
        self.indices.binary_search(&index).is_ok()
    }

    /// True iff any haplotype of the genotype contains `allele`.
    #[must_use]
    pub fn contains_allele(&self, arena: &[Haplotype], allele: &Allele) -> bool {
        self.indices.iter().any(|&i| arena[i].contains(allele))
    }

    /// True iff any haplotype of the genotype includes `allele` (the
    /// stricter containment used when emitting calls).
    #[must_use]
    pub fn includes_allele(&self, arena: &[Haplotype], allele: &Allele) -> bool {
        self.indices.iter().any(|&i| arena[i].includes(allele))
    }

    /// Renders each haplotype of the genotype over `region`, producing the
    /// allele-level genotype used for per-sample genotype calls.
    pub fn splice_to_alleles(
        &self,
        arena: &[Haplotype],
        region: &GenomicRegion,
    ) -> Result<AlleleGenotype> {
        let mut alleles = Vec::with_capacity(self.indices.len());
        for &i in &self.indices {
            let sequence = arena[i].sequence_of(region.contig_region())?;
            alleles.push(Allele::new(*region.contig_region(), sequence));
        }
        Ok(AlleleGenotype::new(alleles))
    }
}

impl PartialOrd for Genotype {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Genotype {
    fn cmp(&self, other: &Self) -> Ordering {
        self.indices.cmp(&other.indices)
    }
}

/// A fixed-ploidy multiset of alleles: a genotype rendered over one region.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlleleGenotype {
    alleles: Vec<Allele>,
}

impl AlleleGenotype {
    /// Creates an allele genotype; alleles are sorted for multiset equality.
    #[must_use]
    pub fn new(mut alleles: Vec<Allele>) -> Self {
        alleles.sort();
        Self { alleles }
    }

    /// The sorted alleles.
    #[inline]
    #[must_use]
    pub fn alleles(&self) -> &[Allele] {
        &self.alleles
    }

    /// True iff the genotype carries `allele`.
    #[must_use]
    pub fn contains(&self, allele: &Allele) -> bool {
        self.alleles.binary_search(allele).is_ok()
    }
}

/// Generates every fixed-ploidy multiset over `num_haplotypes` arena entries,
/// in the total genotype order.
#[must_use]
pub fn generate_all_genotypes(num_haplotypes: usize, ploidy: usize) -> Vec<Genotype> {
    (0..num_haplotypes)
        .combinations_with_replacement(ploidy)
        .map(Genotype::new)
        .collect()
}

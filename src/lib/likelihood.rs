//! Haplotype likelihood model: buffered error tables plus mapping-position
//! search over the pair-HMM.
//!
//! [`HaplotypeLikelihoodModel`] buffers everything derived from one
//! haplotype (SNV masks/priors for both strands, gap-open penalties) behind
//! an explicit `reset`/`clear` lifecycle, then scores reads against the
//! buffered haplotype. The model holds a plain borrow of the haplotype, so
//! its lifetime is strictly shorter than the haplotype arena it scores
//! against; the DP scratch lives in the worker context and is passed into
//! each call.
//!
//! The mapping-position search mirrors the HMM's window contract: candidate
//! positions and the read's natural (aligner) position are scored where the
//! band fits. When no position fits, the model computes the minimal lateral
//! shift and scores only at the shifted position, failing with
//! [`TriocallError::ShortHaplotype`] when the haplotype cannot contain the
//! read even after shifting.

use crate::error_model::{IndelErrorModel, SnvErrorModel, NO_MODEL_SNV_PRIOR};
use crate::errors::{Result, TriocallError};
use crate::haplotype::Haplotype;
use crate::pair_hmm::{self, Alignment, AlignmentScratch, MutationModel};
use crate::phred::{ln_one_minus_exp, ln_sum_exp, phred_to_ln_error_prob};
use crate::read::AlignedRead;

/// Gap-open penalty used when no indel error model is configured.
const NO_MODEL_GAP_OPEN: u8 = 45;

/// Gap-extension penalty used when no indel error model is configured.
const NO_MODEL_GAP_EXTEND: u8 = 3;

/// Likelihoods this close to zero collapse to exactly zero.
const ZERO_CLAMP: f64 = -1e-15;

/// Flank sizes of the buffered haplotype, in haplotype sequence coordinates.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlankState {
    /// Bases at the start of the haplotype excluded from variant evidence
    pub lhs_flank: usize,
    /// Bases at the end of the haplotype excluded from variant evidence
    pub rhs_flank: usize,
}

/// Scores reads against a buffered haplotype.
pub struct HaplotypeLikelihoodModel<'h> {
    snv_model: Option<Box<dyn SnvErrorModel>>,
    indel_model: Option<Box<dyn IndelErrorModel>>,
    use_mapping_quality: bool,
    haplotype: Option<&'h Haplotype>,
    flank_state: Option<FlankState>,
    snv_forward_mask: Vec<u8>,
    snv_forward_priors: Vec<u8>,
    snv_reverse_mask: Vec<u8>,
    snv_reverse_priors: Vec<u8>,
    gap_open: Vec<u8>,
    gap_extend: u8,
    nuc_prior: u8,
}

impl<'h> HaplotypeLikelihoodModel<'h> {
    /// Creates a model with the given error models. `use_mapping_quality`
    /// enables the mismapping mixture on every returned likelihood.
    #[must_use]
    pub fn new(
        snv_model: Option<Box<dyn SnvErrorModel>>,
        indel_model: Option<Box<dyn IndelErrorModel>>,
        use_mapping_quality: bool,
    ) -> Self {
        Self {
            snv_model,
            indel_model,
            use_mapping_quality,
            haplotype: None,
            flank_state: None,
            snv_forward_mask: Vec::new(),
            snv_forward_priors: Vec::new(),
            snv_reverse_mask: Vec::new(),
            snv_reverse_priors: Vec::new(),
            gap_open: Vec::new(),
            gap_extend: NO_MODEL_GAP_EXTEND,
            nuc_prior: 2,
        }
    }

    /// The side padding a haplotype needs around a read for safe alignment.
    #[must_use]
    pub fn pad_requirement() -> u32 {
        pair_hmm::min_flank_pad() as u32
    }

    /// Buffers `haplotype` and computes all of its error tables.
    pub fn reset(&mut self, haplotype: &'h Haplotype, flank_state: Option<FlankState>) {
        self.haplotype = Some(haplotype);
        self.flank_state = flank_state;
        if let Some(model) = &self.snv_model {
            model.evaluate(
                haplotype,
                &mut self.snv_forward_mask,
                &mut self.snv_forward_priors,
                &mut self.snv_reverse_mask,
                &mut self.snv_reverse_priors,
            );
        } else {
            let sequence = haplotype.sequence();
            self.snv_forward_mask.clear();
            self.snv_forward_mask.extend_from_slice(sequence);
            self.snv_reverse_mask.clear();
            self.snv_reverse_mask.extend_from_slice(sequence);
            self.snv_forward_priors.clear();
            self.snv_forward_priors.resize(sequence.len(), NO_MODEL_SNV_PRIOR);
            self.snv_reverse_priors.clear();
            self.snv_reverse_priors.resize(sequence.len(), NO_MODEL_SNV_PRIOR);
        }
        if let Some(model) = &self.indel_model {
            self.gap_extend = model.evaluate(haplotype, &mut self.gap_open);
        } else {
            self.gap_open.clear();
            self.gap_open.resize(haplotype.sequence_len(), NO_MODEL_GAP_OPEN);
            self.gap_extend = NO_MODEL_GAP_EXTEND;
        }
    }

    /// Drops the buffered haplotype and its tables.
    pub fn clear(&mut self) {
        self.haplotype = None;
        self.flank_state = None;
    }

    fn mutation_model(&self, haplotype: &'h Haplotype, reverse: bool) -> MutationModel<'_> {
        let (mask, priors) = if reverse {
            (&self.snv_reverse_mask, &self.snv_reverse_priors)
        } else {
            (&self.snv_forward_mask, &self.snv_forward_priors)
        };
        let flank = self.flank_state.unwrap_or_default();
        MutationModel {
            truth: haplotype.sequence(),
            snv_mask: mask,
            snv_priors: priors,
            gap_open: &self.gap_open,
            gap_extend: self.gap_extend,
            nuc_prior: self.nuc_prior,
            lhs_flank: flank.lhs_flank,
            rhs_flank: flank.rhs_flank,
        }
    }

    fn buffered(&self) -> Result<&'h Haplotype> {
        self.haplotype.ok_or(TriocallError::MissingHaplotype)
    }

    fn natural_position(haplotype: &Haplotype, read: &AlignedRead) -> Result<i64> {
        if haplotype.region().contig() != read.region().contig() {
            return Err(TriocallError::DomainError {
                lhs: haplotype.region().contig().to_string(),
                rhs: read.region().contig().to_string(),
            });
        }
        Ok(read.region().begin() as i64 - haplotype.region().begin() as i64)
    }

    fn out_of_range_bases(position: i64, read_len: usize, haplotype_len: usize) -> i64 {
        let pad = pair_hmm::min_flank_pad() as i64;
        if position < pad {
            return pad - position;
        }
        let end = position + read_len as i64 + pad;
        if end > haplotype_len as i64 { haplotype_len as i64 - end } else { 0 }
    }

    fn is_in_range(position: i64, read_len: usize, haplotype_len: usize) -> bool {
        Self::out_of_range_bases(position, read_len, haplotype_len) == 0
    }

    /// Resolves the position to score when no candidate fits the band.
    ///
    /// A positive shift slides right; a negative one slides left, capped at
    /// the natural position. Either way, a window that still does not fit is
    /// a [`TriocallError::ShortHaplotype`] carrying the minimum extension.
    fn shifted_position(
        haplotype: &Haplotype,
        natural: i64,
        read_len: usize,
    ) -> Result<usize> {
        let haplotype_len = haplotype.sequence_len();
        let short = |extension: i64| TriocallError::ShortHaplotype {
            region: haplotype.region().to_string(),
            required_extension: extension.unsigned_abs().max(1) as u32,
        };
        let shift = Self::out_of_range_bases(natural, read_len, haplotype_len);
        let shifted = if shift > 0 {
            let shifted = natural + shift;
            if !Self::is_in_range(shifted, read_len, haplotype_len) {
                return Err(short(shift));
            }
            shifted
        } else {
            let left_shift = -shift;
            if natural < left_shift {
                return Err(short(left_shift - natural));
            }
            let shifted = natural - left_shift;
            if !Self::is_in_range(shifted, read_len, haplotype_len) {
                return Err(short(Self::out_of_range_bases(
                    shifted,
                    read_len,
                    haplotype_len,
                )));
            }
            shifted
        };
        Ok(shifted as usize)
    }

    fn integrate_mapping_quality(&self, ln_likelihood: f64, mapping_quality: u8) -> f64 {
        let result = if self.use_mapping_quality {
            // p(read | hap) ≈ p(mapped) p(read | hap, mapped) + p(mismapped),
            // taking p(read | hap, mismapped) = 1
            let ln_p_mismapped = phred_to_ln_error_prob(mapping_quality);
            let ln_p_mapped = ln_one_minus_exp(ln_p_mismapped);
            ln_sum_exp(ln_p_mapped + ln_likelihood, ln_p_mismapped)
        } else {
            ln_likelihood
        };
        if result > ZERO_CLAMP { 0.0 } else { result }
    }

    /// The natural-log likelihood of `read` against the buffered haplotype,
    /// maximized over the candidate `mapping_positions` (haplotype sequence
    /// coordinates) plus the read's own mapping position.
    ///
    /// # Errors
    /// [`TriocallError::MissingHaplotype`] before `reset`;
    /// [`TriocallError::DomainError`] for a read on another contig;
    /// [`TriocallError::ShortHaplotype`] when no position can fit the band.
    pub fn evaluate(
        &self,
        read: &AlignedRead,
        mapping_positions: Option<&[usize]>,
        scratch: &mut AlignmentScratch,
    ) -> Result<f64> {
        let haplotype = self.buffered()?;
        let model = self.mutation_model(haplotype, read.is_reverse_mapped());
        let natural = Self::natural_position(haplotype, read)?;
        let haplotype_len = haplotype.sequence_len();
        let read_len = read.len();

        let mut best = f64::MIN;
        let mut natural_visited = false;
        let mut any_in_range = false;
        for &position in mapping_positions.unwrap_or(&[]) {
            if position as i64 == natural {
                natural_visited = true;
            }
            if Self::is_in_range(position as i64, read_len, haplotype_len) {
                any_in_range = true;
                let score =
                    pair_hmm::evaluate(read.sequence(), read.qualities(), position, &model, scratch);
                best = best.max(score);
            }
        }
        if !natural_visited && Self::is_in_range(natural, read_len, haplotype_len) {
            any_in_range = true;
            let score = pair_hmm::evaluate(
                read.sequence(),
                read.qualities(),
                natural as usize,
                &model,
                scratch,
            );
            best = best.max(score);
        }
        if !any_in_range {
            let shifted = Self::shifted_position(haplotype, natural, read_len)?;
            best = pair_hmm::evaluate(read.sequence(), read.qualities(), shifted, &model, scratch);
            if best == f64::MIN {
                return Err(TriocallError::ShortHaplotype {
                    region: haplotype.region().to_string(),
                    required_extension: Self::out_of_range_bases(
                        shifted as i64,
                        read_len,
                        haplotype_len,
                    )
                    .unsigned_abs()
                    .max(1) as u32,
                });
            }
        }
        Ok(self.integrate_mapping_quality(best, read.mapping_quality()))
    }

    /// Like [`Self::evaluate`], additionally returning the argmax's CIGAR
    /// and mapping position via traceback.
    ///
    /// # Errors
    /// As [`Self::evaluate`].
    pub fn align(
        &self,
        read: &AlignedRead,
        mapping_positions: Option<&[usize]>,
        scratch: &mut AlignmentScratch,
    ) -> Result<Alignment> {
        let haplotype = self.buffered()?;
        let model = self.mutation_model(haplotype, read.is_reverse_mapped());
        let natural = Self::natural_position(haplotype, read)?;
        let haplotype_len = haplotype.sequence_len();
        let read_len = read.len();

        let mut best: Option<Alignment> = None;
        let mut consider = |candidate: Option<Alignment>, best: &mut Option<Alignment>| {
            if let Some(candidate) = candidate {
                let better = best
                    .as_ref()
                    .map_or(true, |current| candidate.likelihood > current.likelihood);
                if better {
                    *best = Some(candidate);
                }
            }
        };
        let mut natural_visited = false;
        let mut any_in_range = false;
        for &position in mapping_positions.unwrap_or(&[]) {
            if position as i64 == natural {
                natural_visited = true;
            }
            if Self::is_in_range(position as i64, read_len, haplotype_len) {
                any_in_range = true;
                let candidate =
                    pair_hmm::align(read.sequence(), read.qualities(), position, &model, scratch);
                consider(candidate, &mut best);
            }
        }
        if !natural_visited && Self::is_in_range(natural, read_len, haplotype_len) {
            any_in_range = true;
            let candidate = pair_hmm::align(
                read.sequence(),
                read.qualities(),
                natural as usize,
                &model,
                scratch,
            );
            consider(candidate, &mut best);
        }
        if !any_in_range {
            let shifted = Self::shifted_position(haplotype, natural, read_len)?;
            let candidate =
                pair_hmm::align(read.sequence(), read.qualities(), shifted, &model, scratch);
            consider(candidate, &mut best);
        }
        let mut alignment = best.ok_or_else(|| TriocallError::ShortHaplotype {
            region: haplotype.region().to_string(),
            required_extension: Self::out_of_range_bases(natural, read_len, haplotype_len)
                .unsigned_abs()
                .max(1) as u32,
        })?;
        alignment.likelihood =
            self.integrate_mapping_quality(alignment.likelihood, read.mapping_quality());
        Ok(alignment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_model::{RepeatAwareIndelErrorModel, RepeatAwareSnvErrorModel};
    use crate::haplotype::HaplotypeBuilder;
    use crate::read::AlignedReadBuilder;
    use crate::reference::InMemoryReference;
    use crate::region::GenomicRegion;

    fn reference() -> InMemoryReference {
        InMemoryReference::from_contigs([
            ("chr1", "ACGTACGTACGTACGTACGTACGTACGT"),
            ("chrS", "ACGTACGTAC"),
        ])
    }

    fn haplotype_over(reference: &InMemoryReference, contig: &str, end: u64) -> Haplotype {
        HaplotypeBuilder::new(GenomicRegion::new(contig, 0, end), reference).build().unwrap()
    }

    fn model<'h>() -> HaplotypeLikelihoodModel<'h> {
        HaplotypeLikelihoodModel::new(None, None, true)
    }

    #[test]
    fn test_missing_haplotype() {
        let model = model();
        let read = AlignedReadBuilder::new(GenomicRegion::new("chr1", 12, 16), b"ACGT".to_vec())
            .build();
        let mut scratch = AlignmentScratch::new();
        assert!(matches!(
            model.evaluate(&read, None, &mut scratch),
            Err(TriocallError::MissingHaplotype)
        ));
        assert!(matches!(
            model.align(&read, None, &mut scratch),
            Err(TriocallError::MissingHaplotype)
        ));
    }

    #[test]
    fn test_perfect_read_scores_zero() {
        let reference = reference();
        let haplotype = haplotype_over(&reference, "chr1", 28);
        let mut model = model();
        model.reset(&haplotype, None);
        let read = AlignedReadBuilder::new(GenomicRegion::new("chr1", 12, 16), b"ACGT".to_vec())
            .mapping_quality(60)
            .build();
        let mut scratch = AlignmentScratch::new();
        assert_eq!(model.evaluate(&read, None, &mut scratch).unwrap(), 0.0);

        let alignment = model.align(&read, None, &mut scratch).unwrap();
        assert_eq!(alignment.cigar.to_string(), "4=");
        assert_eq!(alignment.mapping_position, 12);
        assert_eq!(alignment.likelihood, 0.0);
    }

    #[test]
    fn test_out_of_range_natural_position_is_shifted() {
        // Natural position 7 is one base inside the pad; the model shifts
        // right to 8 and scores there, where the band still covers the
        // read's true placement
        let reference = reference();
        let haplotype = haplotype_over(&reference, "chr1", 20);
        let mut model = model();
        model.reset(&haplotype, None);
        let read = AlignedReadBuilder::new(GenomicRegion::new("chr1", 7, 11), b"TACG".to_vec())
            .mapping_quality(60)
            .build();
        let mut scratch = AlignmentScratch::new();
        assert_eq!(model.evaluate(&read, None, &mut scratch).unwrap(), 0.0);
        let alignment = model.align(&read, None, &mut scratch).unwrap();
        assert_eq!(alignment.cigar.to_string(), "4=");
        assert_eq!(alignment.mapping_position, 7);
    }

    #[test]
    fn test_short_haplotype_errors_even_for_matching_reads() {
        // A 12-base haplotype cannot fit the band at any shift, so even an
        // exactly matching read is refused until the haplotype is expanded
        let reference = InMemoryReference::from_contigs([("chr1", "ACGTACGTACGT")]);
        let haplotype = haplotype_over(&reference, "chr1", 12);
        let mut model = model();
        model.reset(&haplotype, None);
        let read = AlignedReadBuilder::new(GenomicRegion::new("chr1", 4, 8), b"ACGT".to_vec())
            .mapping_quality(60)
            .build();
        let mut scratch = AlignmentScratch::new();
        assert!(matches!(
            model.evaluate(&read, None, &mut scratch),
            Err(TriocallError::ShortHaplotype { .. })
        ));
        assert!(matches!(
            model.align(&read, None, &mut scratch),
            Err(TriocallError::ShortHaplotype { .. })
        ));
    }

    #[test]
    fn test_short_haplotype_error() {
        let reference = reference();
        let haplotype = haplotype_over(&reference, "chrS", 10);
        let mut model = model();
        model.reset(&haplotype, None);
        // Two mismatches, so no fast path can rescue the unfittable band
        let read = AlignedReadBuilder::new(GenomicRegion::new("chrS", 1, 9), b"CGTTCGTT".to_vec())
            .build();
        let mut scratch = AlignmentScratch::new();
        match model.evaluate(&read, None, &mut scratch) {
            Err(TriocallError::ShortHaplotype { required_extension, .. }) => {
                assert!(required_extension >= 7, "extension {required_extension}");
            }
            other => panic!("expected ShortHaplotype, got {other:?}"),
        }
    }

    #[test]
    fn test_band_boundary_is_exact() {
        // A 28-base haplotype gives a 12-base read at position 8 exactly
        // pad distance from both edges; one base shorter and the leftward
        // shift lands inside the pad
        let reference = reference();
        let fitting = haplotype_over(&reference, "chr1", 28);
        let short = haplotype_over(&reference, "chr1", 27);
        let mut model = model();
        let mut scratch = AlignmentScratch::new();
        let read =
            AlignedReadBuilder::new(GenomicRegion::new("chr1", 8, 20), b"AGGTACGTATGT".to_vec())
                .build();

        model.reset(&fitting, None);
        assert!(model.evaluate(&read, None, &mut scratch).unwrap() < 0.0);

        model.reset(&short, None);
        assert!(matches!(
            model.evaluate(&read, None, &mut scratch),
            Err(TriocallError::ShortHaplotype { .. })
        ));
    }

    #[test]
    fn test_zero_mapping_quality_collapses_to_zero() {
        let reference = reference();
        let haplotype = haplotype_over(&reference, "chr1", 28);
        let mut model = model();
        model.reset(&haplotype, None);
        // A badly mismatching read, but mapping quality zero means the
        // mismapping mixture absorbs all evidence
        let read = AlignedReadBuilder::new(GenomicRegion::new("chr1", 12, 16), b"TTTT".to_vec())
            .mapping_quality(0)
            .build();
        let mut scratch = AlignmentScratch::new();
        assert_eq!(model.evaluate(&read, None, &mut scratch).unwrap(), 0.0);
    }

    #[test]
    fn test_mapping_quality_bounds_penalty() {
        let reference = reference();
        let haplotype = haplotype_over(&reference, "chr1", 28);
        let mut with_mq = model();
        with_mq.reset(&haplotype, None);
        let mut without_mq = HaplotypeLikelihoodModel::new(None, None, false);
        without_mq.reset(&haplotype, None);
        let read = AlignedReadBuilder::new(GenomicRegion::new("chr1", 12, 16), b"ATGT".to_vec())
            .mapping_quality(20)
            .build();
        let mut scratch = AlignmentScratch::new();
        let mixed = with_mq.evaluate(&read, None, &mut scratch).unwrap();
        let raw = without_mq.evaluate(&read, None, &mut scratch).unwrap();
        // The mismapping mass can only raise the likelihood
        assert!(mixed > raw);
        assert!(mixed <= 0.0);
        // And never below the mismapping probability itself
        assert!(mixed >= phred_to_ln_error_prob(20));
    }

    #[test]
    fn test_candidate_positions_take_max() {
        let reference = reference();
        let haplotype = haplotype_over(&reference, "chr1", 28);
        let mut model = HaplotypeLikelihoodModel::new(None, None, false);
        model.reset(&haplotype, None);
        // Natural position 13 mismatches everywhere; candidate 12 is perfect
        let read = AlignedReadBuilder::new(GenomicRegion::new("chr1", 13, 17), b"ACGT".to_vec())
            .build();
        let mut scratch = AlignmentScratch::new();
        let without_candidates = model.evaluate(&read, None, &mut scratch).unwrap();
        let with_candidates = model.evaluate(&read, Some(&[12]), &mut scratch).unwrap();
        assert!(with_candidates > without_candidates || without_candidates == 0.0);
        assert_eq!(with_candidates, 0.0);
    }

    #[test]
    fn test_evaluate_is_idempotent_across_resets() {
        let reference = reference();
        let haplotype = haplotype_over(&reference, "chr1", 28);
        let mut model = model();
        let read = AlignedReadBuilder::new(GenomicRegion::new("chr1", 12, 16), b"ATGT".to_vec())
            .mapping_quality(40)
            .build();
        let mut scratch = AlignmentScratch::new();
        model.reset(&haplotype, None);
        let first = model.evaluate(&read, None, &mut scratch).unwrap();
        for _ in 0..3 {
            model.reset(&haplotype, None);
            assert_eq!(model.evaluate(&read, None, &mut scratch).unwrap(), first);
        }
    }

    #[test]
    fn test_clear_requires_reset() {
        let reference = reference();
        let haplotype = haplotype_over(&reference, "chr1", 28);
        let mut model = model();
        model.reset(&haplotype, None);
        model.clear();
        let read = AlignedReadBuilder::new(GenomicRegion::new("chr1", 12, 16), b"ACGT".to_vec())
            .build();
        let mut scratch = AlignmentScratch::new();
        assert!(matches!(
            model.evaluate(&read, None, &mut scratch),
            Err(TriocallError::MissingHaplotype)
        ));
    }

    #[test]
    fn test_contig_mismatch_is_domain_error() {
        let reference = reference();
        let haplotype = haplotype_over(&reference, "chr1", 28);
        let mut model = model();
        model.reset(&haplotype, None);
        let read = AlignedReadBuilder::new(GenomicRegion::new("chr2", 12, 16), b"ACGT".to_vec())
            .build();
        let mut scratch = AlignmentScratch::new();
        assert!(matches!(
            model.evaluate(&read, None, &mut scratch),
            Err(TriocallError::DomainError { .. })
        ));
    }

    #[test]
    fn test_configured_error_models_are_used() {
        let reference = reference();
        let haplotype = haplotype_over(&reference, "chr1", 28);
        let mut model = HaplotypeLikelihoodModel::new(
            Some(Box::new(RepeatAwareSnvErrorModel)),
            Some(Box::new(RepeatAwareIndelErrorModel)),
            false,
        );
        model.reset(&haplotype, None);
        let read = AlignedReadBuilder::new(GenomicRegion::new("chr1", 12, 16), b"ATGT".to_vec())
            .build();
        let mut scratch = AlignmentScratch::new();
        let score = model.evaluate(&read, None, &mut scratch).unwrap();
        assert!(score < 0.0);

        // Reverse-strand reads score against the reverse tables
        let reverse = AlignedReadBuilder::new(GenomicRegion::new("chr1", 12, 16), b"ATGT".to_vec())
            .reverse_mapped()
            .build();
        let reverse_score = model.evaluate(&reverse, None, &mut scratch).unwrap();
        assert!(reverse_score < 0.0);
    }
}

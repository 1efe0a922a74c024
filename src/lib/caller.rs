//! The trio calling pipeline.
//!
//! Drives the per-region flow: reads + candidate alleles + a haplotype set
//! arrive from upstream, read likelihoods are computed against every
//! haplotype, the trio model produces the joint genotype posterior, and the
//! posterior is marginalized into germline and de novo calls.
//!
//! Regions are independent and run on a rayon worker pool; each worker owns
//! its alignment scratch. Completed regions flow through a crossbeam channel
//! to a single collector so output stays single-writer. Cancellation is
//! cooperative and checked at region boundaries: a cancelled region is
//! abandoned with no partial output. A region whose haplotypes are too short
//! for the alignment band is retried after expanding every haplotype from
//! the reference, a bounded number of times.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::unbounded;
use log::{debug, error, info};
use rayon::prelude::*;

use crate::allele::{Allele, Variant};
use crate::calls::{Call, DenovoCall, GenotypeCall, VariantCall};
use crate::error_model::ErrorModelRegistry;
use crate::errors::{Result, TriocallError};
use crate::genotype::{generate_all_genotypes, Genotype};
use crate::haplotype::{unique_least_complex, Haplotype, HaplotypeBuilder};
use crate::likelihood::{FlankState, HaplotypeLikelihoodModel};
use crate::metrics::CallingMetrics;
use crate::pair_hmm::AlignmentScratch;
use crate::phred::probability_to_phred;
use crate::read::AlignedRead;
use crate::reference::ReferenceGenome;
use crate::region::GenomicRegion;
use crate::trio_model::{
    DenovoPriorParams, GermlinePriorParams, JointGenotypeProbability, SampleLikelihoods, Trio,
    TrioModel,
};
use crate::validation::{validate_phred, validate_ploidy, validate_positive_probability};

/// Caller configuration.
#[derive(Debug, Clone)]
pub struct CallerParams {
    /// Maternal ploidy (> 0)
    pub maternal_ploidy: usize,
    /// Paternal ploidy (> 0)
    pub paternal_ploidy: usize,
    /// Child ploidy (> 0)
    pub child_ploidy: usize,
    /// Minimum Phred posterior for a call to be emitted
    pub min_variant_posterior: f64,
    /// Germline prior parameters
    pub germline_prior_params: GermlinePriorParams,
    /// De novo prior parameters
    pub denovo_prior_params: DenovoPriorParams,
    /// The pedigree's sample names
    pub trio: Trio,
    /// Sequencer tag selecting the error models
    pub sequencer: String,
    /// Bound on haplotype expand-and-retry rounds per region
    pub max_haplotype_expansions: u64,
}

impl CallerParams {
    /// Sensible defaults around a pedigree.
    #[must_use]
    pub fn new(trio: Trio) -> Self {
        Self {
            maternal_ploidy: 2,
            paternal_ploidy: 2,
            child_ploidy: 2,
            min_variant_posterior: 3.0,
            germline_prior_params: GermlinePriorParams::default(),
            denovo_prior_params: DenovoPriorParams::default(),
            trio,
            sequencer: "ILLUMINA".to_string(),
            max_haplotype_expansions: 3,
        }
    }
}

/// One region's reads, split by pedigree role.
#[derive(Debug, Clone, Default)]
pub struct TrioReads {
    /// Maternal sample reads
    pub mother: Vec<AlignedRead>,
    /// Paternal sample reads
    pub father: Vec<AlignedRead>,
    /// Child sample reads
    pub child: Vec<AlignedRead>,
}

/// Supplies each region's aligned reads, split by pedigree role.
pub trait ReadSource {
    /// The reads overlapping `region` for all three samples.
    fn reads(&self, region: &GenomicRegion) -> Result<TrioReads>;
}

/// Supplies each region's candidate variants.
pub trait CandidateSource {
    /// The candidate variants inside `region`.
    fn candidates(&self, region: &GenomicRegion) -> Result<Vec<Variant>>;
}

/// Supplies each region's candidate haplotype set.
pub trait HaplotypeSource {
    /// Candidate haplotypes over the (padded) region.
    fn haplotypes(&self, region: &GenomicRegion) -> Result<Vec<Haplotype>>;
}

/// Everything upstream hands the caller for one region.
#[derive(Debug, Clone)]
pub struct RegionInput {
    /// The calling region
    pub region: GenomicRegion,
    /// Candidate variants in the region
    pub candidates: Vec<Variant>,
    /// Candidate haplotypes over the (padded) region
    pub haplotypes: Vec<Haplotype>,
    /// Aligned reads per sample
    pub reads: TrioReads,
}

impl RegionInput {
    /// Assembles a region's input from the upstream collaborators.
    pub fn gather(
        region: GenomicRegion,
        reads: &dyn ReadSource,
        candidates: &dyn CandidateSource,
        haplotypes: &dyn HaplotypeSource,
    ) -> Result<Self> {
        Ok(Self {
            candidates: candidates.candidates(&region)?,
            haplotypes: haplotypes.haplotypes(&region)?,
            reads: reads.reads(&region)?,
            region,
        })
    }
}

/// The calls of one region plus its retry count.
#[derive(Debug, Clone, Default)]
pub struct RegionCalls {
    /// Emitted calls, sorted by region
    pub calls: Vec<Call>,
    /// Haplotype expansion rounds this region needed
    pub retries: u64,
}

enum RegionOutcome {
    Done(RegionCalls),
    Cancelled,
    Failed(TriocallError),
}

/// Marginalizes a joint posterior onto one role.
///
/// Sorts the joint entries by the role's genotype (the candidate-vector
/// index is the total order), sums each run of equal genotypes, and
/// zero-fills every candidate genotype that carries no mass. The result has
/// exactly `num_genotypes` entries, indexed like the candidate vector.
#[must_use]
pub fn marginalize_role(
    joint_posteriors: &[JointGenotypeProbability],
    num_genotypes: usize,
    role: impl Fn(&JointGenotypeProbability) -> usize,
) -> Vec<f64> {
    let mut by_genotype: Vec<(usize, f64)> =
        joint_posteriors.iter().map(|p| (role(p), p.probability)).collect();
    by_genotype.sort_by_key(|(genotype, _)| *genotype);

    let mut marginals = vec![0.0; num_genotypes];
    let mut iter = by_genotype.into_iter().peekable();
    while let Some((genotype, probability)) = iter.next() {
        let mut sum = probability;
        while let Some(&(next, _)) = iter.peek() {
            if next != genotype {
                break;
            }
            sum += iter.next().expect("peeked entry").1;
        }
        marginals[genotype] = sum;
    }
    marginals
}

/// Posterior mass of joint entries carrying `haplotype_index` in any role.
#[must_use]
pub fn haplotype_posterior(
    haplotype_index: usize,
    joint_posteriors: &[JointGenotypeProbability],
    genotypes: &[Genotype],
) -> f64 {
    joint_posteriors
        .iter()
        .filter(|p| {
            genotypes[p.maternal].contains_index(haplotype_index)
                || genotypes[p.paternal].contains_index(haplotype_index)
                || genotypes[p.child].contains_index(haplotype_index)
        })
        .map(|p| p.probability)
        .sum()
}

fn trio_contains_allele(
    entry: &JointGenotypeProbability,
    genotypes: &[Genotype],
    arena: &[Haplotype],
    allele: &Allele,
) -> bool {
    genotypes[entry.maternal].contains_allele(arena, allele)
        || genotypes[entry.paternal].contains_allele(arena, allele)
        || genotypes[entry.child].contains_allele(arena, allele)
}

/// Phred posterior that `allele` segregates in the trio: the complement
/// mass of entries where no role carries it.
#[must_use]
pub fn allele_posterior(
    allele: &Allele,
    joint_posteriors: &[JointGenotypeProbability],
    genotypes: &[Genotype],
    arena: &[Haplotype],
) -> f64 {
    let absent_mass: f64 = joint_posteriors
        .iter()
        .filter(|p| !trio_contains_allele(p, genotypes, arena, allele))
        .map(|p| p.probability)
        .sum();
    probability_to_phred(absent_mass)
}

fn is_denovo_in(
    entry: &JointGenotypeProbability,
    genotypes: &[Genotype],
    arena: &[Haplotype],
    allele: &Allele,
) -> bool {
    genotypes[entry.child].contains_allele(arena, allele)
        && !genotypes[entry.maternal].contains_allele(arena, allele)
        && !genotypes[entry.paternal].contains_allele(arena, allele)
}

/// Phred posterior that `allele` is de novo: the complement mass of entries
/// that are not child-only.
#[must_use]
pub fn denovo_posterior(
    allele: &Allele,
    joint_posteriors: &[JointGenotypeProbability],
    genotypes: &[Genotype],
    arena: &[Haplotype],
) -> f64 {
    let not_denovo_mass: f64 = joint_posteriors
        .iter()
        .filter(|p| !is_denovo_in(p, genotypes, arena, allele))
        .map(|p| p.probability)
        .sum();
    probability_to_phred(not_denovo_mass)
}

/// The maximum-probability joint entry's (maternal, paternal, child)
/// genotype indices.
#[must_use]
pub fn call_trio(joint_posteriors: &[JointGenotypeProbability]) -> (usize, usize, usize) {
    let best = joint_posteriors
        .iter()
        .max_by(|a, b| a.probability.total_cmp(&b.probability))
        .expect("joint posterior is never empty");
    (best.maternal, best.paternal, best.child)
}

/// The trio variant caller.
pub struct TrioCaller<R: ReferenceGenome> {
    reference: Arc<R>,
    params: CallerParams,
    error_models: ErrorModelRegistry,
}

impl<R: ReferenceGenome> TrioCaller<R> {
    /// Creates a caller, validating the configuration.
    ///
    /// # Errors
    /// [`TriocallError::LogicError`] for a zero ploidy;
    /// [`TriocallError::InvalidParameter`] for a bad posterior threshold.
    pub fn new(reference: Arc<R>, params: CallerParams) -> Result<Self> {
        validate_ploidy(params.maternal_ploidy, "maternal")?;
        validate_ploidy(params.paternal_ploidy, "paternal")?;
        validate_ploidy(params.child_ploidy, "child")?;
        validate_phred(params.min_variant_posterior, "min-variant-posterior")?;
        // The priors take logarithms of these rates, so zero or out-of-range
        // values must fail here rather than poison the joint posterior
        validate_positive_probability(
            params.germline_prior_params.snv_heterozygosity,
            "snv-heterozygosity",
        )?;
        validate_positive_probability(
            params.germline_prior_params.indel_heterozygosity,
            "indel-heterozygosity",
        )?;
        validate_positive_probability(
            params.denovo_prior_params.mutation_rate,
            "denovo-mutation-rate",
        )?;
        Ok(Self { reference, params, error_models: ErrorModelRegistry::new() })
    }

    /// The caller's configuration.
    #[must_use]
    pub fn params(&self) -> &CallerParams {
        &self.params
    }

    fn arena_region(input: &RegionInput) -> GenomicRegion {
        input
            .haplotypes
            .first()
            .map_or_else(|| input.region.clone(), |h| h.region().clone())
    }

    fn flank_state(calling_region: &GenomicRegion, haplotype: &Haplotype) -> FlankState {
        FlankState {
            lhs_flank: calling_region.begin().saturating_sub(haplotype.region().begin())
                as usize,
            rhs_flank: haplotype.region().end().saturating_sub(calling_region.end()) as usize,
        }
    }

    /// Rebuilds every arena haplotype over a region grown by `n` bases on
    /// each side, clamped to the contig.
    fn expand_arena(&self, arena: &[Haplotype], n: u64) -> Result<Vec<Haplotype>> {
        let mut expanded = Vec::with_capacity(arena.len());
        for haplotype in arena {
            let region = haplotype.region();
            let contig_len = self.reference.contig_size(region.contig())?;
            let begin = region.begin().saturating_sub(n);
            let end = (region.end() + n).min(contig_len);
            let mut builder = HaplotypeBuilder::new(
                region.with_coordinates(begin, end),
                self.reference.as_ref(),
            );
            for allele in haplotype.explicit_alleles() {
                builder.push_back(allele.clone())?;
            }
            expanded.push(builder.build()?);
        }
        Ok(expanded)
    }

    fn compute_likelihoods(
        &self,
        arena: &[Haplotype],
        input: &RegionInput,
        scratch: &mut AlignmentScratch,
    ) -> Result<[SampleLikelihoods; 3]> {
        let (snv_model, indel_model) = self.error_models.make(&self.params.sequencer);
        let mut model = HaplotypeLikelihoodModel::new(Some(snv_model), Some(indel_model), true);
        let samples = [&input.reads.mother, &input.reads.father, &input.reads.child];
        let mut matrices: [Vec<Vec<f64>>; 3] =
            samples.map(|reads| vec![vec![0.0; arena.len()]; reads.len()]);
        for (haplotype_index, haplotype) in arena.iter().enumerate() {
            model.reset(haplotype, Some(Self::flank_state(&input.region, haplotype)));
            for (sample_index, reads) in samples.iter().enumerate() {
                for (read_index, read) in reads.iter().enumerate() {
                    matrices[sample_index][read_index][haplotype_index] =
                        model.evaluate(read, None, scratch)?;
                }
            }
        }
        Ok(matrices.map(SampleLikelihoods::new))
    }

    /// Calls one region. Short haplotypes trigger expansion and retry, up
    /// to the configured bound.
    ///
    /// # Errors
    /// Any unrecoverable error aborts the region.
    pub fn call_region(
        &self,
        input: &RegionInput,
        scratch: &mut AlignmentScratch,
    ) -> Result<RegionCalls> {
        let mut retries = 0u64;
        let mut arena = input.haplotypes.clone();
        loop {
            let arena_region = arena
                .first()
                .map_or_else(|| Self::arena_region(input), |h| h.region().clone());
            let reference_haplotype =
                HaplotypeBuilder::new(arena_region, self.reference.as_ref()).build()?;
            if !arena.contains(&reference_haplotype) {
                arena.push(reference_haplotype.clone());
            }
            unique_least_complex(&mut arena, Some(reference_haplotype.clone()));

            match self.compute_likelihoods(&arena, input, scratch) {
                Ok([mother, father, child]) => {
                    let calls = self.call_from_likelihoods(
                        input,
                        &arena,
                        &reference_haplotype,
                        &mother,
                        &father,
                        &child,
                    )?;
                    return Ok(RegionCalls { calls, retries });
                }
                Err(TriocallError::ShortHaplotype { required_extension, .. })
                    if retries < self.params.max_haplotype_expansions =>
                {
                    let growth =
                        u64::from(required_extension) + u64::from(Self::pad_requirement());
                    debug!(
                        "Short haplotype in {}: expanding arena by {growth} (retry {})",
                        input.region,
                        retries + 1
                    );
                    arena = self.expand_arena(&arena, growth)?;
                    retries += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }

    fn pad_requirement() -> u32 {
        HaplotypeLikelihoodModel::pad_requirement()
    }

    #[allow(clippy::too_many_lines)]
    fn call_from_likelihoods(
        &self,
        input: &RegionInput,
        arena: &[Haplotype],
        reference_haplotype: &Haplotype,
        mother: &SampleLikelihoods,
        father: &SampleLikelihoods,
        child: &SampleLikelihoods,
    ) -> Result<Vec<Call>> {
        let model = TrioModel::new(
            arena,
            reference_haplotype,
            self.params.germline_prior_params,
            self.params.denovo_prior_params,
        )?;
        // One shared candidate genotype set for all three roles; mixed-ploidy
        // pedigrees generate with the maternal ploidy
        let genotypes = generate_all_genotypes(arena.len(), self.params.maternal_ploidy);
        let latents = model.evaluate(genotypes, mother, father, child)?;
        let joint = &latents.joint_posteriors;
        let genotypes = &latents.genotypes;

        let maternal_marginals = marginalize_role(joint, genotypes.len(), |p| p.maternal);
        let paternal_marginals = marginalize_role(joint, genotypes.len(), |p| p.paternal);
        let child_marginals = marginalize_role(joint, genotypes.len(), |p| p.child);
        let (called_mother, called_father, called_child) = call_trio(joint);

        let min_posterior = self.params.min_variant_posterior;
        let mut calls = Vec::new();
        for candidate in &input.candidates {
            let allele = candidate.alt_allele();
            let posterior = allele_posterior(&allele, joint, genotypes, arena);
            if posterior < min_posterior {
                continue;
            }
            let in_called_trio = genotypes[called_mother].includes_allele(arena, &allele)
                || genotypes[called_father].includes_allele(arena, &allele)
                || genotypes[called_child].includes_allele(arena, &allele);
            if !in_called_trio {
                continue;
            }

            let denovo = denovo_posterior(&allele, joint, genotypes, arena);
            let is_denovo = denovo >= min_posterior
                && genotypes[called_child].includes_allele(arena, &allele);

            let region = candidate.region().clone();
            let genotype_calls = self.genotype_calls(
                &region,
                arena,
                genotypes,
                [
                    (&self.params.trio.mother, called_mother, &maternal_marginals),
                    (&self.params.trio.father, called_father, &paternal_marginals),
                    (&self.params.trio.child, called_child, &child_marginals),
                ],
            )?;

            if is_denovo {
                calls.push(Call::Denovo(DenovoCall {
                    variant: candidate.clone(),
                    genotype_calls,
                    posterior: denovo,
                }));
            } else {
                calls.push(Call::Germline(VariantCall {
                    variant: candidate.clone(),
                    genotype_calls,
                    posterior,
                }));
            }
        }
        calls.sort_by(|a, b| a.variant().cmp(b.variant()));
        Ok(calls)
    }

    /// Per-sample genotype calls over `region`: the called genotype spliced
    /// to the region, with the Phred complement mass of the sample's
    /// marginal as posterior.
    fn genotype_calls(
        &self,
        region: &GenomicRegion,
        arena: &[Haplotype],
        genotypes: &[Genotype],
        roles: [(&String, usize, &Vec<f64>); 3],
    ) -> Result<Vec<GenotypeCall>> {
        let spliced: Vec<_> = genotypes
            .iter()
            .map(|g| g.splice_to_alleles(arena, region))
            .collect::<Result<_>>()?;
        let mut result = Vec::with_capacity(roles.len());
        for (sample, called_index, marginals) in roles {
            let called = &spliced[called_index];
            let complement_mass: f64 = marginals
                .iter()
                .zip(&spliced)
                .filter(|(_, rendered)| *rendered != called)
                .map(|(probability, _)| *probability)
                .sum();
            result.push(GenotypeCall {
                sample: sample.clone(),
                genotype: called.clone(),
                posterior: probability_to_phred(complement_mass),
            });
        }
        Ok(result)
    }

    /// Calls a batch of regions on the rayon pool, funneling results to a
    /// single collector. Returns the calls (sorted by region) and run
    /// metrics. Cancellation is observed at region boundaries.
    #[must_use]
    pub fn call_regions(
        &self,
        inputs: Vec<RegionInput>,
        cancel: &AtomicBool,
    ) -> (Vec<Call>, CallingMetrics) {
        let total = inputs.len();
        info!("Calling {total} regions");
        let (sender, receiver) = unbounded::<(GenomicRegion, RegionOutcome)>();

        let (mut calls, metrics) = std::thread::scope(|scope| {
            let collector = scope.spawn(move || {
                let mut calls = Vec::new();
                let mut metrics = CallingMetrics::new();
                for (region, outcome) in receiver {
                    match outcome {
                        RegionOutcome::Done(region_calls) => {
                            metrics.regions_processed += 1;
                            metrics.short_haplotype_retries += region_calls.retries;
                            for call in &region_calls.calls {
                                match call {
                                    Call::Denovo(_) => metrics.denovo_calls += 1,
                                    _ => metrics.germline_calls += 1,
                                }
                            }
                            calls.extend(region_calls.calls);
                        }
                        RegionOutcome::Cancelled => {
                            metrics.regions_cancelled += 1;
                        }
                        RegionOutcome::Failed(err) => {
                            metrics.regions_failed += 1;
                            error!("Region {region} aborted: {err}");
                        }
                    }
                }
                (calls, metrics)
            });

            inputs.into_par_iter().for_each_init(
                || (sender.clone(), AlignmentScratch::new()),
                |(sender, scratch), input| {
                    let outcome = if cancel.load(Ordering::Relaxed) {
                        RegionOutcome::Cancelled
                    } else {
                        match self.call_region(&input, scratch) {
                            Ok(region_calls) => RegionOutcome::Done(region_calls),
                            Err(err) => RegionOutcome::Failed(err),
                        }
                    };
                    sender.send((input.region, outcome)).ok();
                },
            );
            drop(sender);

            collector.join().expect("collector thread panicked")
        });

        calls.sort_by(|a, b| a.variant().cmp(b.variant()));
        (calls, metrics)
    }
}

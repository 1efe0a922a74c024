//! Trio joint genotype model.
//!
//! Evaluates the joint distribution over (maternal, paternal, child)
//! genotypes for one calling region: a coalescent-style germline prior on
//! each parental genotype, a mutation bridge carrying each child haplotype
//! from a parental gamete (the de novo model), and per-sample read
//! likelihoods from the haplotype likelihood model. The evaluated joint
//! posterior is normalized in log space and handed to the caller as
//! [`TrioLatents`] for marginalization and call emission.
//!
//! Genotypes and joint entries reference haplotypes by arena index; the
//! arena is the region-scoped `&[Haplotype]` owned by the caller.

use log::debug;

use crate::errors::{Result, TriocallError};
use crate::genotype::Genotype;
use crate::haplotype::Haplotype;
use crate::phred::{ln_sum_exp, ln_sum_exp_slice};

/// Sample identifiers of a mother/father/child pedigree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trio {
    /// Maternal sample name
    pub mother: String,
    /// Paternal sample name
    pub father: String,
    /// Child sample name
    pub child: String,
}

/// Parameters of the germline (coalescent-style) genotype prior.
#[derive(Debug, Clone, Copy)]
pub struct GermlinePriorParams {
    /// Per-site SNV heterozygosity (θ for substitutions)
    pub snv_heterozygosity: f64,
    /// Per-site indel heterozygosity (θ for indels)
    pub indel_heterozygosity: f64,
}

impl Default for GermlinePriorParams {
    fn default() -> Self {
        Self { snv_heterozygosity: 1e-3, indel_heterozygosity: 1e-4 }
    }
}

/// Parameters of the de novo mutation bridge.
#[derive(Debug, Clone, Copy)]
pub struct DenovoPriorParams {
    /// Per-site probability of a germline de novo mutation
    pub mutation_rate: f64,
}

impl Default for DenovoPriorParams {
    fn default() -> Self {
        Self { mutation_rate: 1e-8 }
    }
}

/// One entry of the joint posterior: genotype-vector indices for each role
/// plus the entry's normalized probability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointGenotypeProbability {
    /// Index of the maternal genotype in the candidate vector
    pub maternal: usize,
    /// Index of the paternal genotype in the candidate vector
    pub paternal: usize,
    /// Index of the child genotype in the candidate vector
    pub child: usize,
    /// Posterior probability, in `[0, 1]`
    pub probability: f64,
}

/// The evaluated joint posterior plus the candidate genotypes it indexes;
/// lives for the duration of one per-region call.
#[derive(Debug, Clone)]
pub struct TrioLatents {
    /// Candidate genotypes shared by all three roles
    pub genotypes: Vec<Genotype>,
    /// Joint posterior over genotype triples, summing to one
    pub joint_posteriors: Vec<JointGenotypeProbability>,
}

/// Per-read, per-haplotype natural-log likelihoods for one sample.
#[derive(Debug, Clone, Default)]
pub struct SampleLikelihoods {
    /// `ln_likelihoods[read][haplotype_index]`
    pub ln_likelihoods: Vec<Vec<f64>>,
}

impl SampleLikelihoods {
    /// Creates the matrix from per-read rows.
    #[must_use]
    pub fn new(ln_likelihoods: Vec<Vec<f64>>) -> Self {
        Self { ln_likelihoods }
    }

    /// ln p(reads | genotype): each read marginalizes uniformly over the
    /// genotype's haplotypes.
    #[must_use]
    pub fn genotype_ln_likelihood(&self, genotype: &Genotype) -> f64 {
        let ln_ploidy = (genotype.ploidy() as f64).ln();
        self.ln_likelihoods
            .iter()
            .map(|read_row| {
                let per_haplotype: Vec<f64> =
                    genotype.indices().iter().map(|&h| read_row[h]).collect();
                ln_sum_exp_slice(&per_haplotype) - ln_ploidy
            })
            .sum()
    }
}

/// The trio joint genotype model for one haplotype arena.
pub struct TrioModel<'a> {
    arena: &'a [Haplotype],
    germline_params: GermlinePriorParams,
    denovo_params: DenovoPriorParams,
    /// Per-haplotype ln prior charge against the reference haplotype
    haplotype_ln_priors: Vec<f64>,
    /// `bridge[parent][child]`: ln probability of the child haplotype given
    /// the parental gamete
    ln_mutation_bridge: Vec<Vec<f64>>,
}

impl<'a> TrioModel<'a> {
    /// Builds the model over a haplotype arena. `reference_haplotype` is the
    /// explicit-allele-free haplotype the germline prior charges against.
    ///
    /// # Errors
    /// Propagates region errors from haplotype differencing.
    pub fn new(
        arena: &'a [Haplotype],
        reference_haplotype: &Haplotype,
        germline_params: GermlinePriorParams,
        denovo_params: DenovoPriorParams,
    ) -> Result<Self> {
        let ln_theta_snv = germline_params.snv_heterozygosity.ln();
        let ln_theta_indel = germline_params.indel_heterozygosity.ln();
        let mut haplotype_ln_priors = Vec::with_capacity(arena.len());
        for haplotype in arena {
            let variants = haplotype.difference(reference_haplotype)?;
            let indels = variants
                .iter()
                .filter(|v| v.ref_sequence().len() != v.alt_sequence().len())
                .count();
            let snvs = variants.len() - indels;
            haplotype_ln_priors
                .push(snvs as f64 * ln_theta_snv + indels as f64 * ln_theta_indel);
        }

        let ln_mu = denovo_params.mutation_rate.ln();
        let mut ln_mutation_bridge = vec![vec![0.0; arena.len()]; arena.len()];
        for (p, parent) in arena.iter().enumerate() {
            for (c, child) in arena.iter().enumerate() {
                let sites = if p == c { 0 } else { child.difference(parent)?.len().max(1) };
                ln_mutation_bridge[p][c] = sites as f64 * ln_mu;
            }
        }
        debug!(
            "Trio model over {} haplotypes (θ_snv={}, θ_indel={}, μ={})",
            arena.len(),
            germline_params.snv_heterozygosity,
            germline_params.indel_heterozygosity,
            denovo_params.mutation_rate
        );
        Ok(Self {
            arena,
            germline_params,
            denovo_params,
            haplotype_ln_priors,
            ln_mutation_bridge,
        })
    }

    /// The arena this model indexes into.
    #[must_use]
    pub fn arena(&self) -> &'a [Haplotype] {
        self.arena
    }

    /// The configured germline prior parameters.
    #[must_use]
    pub fn germline_params(&self) -> GermlinePriorParams {
        self.germline_params
    }

    /// The configured de novo parameters.
    #[must_use]
    pub fn denovo_params(&self) -> DenovoPriorParams {
        self.denovo_params
    }

    /// ln prior of a germline genotype: independent per-haplotype charges.
    #[must_use]
    pub fn germline_ln_prior(&self, genotype: &Genotype) -> f64 {
        genotype.indices().iter().map(|&h| self.haplotype_ln_priors[h]).sum()
    }

    /// ln p(child genotype | parental genotypes): each child haplotype is
    /// carried by a uniformly chosen parental gamete through the mutation
    /// bridge. Diploid children draw one gamete per parent; haploid children
    /// draw from either parent; higher ploidies bridge each child haplotype
    /// from its best-supported gamete.
    #[must_use]
    pub fn inheritance_ln_prior(
        &self,
        child: &Genotype,
        mother: &Genotype,
        father: &Genotype,
    ) -> f64 {
        let bridge = |parent: &Genotype, child_h: usize| -> f64 {
            let terms: Vec<f64> = parent
                .indices()
                .iter()
                .map(|&p| self.ln_mutation_bridge[p][child_h])
                .collect();
            ln_sum_exp_slice(&terms) - (parent.ploidy() as f64).ln()
        };
        match child.indices() {
            [single] => {
                // Haploid child: the gamete came from either parent
                ln_sum_exp(bridge(mother, *single), bridge(father, *single)) - 2f64.ln()
            }
            [first, second] => {
                // Diploid child: one gamete per parent, either assignment
                let direct = bridge(mother, *first) + bridge(father, *second);
                let swapped = bridge(mother, *second) + bridge(father, *first);
                if first == second {
                    direct
                } else {
                    ln_sum_exp(direct, swapped) - 2f64.ln()
                }
            }
            indices => indices
                .iter()
                .map(|&h| ln_sum_exp(bridge(mother, h), bridge(father, h)) - 2f64.ln())
                .sum(),
        }
    }

    /// Evaluates the joint posterior over every genotype triple.
    ///
    /// # Errors
    /// [`TriocallError::LogicError`] when `genotypes` is empty or any
    /// genotype has zero ploidy.
    pub fn evaluate(
        &self,
        genotypes: Vec<Genotype>,
        mother: &SampleLikelihoods,
        father: &SampleLikelihoods,
        child: &SampleLikelihoods,
    ) -> Result<TrioLatents> {
        if genotypes.is_empty() {
            return Err(TriocallError::LogicError {
                context: "TrioModel::evaluate",
                reason: "no candidate genotypes".to_string(),
            });
        }
        if genotypes.iter().any(|g| g.ploidy() == 0) {
            return Err(TriocallError::LogicError {
                context: "TrioModel::evaluate",
                reason: "ploidy must be > 0".to_string(),
            });
        }

        let germline_priors: Vec<f64> =
            genotypes.iter().map(|g| self.germline_ln_prior(g)).collect();
        let mother_likelihoods: Vec<f64> =
            genotypes.iter().map(|g| mother.genotype_ln_likelihood(g)).collect();
        let father_likelihoods: Vec<f64> =
            genotypes.iter().map(|g| father.genotype_ln_likelihood(g)).collect();
        let child_likelihoods: Vec<f64> =
            genotypes.iter().map(|g| child.genotype_ln_likelihood(g)).collect();

        let count = genotypes.len();
        let mut ln_joints = Vec::with_capacity(count * count * count);
        let mut entries = Vec::with_capacity(count * count * count);
        for (m, maternal_genotype) in genotypes.iter().enumerate() {
            for (f, paternal_genotype) in genotypes.iter().enumerate() {
                for (c, child_genotype) in genotypes.iter().enumerate() {
                    let ln_joint = germline_priors[m]
                        + germline_priors[f]
                        + self.inheritance_ln_prior(
                            child_genotype,
                            maternal_genotype,
                            paternal_genotype,
                        )
                        + mother_likelihoods[m]
                        + father_likelihoods[f]
                        + child_likelihoods[c];
                    ln_joints.push(ln_joint);
                    entries.push((m, f, c));
                }
            }
        }

        let norm = ln_sum_exp_slice(&ln_joints);
        let joint_posteriors = entries
            .into_iter()
            .zip(ln_joints)
            .map(|((m, f, c), ln_joint)| JointGenotypeProbability {
                maternal: m,
                paternal: f,
                child: c,
                probability: (ln_joint - norm).exp(),
            })
            .collect();
        Ok(TrioLatents { genotypes, joint_posteriors })
    }
}

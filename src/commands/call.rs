//! The `call` command: run the trio calling pipeline over a set of regions.
//!
//! Reads and candidate alleles enter the core through its collaborator
//! traits; this command wires the reference, the pedigree, and the model
//! configuration, drives the region pipeline, and renders emitted calls as
//! tab-separated records. Upstream read/candidate providers plug in at the
//! [`RegionInput`] boundary.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;

use triocall_lib::caller::{CallerParams, RegionInput, TrioCaller, TrioReads};
use triocall_lib::calls::{AnnotatorRegistry, Call};
use triocall_lib::haplotype::HaplotypeBuilder;
use triocall_lib::logging::{log_calling_summary, OperationTimer};
use triocall_lib::reference::load_fasta;
use triocall_lib::region::GenomicRegion;
use triocall_lib::trio_model::{DenovoPriorParams, GermlinePriorParams, Trio};
use triocall_lib::validation::validate_file_exists;

use crate::commands::command::Command;

/// Call germline and de novo variants in a mother/father/child trio.
#[derive(Parser, Debug)]
pub struct CallVariants {
    /// Reference FASTA
    #[arg(long, short = 'r')]
    reference: String,

    /// Calling regions as contig:begin-end (half-open, 0-based)
    #[arg(long = "region", short = 'R', required = true)]
    regions: Vec<String>,

    /// Maternal sample name
    #[arg(long)]
    mother: String,

    /// Paternal sample name
    #[arg(long)]
    father: String,

    /// Child sample name
    #[arg(long)]
    child: String,

    /// Minimum Phred posterior for emitted calls
    #[arg(long, default_value_t = 3.0)]
    min_variant_posterior: f64,

    /// Per-site SNV heterozygosity
    #[arg(long, default_value_t = 1e-3)]
    snv_heterozygosity: f64,

    /// Per-site indel heterozygosity
    #[arg(long, default_value_t = 1e-4)]
    indel_heterozygosity: f64,

    /// Per-site de novo mutation rate
    #[arg(long, default_value_t = 1e-8)]
    denovo_mutation_rate: f64,

    /// Sequencer tag selecting the error models
    #[arg(long, default_value = "ILLUMINA")]
    sequencer: String,

    /// Worker threads (0 = all cores)
    #[arg(long, short = 't', default_value_t = 0)]
    threads: usize,
}

/// Parses a `contig:begin-end` region string.
pub fn parse_region(spec: &str) -> Result<GenomicRegion> {
    let (contig, span) = spec
        .rsplit_once(':')
        .with_context(|| format!("region '{spec}' is not contig:begin-end"))?;
    let (begin, end) = span
        .split_once('-')
        .with_context(|| format!("region '{spec}' is not contig:begin-end"))?;
    let begin: u64 =
        begin.parse().with_context(|| format!("bad region begin in '{spec}'"))?;
    let end: u64 = end.parse().with_context(|| format!("bad region end in '{spec}'"))?;
    if begin > end {
        bail!("region '{spec}' has begin > end");
    }
    Ok(GenomicRegion::new(contig, begin, end))
}

fn render_call(call: &Call, annotators: &AnnotatorRegistry) -> Result<String> {
    let variant = call.variant();
    let annotations = annotators.annotate(call)?;
    let rendered_annotations = annotations
        .iter()
        .map(|a| {
            if a.value.is_empty() { a.id.clone() } else { format!("{}={}", a.id, a.value) }
        })
        .collect::<Vec<_>>()
        .join(";");
    let genotypes = call
        .genotype_calls()
        .iter()
        .map(|g| format!("{}:{:.2}", g.sample, g.posterior))
        .collect::<Vec<_>>()
        .join("\t");
    Ok(format!(
        "{}\t{}\t{}\t{:.2}\t{}\t{}",
        variant.region(),
        String::from_utf8_lossy(variant.ref_sequence()),
        String::from_utf8_lossy(variant.alt_sequence()),
        call.posterior(),
        rendered_annotations,
        genotypes
    ))
}

impl Command for CallVariants {
    fn execute(&self, command_line: &str) -> Result<()> {
        info!("Command line: {command_line}");
        validate_file_exists(&self.reference, "Reference FASTA")?;
        if self.threads > 0 {
            rayon::ThreadPoolBuilder::new()
                .num_threads(self.threads)
                .build_global()
                .context("Failed to configure the worker pool")?;
        }

        let timer = OperationTimer::new("Loading reference");
        let reference = Arc::new(load_fasta(&self.reference)?);
        timer.log_completion(1);

        let trio = Trio {
            mother: self.mother.clone(),
            father: self.father.clone(),
            child: self.child.clone(),
        };
        let mut params = CallerParams::new(trio);
        params.min_variant_posterior = self.min_variant_posterior;
        params.germline_prior_params = GermlinePriorParams {
            snv_heterozygosity: self.snv_heterozygosity,
            indel_heterozygosity: self.indel_heterozygosity,
        };
        params.denovo_prior_params =
            DenovoPriorParams { mutation_rate: self.denovo_mutation_rate };
        params.sequencer = self.sequencer.clone();
        let caller = TrioCaller::new(Arc::clone(&reference), params)?;

        // Upstream candidate/read providers attach here; with none wired,
        // each region starts from its reference haplotype
        let mut inputs = Vec::with_capacity(self.regions.len());
        for spec in &self.regions {
            let region = parse_region(spec)?;
            let haplotype =
                HaplotypeBuilder::new(region.clone(), reference.as_ref()).build()?;
            inputs.push(RegionInput {
                region,
                candidates: Vec::new(),
                haplotypes: vec![haplotype],
                reads: TrioReads::default(),
            });
        }

        let cancel = AtomicBool::new(false);
        let timer = OperationTimer::new("Calling regions");
        let (calls, metrics) = caller.call_regions(inputs, &cancel);
        timer.log_completion(metrics.regions_processed);

        let annotators = AnnotatorRegistry::new();
        for call in &calls {
            println!("{}", render_call(call, &annotators)?);
        }
        log_calling_summary(&metrics);
        Ok(())
    }
}

//! End-to-end pipeline tests against the public API.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use triocall_lib::allele::{Allele, Variant};
use triocall_lib::caller::{CallerParams, RegionInput, TrioCaller, TrioReads};
use triocall_lib::calls::{AnnotatorRegistry, Call};
use triocall_lib::haplotype::HaplotypeBuilder;
use triocall_lib::read::{AlignedRead, AlignedReadBuilder};
use triocall_lib::reference::InMemoryReference;
use triocall_lib::region::{ContigRegion, GenomicRegion};
use triocall_lib::trio_model::Trio;

// Non-repetitive contig so reads anchor uniquely
const CONTIG: &str = "TTAACGGCAGTCGATCGTAAGCTAGCTTACGGATCCAGTA";

fn reference() -> Arc<InMemoryReference> {
    Arc::new(InMemoryReference::from_contigs([("chr1", CONTIG)]))
}

fn trio() -> Trio {
    Trio { mother: "NA12892".to_string(), father: "NA12891".to_string(), child: "NA12878".to_string() }
}

fn reads(count: usize, alt: usize) -> Vec<AlignedRead> {
    let ref_bases = CONTIG.as_bytes()[12..24].to_vec();
    let mut alt_bases = ref_bases.clone();
    alt_bases[6] = b'C'; // contig position 18
    (0..count)
        .map(|i| {
            let bases = if i < alt { alt_bases.clone() } else { ref_bases.clone() };
            AlignedReadBuilder::new(GenomicRegion::new("chr1", 12, 24), bases)
                .name(format!("read{i}"))
                .uniform_quality(40)
                .mapping_quality(60)
                .build()
        })
        .collect()
}

fn region_input(reference: &InMemoryReference, child_alt: usize) -> RegionInput {
    let padded = GenomicRegion::new("chr1", 0, 40);
    let reference_haplotype =
        HaplotypeBuilder::new(padded.clone(), reference).build().unwrap();
    let mut builder = HaplotypeBuilder::new(padded, reference);
    builder.push_back(Allele::new(ContigRegion::new(18, 19), b"C".to_vec())).unwrap();
    let alt_haplotype = builder.build().unwrap();
    RegionInput {
        region: GenomicRegion::new("chr1", 16, 22),
        candidates: vec![Variant::new(
            GenomicRegion::new("chr1", 18, 19),
            b"A".to_vec(),
            b"C".to_vec(),
        )],
        haplotypes: vec![reference_haplotype, alt_haplotype],
        reads: TrioReads {
            mother: reads(30, 0),
            father: reads(30, 0),
            child: reads(10, child_alt),
        },
    }
}

#[test]
fn trio_pipeline_emits_annotated_denovo_call() {
    let reference = reference();
    let caller = TrioCaller::new(Arc::clone(&reference), CallerParams::new(trio())).unwrap();
    let cancel = AtomicBool::new(false);
    let (calls, metrics) = caller.call_regions(vec![region_input(&reference, 5)], &cancel);

    assert_eq!(metrics.regions_processed, 1);
    assert_eq!(metrics.denovo_calls, 1);
    assert_eq!(calls.len(), 1);

    let Call::Denovo(denovo) = &calls[0] else {
        panic!("expected a de novo call, got {:?}", calls[0]);
    };
    assert_eq!(denovo.variant.region(), &GenomicRegion::new("chr1", 18, 19));
    assert_eq!(denovo.variant.ref_sequence(), b"A");
    assert_eq!(denovo.variant.alt_sequence(), b"C");
    assert_eq!(denovo.genotype_calls.len(), 3);

    // The registry annotates de novo records with the DENOVO flag
    let annotations = AnnotatorRegistry::new().annotate(&calls[0]).unwrap();
    assert!(annotations.iter().any(|a| a.id == "DENOVO"));
    assert!(annotations.iter().any(|a| a.id == "PP"));
}

#[test]
fn trio_pipeline_is_quiet_on_reference_samples() {
    let reference = reference();
    let caller = TrioCaller::new(Arc::clone(&reference), CallerParams::new(trio())).unwrap();
    let cancel = AtomicBool::new(false);
    let (calls, metrics) = caller.call_regions(vec![region_input(&reference, 0)], &cancel);
    assert!(calls.is_empty());
    assert_eq!(metrics.regions_processed, 1);
    assert_eq!(metrics.total_calls(), 0);
}

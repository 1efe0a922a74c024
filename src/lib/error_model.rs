//! Sequence-context error models.
//!
//! Given a haplotype, these models derive the per-position penalty tables the
//! pair-HMM consumes: forward/reverse SNV masks and Phred-scale priors, and
//! per-position gap-open penalties with a scalar gap-extension penalty.
//!
//! The default models are repeat-aware: homopolymer tracts lower both the
//! SNV prior (miscalls toward the repeated base are common) and the gap-open
//! penalty (polymerase slippage makes indels cheap inside repeats). Model
//! selection is keyed by a sequencer tag through [`ErrorModelRegistry`].

use ahash::AHashMap;

use crate::haplotype::Haplotype;

/// SNV prior used when no model is configured: effectively "never".
pub const NO_MODEL_SNV_PRIOR: u8 = 100;

/// Derives per-position SNV masks and priors from a haplotype's sequence
/// context.
///
/// `mask[j]` is the base for which the discounted prior applies: a read base
/// that mismatches the haplotype but equals `mask[j]` is penalized by
/// `min(base_quality, prior[j])` instead of the full base quality.
pub trait SnvErrorModel: Send + Sync {
    /// Fills the forward- and reverse-strand mask/prior tables for
    /// `haplotype`. All four vectors are cleared and resized to the
    /// haplotype's sequence length.
    fn evaluate(
        &self,
        haplotype: &Haplotype,
        forward_mask: &mut Vec<u8>,
        forward_priors: &mut Vec<u8>,
        reverse_mask: &mut Vec<u8>,
        reverse_priors: &mut Vec<u8>,
    );
}

/// Derives per-position gap-open penalties from a haplotype's repeat
/// context; returns the scalar gap-extension penalty.
pub trait IndelErrorModel: Send + Sync {
    /// Fills `gap_open` (cleared and resized to the haplotype's sequence
    /// length) and returns the gap-extension penalty.
    fn evaluate(&self, haplotype: &Haplotype, gap_open: &mut Vec<u8>) -> u8;
}

/// Phred penalties for an SNV matching a homopolymer context, indexed by
/// run length (capped).
const SNV_REPEAT_PRIORS: [u8; 10] = [60, 60, 52, 45, 38, 32, 27, 22, 18, 15];

/// Phred gap-open penalties indexed by homopolymer run length (capped).
const GAP_OPEN_PENALTIES: [u8; 10] = [51, 51, 45, 41, 36, 30, 25, 21, 17, 14];

/// Default gap-extension penalty.
const GAP_EXTENSION_PENALTY: u8 = 3;

fn complement(base: u8) -> u8 {
    match base {
        b'A' => b'T',
        b'C' => b'G',
        b'G' => b'C',
        b'T' => b'A',
        other => other,
    }
}

/// Length of the homopolymer run ending at `position` (inclusive), scanning
/// left.
fn run_length_ending_at(sequence: &[u8], position: usize) -> usize {
    let base = sequence[position];
    sequence[..=position].iter().rev().take_while(|&&b| b == base).count()
}

/// Repeat-aware SNV error model: miscalls toward the base of the
/// homopolymer immediately left (forward strand) or right (reverse strand)
/// of each position are discounted by run length.
#[derive(Debug, Clone, Copy, Default)]
pub struct RepeatAwareSnvErrorModel;

impl RepeatAwareSnvErrorModel {
    fn evaluate_strand(sequence: &[u8], mask: &mut Vec<u8>, priors: &mut Vec<u8>) {
        mask.clear();
        priors.clear();
        mask.reserve(sequence.len());
        priors.reserve(sequence.len());
        for (j, &base) in sequence.iter().enumerate() {
            if j == 0 {
                mask.push(base);
                priors.push(SNV_REPEAT_PRIORS[0]);
                continue;
            }
            let run = run_length_ending_at(sequence, j - 1);
            mask.push(sequence[j - 1]);
            priors.push(SNV_REPEAT_PRIORS[run.min(SNV_REPEAT_PRIORS.len() - 1)]);
        }
    }
}

impl SnvErrorModel for RepeatAwareSnvErrorModel {
    fn evaluate(
        &self,
        haplotype: &Haplotype,
        forward_mask: &mut Vec<u8>,
        forward_priors: &mut Vec<u8>,
        reverse_mask: &mut Vec<u8>,
        reverse_priors: &mut Vec<u8>,
    ) {
        let sequence = haplotype.sequence();
        Self::evaluate_strand(sequence, forward_mask, forward_priors);

        // Reverse strand: evaluate the reverse complement, then flip the
        // tables back into forward coordinates.
        let revcomp: Vec<u8> = sequence.iter().rev().map(|&b| complement(b)).collect();
        Self::evaluate_strand(&revcomp, reverse_mask, reverse_priors);
        reverse_mask.reverse();
        reverse_priors.reverse();
        for base in reverse_mask.iter_mut() {
            *base = complement(*base);
        }
    }
}

/// Repeat-aware indel error model: the gap-open penalty at each position
/// falls with the length of the homopolymer containing it.
#[derive(Debug, Clone, Copy, Default)]
pub struct RepeatAwareIndelErrorModel;

impl IndelErrorModel for RepeatAwareIndelErrorModel {
    fn evaluate(&self, haplotype: &Haplotype, gap_open: &mut Vec<u8>) -> u8 {
        let sequence = haplotype.sequence();
        gap_open.clear();
        gap_open.reserve(sequence.len());
        let mut j = 0;
        while j < sequence.len() {
            let base = sequence[j];
            let run_end = sequence[j..].iter().take_while(|&&b| b == base).count() + j;
            let run_len = run_end - j;
            let penalty = GAP_OPEN_PENALTIES[run_len.min(GAP_OPEN_PENALTIES.len() - 1)];
            for _ in j..run_end {
                gap_open.push(penalty);
            }
            j = run_end;
        }
        GAP_EXTENSION_PENALTY
    }
}

type ModelFactory = fn() -> (Box<dyn SnvErrorModel>, Box<dyn IndelErrorModel>);

fn default_models() -> (Box<dyn SnvErrorModel>, Box<dyn IndelErrorModel>) {
    (Box::new(RepeatAwareSnvErrorModel), Box::new(RepeatAwareIndelErrorModel))
}

/// Maps sequencer tags (e.g. `"ILLUMINA"`) to error-model factories.
pub struct ErrorModelRegistry {
    factories: AHashMap<String, ModelFactory>,
}

impl Default for ErrorModelRegistry {
    fn default() -> Self {
        let mut factories: AHashMap<String, ModelFactory> = AHashMap::new();
        for tag in ["ILLUMINA", "HISEQ", "NOVASEQ", "XTEN"] {
            factories.insert(tag.to_string(), default_models as ModelFactory);
        }
        Self { factories }
    }
}

impl ErrorModelRegistry {
    /// Creates the registry with the built-in sequencer tags.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a factory for a sequencer tag.
    pub fn register(&mut self, tag: impl Into<String>, factory: ModelFactory) {
        self.factories.insert(tag.into(), factory);
    }

    /// Builds the (SNV, indel) model pair for a sequencer tag, falling back
    /// to the repeat-aware defaults for unknown tags.
    #[must_use]
    pub fn make(&self, tag: &str) -> (Box<dyn SnvErrorModel>, Box<dyn IndelErrorModel>) {
        match self.factories.get(&tag.to_ascii_uppercase()) {
            Some(factory) => factory(),
            None => default_models(),
        }
    }
}

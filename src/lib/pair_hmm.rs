//! Banded pair-HMM read/haplotype alignment.
//!
//! Scores one read against one haplotype with a Viterbi (max-score) pair-HMM
//! run in Phred-integer space: per-base read qualities price mismatches
//! (discounted by the SNV prior where the sequence context makes the
//! substitution plausible), per-position gap-open penalties and a scalar
//! extension price indels. The alignment is banded: a candidate mapping
//! position `p` places the read against the window
//! `[max(0, p - 8), p + read_len + 15)` and the Viterbi band allows at most
//! 8 columns of leftward and 15 columns of rightward drift.
//!
//! Scores convert to natural-log likelihoods as `-ln(10)/10 × score`. When a
//! declared flank overlaps the alignment window, a flank-only rescoring pass
//! over the traceback subtracts the flank's contribution so the returned
//! likelihood reflects only the non-flank interior.
//!
//! This module never errors: a window that does not fit in the haplotype
//! yields the [`f64::MIN`] sentinel and the mapping-position search in the
//! likelihood layer decides what to do about it.

use crate::cigar::{CigarOp, CigarOpKind, CigarString};
use crate::phred::LN_10_DIV_10;

/// Padding required on each side of a read's mapping position for the band
/// to fit, and the left margin of the alignment window.
pub const fn min_flank_pad() -> usize {
    8
}

/// Extra window columns past the read end: the rightward drift allowance
/// plus the left margin.
const WINDOW_SLACK: usize = 15;

const INF: u32 = u32::MAX / 4;

const GAP_CHAR: u8 = b'-';

/// Per-haplotype tables and scalars the HMM scores against.
#[derive(Debug, Clone, Copy)]
pub struct MutationModel<'a> {
    /// Haplotype sequence ("truth") the read is aligned to
    pub truth: &'a [u8],
    /// Per-position SNV mask: a mismatching read base equal to the mask is
    /// discounted to `min(quality, prior)`
    pub snv_mask: &'a [u8],
    /// Per-position Phred SNV priors
    pub snv_priors: &'a [u8],
    /// Per-position Phred gap-open penalties
    pub gap_open: &'a [u8],
    /// Phred gap-extension penalty
    pub gap_extend: u8,
    /// Phred prior for the nucleotide of an inserted base
    pub nuc_prior: u8,
    /// Bases at the start of the truth excluded from variant evidence
    pub lhs_flank: usize,
    /// Bases at the end of the truth excluded from variant evidence
    pub rhs_flank: usize,
}

impl<'a> MutationModel<'a> {
    fn substitution_cost(&self, read_base: u8, quality: u8, truth_pos: usize) -> u32 {
        let truth_base = self.truth[truth_pos];
        if read_base == truth_base || read_base == b'N' || truth_base == b'N' {
            0
        } else if read_base == self.snv_mask[truth_pos] {
            u32::from(quality.min(self.snv_priors[truth_pos]))
        } else {
            u32::from(quality)
        }
    }

    fn gap_open_cost(&self, truth_pos: usize) -> u32 {
        u32::from(self.gap_open[truth_pos.min(self.gap_open.len() - 1)])
    }

    /// True iff a read of `read_len` bases mapped at `position` reaches into
    /// a declared flank.
    #[must_use]
    pub fn is_in_flank(&self, position: usize, read_len: usize) -> bool {
        position < self.lhs_flank
            || position + read_len > self.truth.len().saturating_sub(self.rhs_flank)
    }
}

/// The result of [`align`]: optimal path plus its likelihood.
#[derive(Debug, Clone)]
pub struct Alignment {
    /// CIGAR of the optimal path (`=`/`X`/`I`/`D` ops)
    pub cigar: CigarString,
    /// Truth position of the first aligned read base
    pub mapping_position: usize,
    /// Natural-log likelihood, ≤ 0
    pub likelihood: f64,
}

/// Reusable per-worker alignment buffers, grown on demand and never shrunk.
///
/// The three cost matrices and parent tables back the Viterbi recurrence;
/// `align1`/`align2` hold the gapped truth/read rows of the traceback and
/// are sized to `2 × (read_len + 8)`.
#[derive(Debug, Default)]
pub struct AlignmentScratch {
    match_cost: Vec<u32>,
    insert_cost: Vec<u32>,
    delete_cost: Vec<u32>,
    match_parent: Vec<u8>,
    insert_parent: Vec<u8>,
    delete_parent: Vec<u8>,
    /// Gapped truth row of the optimal path
    pub align1: Vec<u8>,
    /// Gapped read row of the optimal path
    pub align2: Vec<u8>,
}

impl AlignmentScratch {
    /// Creates empty scratch; buffers grow on first use.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn reserve(&mut self, rows: usize, cols: usize, read_len: usize) {
        let cells = rows * cols;
        for cost in [&mut self.match_cost, &mut self.insert_cost, &mut self.delete_cost] {
            cost.clear();
            cost.resize(cells, INF);
        }
        for parent in [&mut self.match_parent, &mut self.insert_parent, &mut self.delete_parent]
        {
            parent.clear();
            parent.resize(cells, 0);
        }
        let trace_len = 2 * (read_len + min_flank_pad());
        self.align1.clear();
        self.align1.resize(trace_len, 0);
        self.align2.clear();
        self.align2.resize(trace_len, 0);
    }
}

struct Band {
    offset: usize,
    cols: usize,
}

impl Band {
    fn for_position(position: usize, read_len: usize, truth_len: usize) -> Option<Band> {
        let offset = position.saturating_sub(min_flank_pad());
        let cols = read_len + WINDOW_SLACK;
        if offset + cols > truth_len { None } else { Some(Band { offset, cols }) }
    }

    fn col_range(&self, row: usize) -> (usize, usize) {
        let lo = row.saturating_sub(min_flank_pad());
        let hi = (row + WINDOW_SLACK).min(self.cols);
        (lo, hi)
    }
}

const FROM_MATCH: u8 = 0;
const FROM_INSERT: u8 = 1;
const FROM_DELETE: u8 = 2;

/// Runs the banded Viterbi over the window and fills the scratch matrices.
/// Returns the best terminal (state, column, score).
fn run_viterbi(
    read: &[u8],
    qualities: &[u8],
    band: &Band,
    natural_col: usize,
    model: &MutationModel<'_>,
    scratch: &mut AlignmentScratch,
) -> (u8, usize, u32) {
    let rows = read.len() + 1;
    let cols = band.cols + 1;
    scratch.reserve(rows, cols, read.len());
    let at = |i: usize, j: usize| i * cols + j;

    // Free start anywhere in the left margin of the window
    let (lo, hi) = band.col_range(0);
    for j in lo..=hi {
        scratch.match_cost[at(0, j)] = 0;
    }

    for i in 1..rows {
        let read_base = read[i - 1];
        let quality = qualities[i - 1];
        let (lo, hi) = band.col_range(i);
        for j in lo..=hi {
            let cell = at(i, j);
            // Match / mismatch consumes one read and one truth base
            if j > 0 {
                let prev = at(i - 1, j - 1);
                let (mut best, mut parent) = (scratch.match_cost[prev], FROM_MATCH);
                if scratch.insert_cost[prev] < best {
                    best = scratch.insert_cost[prev];
                    parent = FROM_INSERT;
                }
                if scratch.delete_cost[prev] < best {
                    best = scratch.delete_cost[prev];
                    parent = FROM_DELETE;
                }
                if best < INF {
                    let truth_pos = band.offset + j - 1;
                    scratch.match_cost[cell] =
                        best + model.substitution_cost(read_base, quality, truth_pos);
                    scratch.match_parent[cell] = parent;
                }
            }
            // Insertion consumes one read base
            let above = at(i - 1, j);
            let truth_pos = band.offset + j;
            let open = scratch.match_cost[above]
                .saturating_add(model.gap_open_cost(truth_pos) + u32::from(model.nuc_prior));
            let extend = scratch.insert_cost[above]
                .saturating_add(u32::from(model.gap_extend) + u32::from(model.nuc_prior));
            if open <= extend {
                scratch.insert_cost[cell] = open.min(INF);
                scratch.insert_parent[cell] = FROM_MATCH;
            } else {
                scratch.insert_cost[cell] = extend.min(INF);
                scratch.insert_parent[cell] = FROM_INSERT;
            }
            // Deletion consumes one truth base
            if j > lo {
                let left = at(i, j - 1);
                let truth_pos = band.offset + j - 1;
                let open = scratch.match_cost[left].saturating_add(model.gap_open_cost(truth_pos));
                let extend =
                    scratch.delete_cost[left].saturating_add(u32::from(model.gap_extend));
                if open <= extend {
                    scratch.delete_cost[cell] = open.min(INF);
                    scratch.delete_parent[cell] = FROM_MATCH;
                } else {
                    scratch.delete_cost[cell] = extend.min(INF);
                    scratch.delete_parent[cell] = FROM_DELETE;
                }
            }
        }
    }

    // Free end: best score over the last row, match or insert state; cost
    // ties resolve toward the natural diagonal so a read matching a
    // periodic sequence maps where the aligner placed it
    let (lo, hi) = band.col_range(read.len());
    let mut best = (FROM_MATCH, lo, INF);
    let closer = |j: usize, than: usize| j.abs_diff(natural_col) < than.abs_diff(natural_col);
    for j in lo..=hi {
        let cell = at(read.len(), j);
        for (state, cost) in
            [(FROM_MATCH, scratch.match_cost[cell]), (FROM_INSERT, scratch.insert_cost[cell])]
        {
            if cost < best.2 || (cost == best.2 && cost < INF && closer(j, best.1)) {
                best = (state, j, cost);
            }
        }
    }
    best
}

/// Walks the parent tables back from the best terminal cell, filling the
/// gapped rows `align1`/`align2` and returning `(ops, start_col)` with ops
/// in forward order.
fn traceback(
    read: &[u8],
    band: &Band,
    model: &MutationModel<'_>,
    scratch: &mut AlignmentScratch,
    end_state: u8,
    end_col: usize,
) -> (Vec<CigarOp>, usize) {
    let cols = band.cols + 1;
    let at = |i: usize, j: usize| i * cols + j;
    let mut ops: Vec<CigarOp> = Vec::new();
    let mut push = |kind: CigarOpKind| match ops.last_mut() {
        Some(op) if op.kind == kind => op.len += 1,
        _ => ops.push(CigarOp::new(1, kind)),
    };

    let mut trace: Vec<(u8, u8)> = Vec::new();
    let (mut state, mut i, mut j) = (end_state, read.len(), end_col);
    while i > 0 {
        match state {
            FROM_MATCH => {
                let truth_base = model.truth[band.offset + j - 1];
                let kind = if read[i - 1] == truth_base {
                    CigarOpKind::SequenceMatch
                } else {
                    CigarOpKind::SequenceMismatch
                };
                push(kind);
                trace.push((truth_base, read[i - 1]));
                state = scratch.match_parent[at(i, j)];
                i -= 1;
                j -= 1;
            }
            FROM_INSERT => {
                push(CigarOpKind::Insertion);
                trace.push((GAP_CHAR, read[i - 1]));
                state = scratch.insert_parent[at(i, j)];
                i -= 1;
            }
            _ => {
                push(CigarOpKind::Deletion);
                trace.push((model.truth[band.offset + j - 1], GAP_CHAR));
                state = scratch.delete_parent[at(i, j)];
                j -= 1;
            }
        }
    }

    ops.reverse();
    for (k, (truth_byte, read_byte)) in trace.iter().rev().enumerate() {
        scratch.align1[k] = *truth_byte;
        scratch.align2[k] = *read_byte;
    }
    let trace_len = trace.len();
    scratch.align1[trace_len..].fill(0);
    scratch.align2[trace_len..].fill(0);
    (ops, j)
}

/// Rescores the gapped rows in `align1`/`align2`, accumulating only columns
/// whose truth position lies inside a declared flank. Subtracting this from
/// the full score leaves the non-flank interior's evidence.
fn flank_score(
    first_truth_pos: usize,
    qualities: &[u8],
    model: &MutationModel<'_>,
    align1: &[u8],
    align2: &[u8],
) -> u32 {
    let lhs_end = model.lhs_flank;
    let rhs_begin = model.truth.len() - model.rhs_flank;
    let mut score = 0u32;
    let mut truth_pos = first_truth_pos;
    let mut read_pos = 0usize;
    let mut in_insert = false;
    let mut in_delete = false;
    for k in 0..align1.len() {
        let (truth_byte, read_byte) = (align1[k], align2[k]);
        if truth_byte == 0 || read_byte == 0 {
            break;
        }
        let in_flank = truth_pos < lhs_end || truth_pos >= rhs_begin;
        if truth_byte == GAP_CHAR {
            let cost = if in_insert {
                u32::from(model.gap_extend) + u32::from(model.nuc_prior)
            } else {
                model.gap_open_cost(truth_pos) + u32::from(model.nuc_prior)
            };
            if in_flank {
                score += cost;
            }
            in_insert = true;
            in_delete = false;
            read_pos += 1;
        } else if read_byte == GAP_CHAR {
            let cost = if in_delete {
                u32::from(model.gap_extend)
            } else {
                model.gap_open_cost(truth_pos)
            };
            if in_flank {
                score += cost;
            }
            in_delete = true;
            in_insert = false;
            truth_pos += 1;
        } else {
            if in_flank {
                score += model.substitution_cost(read_byte, qualities[read_pos], truth_pos);
            }
            in_insert = false;
            in_delete = false;
            truth_pos += 1;
            read_pos += 1;
        }
    }
    score
}

fn full_alignment(
    read: &[u8],
    qualities: &[u8],
    mapping_position: usize,
    model: &MutationModel<'_>,
    scratch: &mut AlignmentScratch,
) -> Option<Alignment> {
    let band = Band::for_position(mapping_position, read.len(), model.truth.len())?;
    let natural_col = mapping_position - band.offset + read.len();
    let (state, col, score) = run_viterbi(read, qualities, &band, natural_col, model, scratch);
    if score >= INF {
        return None;
    }
    let (ops, start_col) = traceback(read, &band, model, scratch, state, col);
    let first_truth_pos = band.offset + start_col;
    let corrected = if model.is_in_flank(band.offset, band.cols) {
        let flank =
            flank_score(first_truth_pos, qualities, model, &scratch.align1, &scratch.align2);
        score - flank
    } else {
        score
    };
    Some(Alignment {
        cigar: CigarString::from_ops(ops),
        mapping_position: first_truth_pos,
        likelihood: -LN_10_DIV_10 * f64::from(corrected),
    })
}

/// Scores `read` against the model's truth at `mapping_position`, returning
/// a natural-log likelihood ≤ 0, or [`f64::MIN`] when the alignment window
/// does not fit inside the truth.
///
/// A read matching the truth exactly at its mapping position short-circuits
/// to 0; a single mismatch outside the flanks short-circuits to its cheapest
/// single-edit explanation. Everything else runs the banded Viterbi.
#[must_use]
pub fn evaluate(
    read: &[u8],
    qualities: &[u8],
    mapping_position: usize,
    model: &MutationModel<'_>,
    scratch: &mut AlignmentScratch,
) -> f64 {
    debug_assert_eq!(read.len(), qualities.len());
    if mapping_position + read.len() > model.truth.len() {
        return f64::MIN;
    }
    let window = &model.truth[mapping_position..mapping_position + read.len()];
    let first_mismatch = read.iter().zip(window).position(|(r, t)| r != t);
    let Some(mismatch) = first_mismatch else {
        return 0.0; // equal sequences, can't do better
    };
    if !model.is_in_flank(mapping_position, read.len()) {
        let rest_matches =
            read[mismatch + 1..].iter().zip(&window[mismatch + 1..]).all(|(r, t)| r == t);
        if rest_matches {
            // A lone mismatch: substitution, unless a single-base gap
            // explains the suffix more cheaply
            let truth_pos = mapping_position + mismatch;
            let substitution = model.substitution_cost(read[mismatch], qualities[mismatch], truth_pos);
            let gap_open = model.gap_open_cost(truth_pos);
            let gap_explains = mapping_position + read.len() < model.truth.len()
                && read[mismatch..]
                    .iter()
                    .zip(&model.truth[truth_pos + 1..])
                    .all(|(r, t)| r == t);
            let cost =
                if substitution <= gap_open || !gap_explains { substitution } else { gap_open };
            return -LN_10_DIV_10 * f64::from(cost);
        }
    }
    match full_alignment(read, qualities, mapping_position, model, scratch) {
        Some(alignment) => alignment.likelihood,
        None => f64::MIN,
    }
}

/// Like [`evaluate`] but additionally returns the optimal CIGAR and the
/// chosen mapping position via traceback. Returns `None` when the window
/// does not fit (the sentinel case of [`evaluate`]).
#[must_use]
pub fn align(
    read: &[u8],
    qualities: &[u8],
    mapping_position: usize,
    model: &MutationModel<'_>,
    scratch: &mut AlignmentScratch,
) -> Option<Alignment> {
    debug_assert_eq!(read.len(), qualities.len());
    if mapping_position + read.len() <= model.truth.len()
        && read == &model.truth[mapping_position..mapping_position + read.len()]
    {
        // Equal sequences short-circuit as in evaluate(), keeping the two
        // entry points consistent near the window boundary
        return Some(Alignment {
            cigar: CigarString::from_ops(vec![CigarOp::new(
                read.len() as u32,
                CigarOpKind::SequenceMatch,
            )]),
            mapping_position,
            likelihood: 0.0,
        });
    }
    full_alignment(read, qualities, mapping_position, model, scratch)
}

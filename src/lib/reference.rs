//! Reference genome access.
//!
//! The core consumes reference bases through the [`ReferenceGenome`] trait so
//! that the haplotype builder and priors are independent of how the reference
//! is stored. Two implementations are provided: an in-memory map (used by
//! tests and small targeted runs) and a FASTA-backed reader that preloads
//! every contig into memory at construction for O(1) fetches, shared across
//! worker threads behind `Arc`.

use std::path::Path;
use std::sync::Arc;

use ahash::AHashMap;
use anyhow::Context;
use log::debug;

use crate::errors::{Result, TriocallError};
use crate::region::GenomicRegion;

/// Read-only access to reference genome bases.
///
/// Implementations must be safe to share across worker threads.
pub trait ReferenceGenome: Send + Sync {
    /// Fetches the exact reference bases over `region`, uppercase ACGT/N.
    fn fetch_sequence(&self, region: &GenomicRegion) -> Result<Vec<u8>>;

    /// The total length of the named contig.
    fn contig_size(&self, name: &str) -> Result<u64>;
}

/// A reference genome held entirely in memory, keyed by contig name.
#[derive(Debug, Clone, Default)]
pub struct InMemoryReference {
    contigs: AHashMap<String, Vec<u8>>,
}

impl InMemoryReference {
    /// Creates an empty reference.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a reference from (name, sequence) pairs; sequences are
    /// uppercased on ingest.
    #[must_use]
    pub fn from_contigs<I, N, S>(contigs: I) -> Self
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<String>,
        S: AsRef<[u8]>,
    {
        let contigs = contigs
            .into_iter()
            .map(|(name, seq)| (name.into(), seq.as_ref().to_ascii_uppercase()))
            .collect();
        Self { contigs }
    }

    /// Adds or replaces a contig.
    pub fn insert(&mut self, name: impl Into<String>, sequence: impl AsRef<[u8]>) {
        self.contigs.insert(name.into(), sequence.as_ref().to_ascii_uppercase());
    }

    fn contig(&self, name: &str) -> Result<&Vec<u8>> {
        self.contigs
            .get(name)
            .ok_or_else(|| TriocallError::ContigNotFound { contig: name.to_string() })
    }
}

impl ReferenceGenome for InMemoryReference {
    fn fetch_sequence(&self, region: &GenomicRegion) -> Result<Vec<u8>> {
        let sequence = self.contig(region.contig())?;
        let begin = region.begin() as usize;
        let end = region.end() as usize;
        if end > sequence.len() {
            return Err(TriocallError::OutOfRange {
                begin: region.begin(),
                end: region.end(),
                outer_begin: 0,
                outer_end: sequence.len() as u64,
            });
        }
        Ok(sequence[begin..end].to_vec())
    }

    fn contig_size(&self, name: &str) -> Result<u64> {
        Ok(self.contig(name)?.len() as u64)
    }
}

impl<R: ReferenceGenome + ?Sized> ReferenceGenome for Arc<R> {
    fn fetch_sequence(&self, region: &GenomicRegion) -> Result<Vec<u8>> {
        (**self).fetch_sequence(region)
    }

    fn contig_size(&self, name: &str) -> Result<u64> {
        (**self).contig_size(name)
    }
}

/// Loads a FASTA reference with all contigs preloaded into memory.
///
/// Loading everything upfront trades a few seconds of startup and the
/// genome's worth of memory for O(1) thread-free fetches during calling,
/// which touches reference flanks for every haplotype of every region.
///
/// # Errors
/// Fails if the file cannot be opened or parsed as FASTA.
pub fn load_fasta<P: AsRef<Path>>(path: P) -> anyhow::Result<InMemoryReference> {
    use noodles::fasta;

    let path = path.as_ref();
    debug!("Reading reference FASTA into memory: {}", path.display());

    let mut reader = fasta::io::reader::Builder
        .build_from_path(path)
        .with_context(|| format!("Failed to open FASTA: {}", path.display()))?;

    let mut reference = InMemoryReference::new();
    let mut count = 0usize;
    for result in reader.records() {
        let record = result?;
        let name = std::str::from_utf8(record.name())?.to_string();
        let sequence: &[u8] = record.sequence().as_ref();
        reference.insert(name, sequence);
        count += 1;
    }

    debug!("Loaded {count} contigs into memory");
    Ok(reference)
}

//! Variant call records and the annotation registry.
//!
//! Calls are a tagged variant over the kinds the caller can emit; the
//! germline/trio pipeline produces `Germline` and `Denovo` calls, the other
//! tags are the extension points for the somatic and single-cell callers.
//! Each record carries the called variant, the per-sample genotype calls,
//! and a Phred-scale posterior. Annotations (MP, PP, the DENOVO flag) are
//! attached by routines looked up per call tag in [`AnnotatorRegistry`]; a
//! tag with no registered routine is a fatal configuration error.

use ahash::AHashMap;

use crate::allele::Variant;
use crate::errors::{Result, TriocallError};
use crate::genotype::AlleleGenotype;

/// A per-sample called genotype with its Phred posterior.
#[derive(Debug, Clone, PartialEq)]
pub struct GenotypeCall {
    /// Sample name
    pub sample: String,
    /// The called allele-level genotype over the record's region
    pub genotype: AlleleGenotype,
    /// Phred-scale posterior of the genotype
    pub posterior: f64,
}

/// A called variant with per-sample genotypes.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantCall {
    /// The called variant
    pub variant: Variant,
    /// Genotype call per sample
    pub genotype_calls: Vec<GenotypeCall>,
    /// Phred-scale posterior of the variant
    pub posterior: f64,
}

/// A called de novo variant: present in the child, absent in both parents.
#[derive(Debug, Clone, PartialEq)]
pub struct DenovoCall {
    /// The called variant
    pub variant: Variant,
    /// Genotype call per sample
    pub genotype_calls: Vec<GenotypeCall>,
    /// Phred-scale posterior that the allele is de novo
    pub posterior: f64,
}

/// The kinds of call the pipeline can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallType {
    /// Inherited germline variant
    Germline,
    /// Somatic variant (tumour/normal extension point)
    Somatic,
    /// De novo germline variant in the child
    Denovo,
    /// Confident reference (non-variant) site
    Reference,
    /// Single-cell variant (cell-level extension point)
    CellVariant,
}

impl CallType {
    /// The tag's display name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Germline => "Germline",
            Self::Somatic => "Somatic",
            Self::Denovo => "Denovo",
            Self::Reference => "Reference",
            Self::CellVariant => "CellVariant",
        }
    }
}

/// A call record, tagged by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    /// Inherited germline variant
    Germline(VariantCall),
    /// Somatic variant
    Somatic(VariantCall),
    /// De novo variant
    Denovo(DenovoCall),
    /// Confident reference site
    Reference(VariantCall),
    /// Single-cell variant
    CellVariant(VariantCall),
}

impl Call {
    /// The record's tag.
    #[must_use]
    pub fn call_type(&self) -> CallType {
        match self {
            Self::Germline(_) => CallType::Germline,
            Self::Somatic(_) => CallType::Somatic,
            Self::Denovo(_) => CallType::Denovo,
            Self::Reference(_) => CallType::Reference,
            Self::CellVariant(_) => CallType::CellVariant,
        }
    }

    /// The called variant.
    #[must_use]
    pub fn variant(&self) -> &Variant {
        match self {
            Self::Germline(call)
            | Self::Somatic(call)
            | Self::Reference(call)
            | Self::CellVariant(call) => &call.variant,
            Self::Denovo(call) => &call.variant,
        }
    }

    /// The record's Phred posterior.
    #[must_use]
    pub fn posterior(&self) -> f64 {
        match self {
            Self::Germline(call)
            | Self::Somatic(call)
            | Self::Reference(call)
            | Self::CellVariant(call) => call.posterior,
            Self::Denovo(call) => call.posterior,
        }
    }

    /// The per-sample genotype calls.
    #[must_use]
    pub fn genotype_calls(&self) -> &[GenotypeCall] {
        match self {
            Self::Germline(call)
            | Self::Somatic(call)
            | Self::Reference(call)
            | Self::CellVariant(call) => &call.genotype_calls,
            Self::Denovo(call) => &call.genotype_calls,
        }
    }
}

/// A key/value annotation attached to an emitted record.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// Annotation identifier (e.g. "PP", "DENOVO")
    pub id: String,
    /// Rendered value; empty for flags
    pub value: String,
}

impl Annotation {
    fn new(id: &str, value: impl Into<String>) -> Self {
        Self { id: id.to_string(), value: value.into() }
    }
}

/// The routine producing a call tag's annotations.
pub type Annotator = fn(&Call) -> Vec<Annotation>;

fn format_phred(value: f64) -> String {
    if value.is_infinite() { "inf".to_string() } else { format!("{value:.2}") }
}

fn annotate_variant(call: &Call) -> Vec<Annotation> {
    vec![
        Annotation::new("MP", format_phred(call.posterior())),
        Annotation::new("PP", format_phred(call.posterior())),
    ]
}

fn annotate_denovo(call: &Call) -> Vec<Annotation> {
    let mut annotations = annotate_variant(call);
    annotations.push(Annotation::new("DENOVO", ""));
    annotations
}

/// Maps call tags to annotation routines.
pub struct AnnotatorRegistry {
    annotators: AHashMap<CallType, Annotator>,
}

impl Default for AnnotatorRegistry {
    fn default() -> Self {
        let mut annotators: AHashMap<CallType, Annotator> = AHashMap::new();
        annotators.insert(CallType::Germline, annotate_variant as Annotator);
        annotators.insert(CallType::Reference, annotate_variant as Annotator);
        annotators.insert(CallType::Denovo, annotate_denovo as Annotator);
        Self { annotators }
    }
}

impl AnnotatorRegistry {
    /// Creates the registry with routines for the trio pipeline's tags.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a routine for a tag.
    pub fn register(&mut self, call_type: CallType, annotator: Annotator) {
        self.annotators.insert(call_type, annotator);
    }

    /// Runs the tag's routine for `call`.
    ///
    /// # Errors
    /// [`TriocallError::UnregisteredCallType`] when the tag has no routine.
    pub fn annotate(&self, call: &Call) -> Result<Vec<Annotation>> {
        let call_type = call.call_type();
        let annotator = self.annotators.get(&call_type).ok_or_else(|| {
            TriocallError::UnregisteredCallType { call_type: call_type.name().to_string() }
        })?;
        Ok(annotator(call))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::GenomicRegion;

    fn variant() -> Variant {
        Variant::new(GenomicRegion::new("chr1", 100, 101), b"A".to_vec(), b"T".to_vec())
    }

    fn germline_call() -> Call {
        Call::Germline(VariantCall {
            variant: variant(),
            genotype_calls: Vec::new(),
            posterior: 42.5,
        })
    }

    fn denovo_call() -> Call {
        Call::Denovo(DenovoCall {
            variant: variant(),
            genotype_calls: Vec::new(),
            posterior: 13.0,
        })
    }

    #[test]
    fn test_call_accessors() {
        let call = germline_call();
        assert_eq!(call.call_type(), CallType::Germline);
        assert_eq!(call.variant(), &variant());
        assert!((call.posterior() - 42.5).abs() < f64::EPSILON);
        assert!(call.genotype_calls().is_empty());
    }

    #[test]
    fn test_default_registry_annotates_trio_tags() {
        let registry = AnnotatorRegistry::new();

        let annotations = registry.annotate(&germline_call()).unwrap();
        assert!(annotations.iter().any(|a| a.id == "PP"));
        assert!(annotations.iter().any(|a| a.id == "MP"));
        assert!(!annotations.iter().any(|a| a.id == "DENOVO"));

        let annotations = registry.annotate(&denovo_call()).unwrap();
        assert!(annotations.iter().any(|a| a.id == "DENOVO"));
        assert!(annotations.iter().any(|a| a.id == "PP" && a.value == "13.00"));
    }

    #[test]
    fn test_unregistered_call_type() {
        let registry = AnnotatorRegistry::new();
        let somatic = Call::Somatic(VariantCall {
            variant: variant(),
            genotype_calls: Vec::new(),
            posterior: 10.0,
        });
        assert!(matches!(
            registry.annotate(&somatic),
            Err(TriocallError::UnregisteredCallType { .. })
        ));
    }

    #[test]
    fn test_register_extension_tag() {
        let mut registry = AnnotatorRegistry::new();
        registry.register(CallType::Somatic, annotate_variant);
        let somatic = Call::Somatic(VariantCall {
            variant: variant(),
            genotype_calls: Vec::new(),
            posterior: 10.0,
        });
        assert!(registry.annotate(&somatic).is_ok());
    }
}

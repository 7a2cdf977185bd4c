//! Variant annotation types shared by readers and stores

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Result, TypesError};

/// A 1-based, inclusive genomic interval on one chromosome
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenomicLocation {
    pub chromosome: String,
    pub start: u64,
    pub end: u64,
}

impl GenomicLocation {
    pub fn new(chromosome: impl Into<String>, start: u64, end: u64) -> Result<Self> {
        if end < start {
            return Err(TypesError::InvertedRange { start, end });
        }
        Ok(Self {
            chromosome: chromosome.into(),
            start,
            end,
        })
    }
}

/// Parses `chr:start` or `chr:start-end`
impl std::str::FromStr for GenomicLocation {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self> {
        let (chromosome, range) = s
            .rsplit_once(':')
            .filter(|(chr, range)| !chr.is_empty() && !range.is_empty())
            .ok_or_else(|| TypesError::InvalidLocation(s.to_string()))?;

        let (start, end) = match range.split_once('-') {
            Some((start, end)) => (parse_position(start)?, parse_position(end)?),
            None => {
                let pos = parse_position(range)?;
                (pos, pos)
            },
        };

        Self::new(chromosome, start, end)
    }
}

impl std::fmt::Display for GenomicLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.start == self.end {
            write!(f, "{}:{}", self.chromosome, self.start)
        } else {
            write!(f, "{}:{}-{}", self.chromosome, self.start, self.end)
        }
    }
}

fn parse_position(s: &str) -> Result<u64> {
    match s.trim().parse::<u64>() {
        Ok(pos) if pos > 0 => Ok(pos),
        _ => Err(TypesError::InvalidPosition(s.to_string())),
    }
}

/// Identity of a variant in the clinical store
///
/// Two annotations with the same key describe the same variant, whatever
/// order they were read in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VariantKey {
    pub chromosome: String,
    pub start: u64,
    pub reference: String,
    pub alternate: String,
}

impl std::fmt::Display for VariantKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.chromosome, self.start, self.reference, self.alternate
        )
    }
}

/// Normalizes an allele string; `-` is the empty allele of indels
pub fn normalize_allele(allele: &str) -> Result<String> {
    let allele = allele.trim();
    if allele == "-" {
        return Ok(String::new());
    }
    if allele.is_empty() || !allele.chars().all(|c| c.is_ascii_alphabetic() || c == '*') {
        return Err(TypesError::InvalidAllele(allele.to_string()));
    }
    Ok(allele.to_ascii_uppercase())
}

/// Effect of a variant on one transcript or regulatory feature
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsequenceType {
    pub gene_id: Option<String>,
    pub feature_id: Option<String>,
    pub feature_type: Option<String>,
    /// Sequence Ontology terms, e.g. `missense_variant`
    pub so_terms: Vec<String>,
    pub cdna_position: Option<String>,
    pub cds_position: Option<String>,
    pub protein_position: Option<String>,
    pub amino_acids: Option<String>,
    pub codons: Option<String>,
    /// Free-form `KEY=value` attributes (SIFT, PolyPhen, HGVS, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

/// All externally computed annotation for one variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantAnnotation {
    /// Identifier as given by the annotation file
    pub id: String,
    pub location: GenomicLocation,
    pub reference: String,
    pub alternate: String,
    /// Co-located known variants (dbSNP, COSMIC, ...)
    #[serde(default)]
    pub known_variants: Vec<String>,
    #[serde(default)]
    pub consequence_types: Vec<ConsequenceType>,
}

impl VariantAnnotation {
    pub fn key(&self) -> VariantKey {
        VariantKey {
            chromosome: self.location.chromosome.clone(),
            start: self.location.start,
            reference: self.reference.clone(),
            alternate: self.alternate.clone(),
        }
    }

    /// Distinct SO terms across all consequence types, in first-seen order
    pub fn so_terms(&self) -> Vec<&str> {
        let mut terms: Vec<&str> = Vec::new();
        for term in self.consequence_types.iter().flat_map(|ct| ct.so_terms.iter()) {
            if !terms.contains(&term.as_str()) {
                terms.push(term.as_str());
            }
        }
        terms
    }
}

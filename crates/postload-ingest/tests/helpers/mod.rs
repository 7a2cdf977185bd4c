//! Test helpers for post-load integration tests
//!
//! - recording doubles for the annotation source, clinical store and
//!   progress reporter
//! - VEP fixture writers

#![allow(dead_code)]

use async_trait::async_trait;
use postload_common::types::{ConsequenceType, GenomicLocation, VariantAnnotation};
use postload_ingest::error::{SourceError, StoreError};
use postload_ingest::params::{self, Assembly, ValidatedParams};
use postload_ingest::progress::ProgressReporter;
use postload_ingest::source::AnnotationSource;
use postload_ingest::store::{ClinicalStore, MergeOptions};
use std::io::Write;
use std::sync::Mutex;

pub const VEP_HEADER: &str = "## ENSEMBL VARIANT EFFECT PREDICTOR v78\n\
    #Uploaded_variation\tLocation\tAllele\tGene\tFeature\tFeature_type\tConsequence\tcDNA_position\tCDS_position\tProtein_position\tAmino_acids\tCodons\tExisting_variation\tExtra\n";

/// Distinct annotation number `i` (1-based position on chromosome 1)
pub fn annotation(i: usize) -> VariantAnnotation {
    let start = i as u64 + 1;
    VariantAnnotation {
        id: format!("1_{}_A/G", start),
        location: GenomicLocation {
            chromosome: "1".to_string(),
            start,
            end: start,
        },
        reference: "A".to_string(),
        alternate: "G".to_string(),
        known_variants: vec![],
        consequence_types: vec![ConsequenceType {
            gene_id: Some("ENSG00000139618".to_string()),
            so_terms: vec!["missense_variant".to_string()],
            ..Default::default()
        }],
    }
}

/// VEP file with `variants` variants, two consequence lines each
pub fn write_vep_fixture(variants: usize) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".vep")
        .tempfile()
        .expect("Failed to create VEP fixture");
    file.write_all(VEP_HEADER.as_bytes()).expect("Failed to write header");
    for i in 0..variants {
        let start = i + 1;
        for feature in ["ENST00000380152", "ENST00000544455"] {
            writeln!(
                file,
                "1_{start}_A/G\t1:{start}\tG\tENSG00000139618\t{feature}\tTranscript\tmissense_variant\t100\t80\t27\tA/T\tgCa/gTa\t-\tIMPACT=MODERATE"
            )
            .expect("Failed to write VEP line");
        }
    }
    file.flush().expect("Failed to flush VEP fixture");
    file
}

/// Validated parameters for an existing file
pub fn validated(path: &std::path::Path, batch_size: usize) -> ValidatedParams {
    params::validate(Some(path), Some("GRCh37"))
        .expect("Fixture parameters should validate")
        .with_batch_size(batch_size)
        .expect("Batch size should be valid")
}

/// In-memory source that records every lifecycle call
pub struct RecordingSource {
    pub calls: Vec<&'static str>,
    total: usize,
    served: usize,
    pub fail_read_at: Option<usize>,
    pub fail_close: bool,
    reads: usize,
}

impl RecordingSource {
    pub fn new(total: usize) -> Self {
        Self {
            calls: Vec::new(),
            total,
            served: 0,
            fail_read_at: None,
            fail_close: false,
            reads: 0,
        }
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.iter().filter(|c| **c == call).count()
    }
}

impl AnnotationSource for RecordingSource {
    fn identifier(&self) -> String {
        "memory://clinical.vep".to_string()
    }

    fn open(&mut self) -> Result<(), SourceError> {
        self.calls.push("open");
        Ok(())
    }

    fn pre(&mut self) -> Result<(), SourceError> {
        self.calls.push("pre");
        Ok(())
    }

    fn read_batch(&mut self, max_size: usize) -> Result<Vec<VariantAnnotation>, SourceError> {
        self.calls.push("read");
        self.reads += 1;
        if self.fail_read_at == Some(self.reads) {
            return Err(SourceError::parse(self.served + 1, "truncated record"));
        }

        let end = (self.served + max_size).min(self.total);
        let batch = (self.served..end).map(annotation).collect();
        self.served = end;
        Ok(batch)
    }

    fn post(&mut self) -> Result<(), SourceError> {
        self.calls.push("post");
        Ok(())
    }

    fn close(&mut self) -> Result<(), SourceError> {
        self.calls.push("close");
        if self.fail_close {
            return Err(SourceError::Close("file handle already released".to_string()));
        }
        Ok(())
    }
}

/// Store that records batch sizes and can fail on the k-th merge
#[derive(Default)]
pub struct RecordingStore {
    merges: Mutex<Vec<usize>>,
    fail_at: Option<usize>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_at(merge: usize) -> Self {
        Self {
            merges: Mutex::new(Vec::new()),
            fail_at: Some(merge),
        }
    }

    /// Sizes of the batches that were merged successfully
    pub fn merged_sizes(&self) -> Vec<usize> {
        self.merges.lock().expect("merge log poisoned").clone()
    }
}

#[async_trait]
impl ClinicalStore for RecordingStore {
    async fn merge_annotations(
        &self,
        _species: &str,
        _assembly: Assembly,
        batch: &[VariantAnnotation],
        _options: &MergeOptions,
    ) -> Result<(), StoreError> {
        let mut merges = self.merges.lock().expect("merge log poisoned");
        if self.fail_at == Some(merges.len() + 1) {
            return Err(StoreError::Rejected("connection reset by peer".to_string()));
        }
        merges.push(batch.len());
        Ok(())
    }
}

/// Reporter that keeps every emission
#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub reports: Vec<usize>,
    pub summaries: Vec<(usize, String)>,
}

impl ProgressReporter for RecordingReporter {
    fn report(&mut self, cumulative: usize, _context: &str) {
        self.reports.push(cumulative);
    }

    fn finish(&mut self, total: usize, source: &str) {
        self.summaries.push((total, source.to_string()));
    }
}

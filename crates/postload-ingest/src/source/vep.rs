//! Reader for tab-delimited VEP output
//!
//! Expects the default VEP text format: `##` meta lines, one
//! `#Uploaded_variation` header and 14 tab-separated columns per line
//!
//! ```text
//! Uploaded_variation  Location  Allele  Gene  Feature  Feature_type  Consequence
//! cDNA_position  CDS_position  Protein_position  Amino_acids  Codons
//! Existing_variation  Extra
//! ```
//!
//! VEP writes one line per (variant, allele, feature). Consecutive lines for
//! the same uploaded variation and allele are grouped into a single
//! [`VariantAnnotation`] with one [`ConsequenceType`] per line. Files ending
//! in `.gz` are decompressed on the fly.

use flate2::read::MultiGzDecoder;
use postload_common::types::{normalize_allele, ConsequenceType, GenomicLocation, VariantAnnotation};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use super::AnnotationSource;
use crate::error::SourceError;

const HEADER_PREFIX: &str = "#Uploaded_variation";
const MIN_COLUMNS: usize = 13;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    Closed,
    Opened,
    Ready,
    Finished,
}

/// Streaming VEP reader
pub struct VepReader {
    path: PathBuf,
    reader: Option<Box<dyn BufRead + Send>>,
    state: ReaderState,
    line_no: usize,
    /// First data line, when `pre` had to read past the header to find it
    lookahead: Option<String>,
    /// Variant whose group may continue on the next line
    pending: Option<VariantAnnotation>,
    variants_read: usize,
}

impl VepReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            reader: None,
            state: ReaderState::Closed,
            line_no: 0,
            lookahead: None,
            pending: None,
            variants_read: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_gzip(&self) -> bool {
        self.path.extension().is_some_and(|ext| ext == "gz")
    }

    /// Next non-blank line, or `None` at end of file
    fn next_line(&mut self) -> Result<Option<String>, SourceError> {
        if let Some(line) = self.lookahead.take() {
            return Ok(Some(line));
        }

        let reader = self.reader.as_mut().ok_or(SourceError::NotOpen("read"))?;
        let mut buf = String::new();
        loop {
            buf.clear();
            let n = reader.read_line(&mut buf).map_err(|source| SourceError::Read {
                line: self.line_no + 1,
                source,
            })?;
            if n == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            let line = buf.trim_end_matches(['\n', '\r']);
            if !line.trim().is_empty() {
                return Ok(Some(line.to_string()));
            }
        }
    }
}

impl AnnotationSource for VepReader {
    fn identifier(&self) -> String {
        self.path.display().to_string()
    }

    fn open(&mut self) -> Result<(), SourceError> {
        if self.state != ReaderState::Closed {
            return Err(SourceError::NotOpen("open called twice"));
        }

        let file = File::open(&self.path).map_err(|source| SourceError::Open {
            path: self.path.clone(),
            source,
        })?;

        let reader: Box<dyn BufRead + Send> = if self.is_gzip() {
            Box::new(BufReader::new(MultiGzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        };

        self.reader = Some(reader);
        self.state = ReaderState::Opened;
        self.line_no = 0;
        self.variants_read = 0;
        Ok(())
    }

    /// Skip meta lines and validate the column header
    fn pre(&mut self) -> Result<(), SourceError> {
        if self.state != ReaderState::Opened {
            return Err(SourceError::NotOpen("pre"));
        }

        while let Some(line) = self.next_line()? {
            if line.starts_with("##") {
                trace!(line = self.line_no, "Skipping VEP meta line");
                continue;
            }
            if line.starts_with('#') {
                if !line.starts_with(HEADER_PREFIX) {
                    return Err(SourceError::parse(
                        self.line_no,
                        format!("expected '{}' header", HEADER_PREFIX),
                    ));
                }
                continue;
            }
            self.lookahead = Some(line);
            break;
        }

        self.state = ReaderState::Ready;
        Ok(())
    }

    fn read_batch(&mut self, max_size: usize) -> Result<Vec<VariantAnnotation>, SourceError> {
        match self.state {
            ReaderState::Ready => {},
            ReaderState::Finished => return Ok(Vec::new()),
            ReaderState::Closed | ReaderState::Opened => return Err(SourceError::NotOpen("read")),
        }

        let mut batch = Vec::with_capacity(max_size.min(4096));
        while batch.len() < max_size {
            let Some(line) = self.next_line()? else {
                batch.extend(self.pending.take());
                self.state = ReaderState::Finished;
                break;
            };

            let row = parse_row(self.line_no, &line)?;
            match self.pending.as_mut() {
                Some(current) if row.continues(current) => {
                    current.consequence_types.push(row.consequence);
                    merge_known_variants(&mut current.known_variants, row.known_variants);
                },
                _ => {
                    if let Some(done) = self.pending.replace(row.into_annotation()) {
                        batch.push(done);
                    }
                },
            }
        }

        self.variants_read += batch.len();
        Ok(batch)
    }

    fn post(&mut self) -> Result<(), SourceError> {
        debug!(
            path = %self.path.display(),
            lines = self.line_no,
            variants = self.variants_read,
            "Finished reading VEP file"
        );
        Ok(())
    }

    fn close(&mut self) -> Result<(), SourceError> {
        if self.state == ReaderState::Closed {
            return Err(SourceError::NotOpen("close called twice"));
        }
        self.reader = None;
        self.lookahead = None;
        self.pending = None;
        self.state = ReaderState::Closed;
        Ok(())
    }
}

/// One parsed VEP line
struct VepRow {
    id: String,
    location: GenomicLocation,
    reference: String,
    alternate: String,
    known_variants: Vec<String>,
    consequence: ConsequenceType,
}

impl VepRow {
    fn continues(&self, current: &VariantAnnotation) -> bool {
        self.id == current.id && self.alternate == current.alternate
    }

    fn into_annotation(self) -> VariantAnnotation {
        VariantAnnotation {
            id: self.id,
            location: self.location,
            reference: self.reference,
            alternate: self.alternate,
            known_variants: self.known_variants,
            consequence_types: vec![self.consequence],
        }
    }
}

fn parse_row(line_no: usize, line: &str) -> Result<VepRow, SourceError> {
    let cols: Vec<&str> = line.split('\t').collect();
    if cols.len() < MIN_COLUMNS {
        return Err(SourceError::parse(
            line_no,
            format!("expected at least {} columns, found {}", MIN_COLUMNS, cols.len()),
        ));
    }

    let id = cols[0].trim().to_string();
    if id.is_empty() {
        return Err(SourceError::parse(line_no, "empty Uploaded_variation"));
    }

    let location: GenomicLocation = cols[1]
        .parse()
        .map_err(|e| SourceError::parse(line_no, format!("{}", e)))?;
    let alternate =
        normalize_allele(cols[2]).map_err(|e| SourceError::parse(line_no, format!("{}", e)))?;
    let reference = reference_from_id(&id).unwrap_or_default();

    let consequence = ConsequenceType {
        gene_id: field(cols[3]),
        feature_id: field(cols[4]),
        feature_type: field(cols[5]),
        so_terms: list(cols[6], ','),
        cdna_position: field(cols[7]),
        cds_position: field(cols[8]),
        protein_position: field(cols[9]),
        amino_acids: field(cols[10]),
        codons: field(cols[11]),
        extra: cols.get(13).map(|raw| parse_extra(raw)).unwrap_or_default(),
    };

    Ok(VepRow {
        id,
        location,
        reference,
        alternate,
        known_variants: list(cols[12], ','),
        consequence,
    })
}

/// `-` marks an empty VEP column
fn field(raw: &str) -> Option<String> {
    match raw.trim() {
        "" | "-" => None,
        value => Some(value.to_string()),
    }
}

fn list(raw: &str, separator: char) -> Vec<String> {
    field(raw)
        .map(|value| {
            value
                .split(separator)
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// `KEY=value;FLAG;...`; flags without a value map to an empty string
fn parse_extra(raw: &str) -> BTreeMap<String, String> {
    list(raw, ';')
        .into_iter()
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (entry, String::new()),
        })
        .collect()
}

/// Reference allele from ids shaped like `chr_pos_ref/alt`
fn reference_from_id(id: &str) -> Option<String> {
    let (_, alleles) = id.rsplit_once('_')?;
    let (reference, _) = alleles.split_once('/')?;
    normalize_allele(reference).ok()
}

fn merge_known_variants(known: &mut Vec<String>, more: Vec<String>) {
    for id in more {
        if !known.contains(&id) {
            known.push(id);
        }
    }
}

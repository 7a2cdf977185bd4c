//! CellBase clinical post-load
//!
//! Loads variant effect annotations (VEP output) into the clinical
//! annotation store of one species/assembly, in bounded batches.
//!
//! # Pipeline
//!
//! 1. [`params::validate`] checks the input file and assembly
//! 2. [`resolver::resolve`] maps species + assembly onto a database
//! 3. [`ingestor::BatchIngestor`] reads batches from an
//!    [`source::AnnotationSource`] and merges them into a
//!    [`store::ClinicalStore`], reporting progress after each batch
//!
//! # Example
//!
//! ```no_run
//! use postload_ingest::{progress::LogReporter, run_post_load, PostLoadOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let options = PostLoadOptions {
//!         input: Some("./data/clinical.vep.gz".into()),
//!         assembly: Some("GRCh37".to_string()),
//!         ..Default::default()
//!     };
//!     let summary = run_post_load(&options, &mut LogReporter).await?;
//!     println!("{}", summary);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod error;
pub mod ingestor;
pub mod params;
pub mod progress;
pub mod resolver;
pub mod source;
pub mod store;

pub use error::{
    ConfigurationError, IngestionError, PostLoadError, Result, SourceError, StoreError,
};
pub use ingestor::{BatchIngestor, IngestionSummary, RunState};
pub use params::{Assembly, ValidatedParams};

use std::path::PathBuf;
use tracing::info;

use config::{ClusterConfig, DEFAULT_SPECIES};
use progress::ProgressReporter;
use source::VepReader;
use store::{ClinicalStore, MemoryClinicalStore, MergeOptions, PgClinicalStore};

/// Inputs of one post-load invocation
#[derive(Debug, Clone)]
pub struct PostLoadOptions {
    pub input: Option<PathBuf>,
    pub assembly: Option<String>,
    pub species: String,
    /// Cluster configuration file (JSON or TOML)
    pub config_path: Option<PathBuf>,
    pub batch_size: usize,
    pub merge_options: MergeOptions,
    /// Merge into an in-memory store instead of the database
    pub dry_run: bool,
}

impl Default for PostLoadOptions {
    fn default() -> Self {
        Self {
            input: None,
            assembly: None,
            species: DEFAULT_SPECIES.to_string(),
            config_path: None,
            batch_size: params::DEFAULT_BATCH_SIZE,
            merge_options: MergeOptions::default(),
            dry_run: false,
        }
    }
}

/// Validate, resolve and ingest one clinical annotation file
pub async fn run_post_load(
    options: &PostLoadOptions,
    reporter: &mut dyn ProgressReporter,
) -> Result<IngestionSummary> {
    let params = params::validate(options.input.as_deref(), options.assembly.as_deref())?
        .with_batch_size(options.batch_size)?;

    let store: Box<dyn ClinicalStore> = if options.dry_run {
        info!("Dry run: annotations are merged into an in-memory store");
        Box::new(MemoryClinicalStore::new())
    } else {
        let cluster = ClusterConfig::load(options.config_path.as_deref())?;
        let target = resolver::resolve(&options.species, params.assembly(), &cluster)?;
        Box::new(PgClinicalStore::connect_lazy(&target))
    };

    info!(
        input = %params.input().display(),
        species = %options.species,
        assembly = %params.assembly(),
        batch_size = params.batch_size(),
        "Loading clinical annotations"
    );

    let mut reader = VepReader::new(params.input());
    BatchIngestor::new(store.as_ref(), options.species.clone(), &params)
        .with_options(options.merge_options.clone())
        .ingest(&mut reader, reporter)
        .await
        .map_err(|source| PostLoadError::Ingestion {
            path: params.input().to_path_buf(),
            source,
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_configuration_errors_come_first() {
        let options = PostLoadOptions {
            input: None,
            assembly: Some("hg19".to_string()),
            ..Default::default()
        };
        let err = run_post_load(&options, &mut progress::LogReporter)
            .await
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_zero_batch_size_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let options = PostLoadOptions {
            input: Some(file.path().to_path_buf()),
            assembly: Some("GRCh38".to_string()),
            batch_size: 0,
            dry_run: true,
            ..Default::default()
        };
        let err = run_post_load(&options, &mut progress::LogReporter)
            .await
            .unwrap_err();
        assert!(err.is_configuration());
    }
}

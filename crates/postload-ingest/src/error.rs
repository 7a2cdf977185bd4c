//! Error types for the post-load pipeline
//!
//! Each failure kind maps to one phase of a run:
//!
//! - [`ConfigurationError`]: pre-flight inputs, raised before any I/O against
//!   the annotation file or the store
//! - [`SourceError`]: opening, reading or closing the annotation stream
//! - [`StoreError`]: merging a batch into the clinical store
//!
//! The ingestor wraps the last two in [`IngestionError`], and everything
//! reaches the caller as a [`PostLoadError`] with the cause chain intact.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for post-load operations
pub type Result<T> = std::result::Result<T, PostLoadError>;

/// Invalid or missing pre-flight input
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Configuration error: {message}")]
pub struct ConfigurationError {
    message: String,
}

impl ConfigurationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Failure of the annotation source
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to open annotation file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read annotation file at line {line}: {source}")]
    Read {
        line: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed annotation at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Annotation source used outside its open/close bracket: {0}")]
    NotOpen(&'static str),

    #[error("Failed to close annotation source: {0}")]
    Close(String),
}

impl SourceError {
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}

/// Failure of the clinical store adaptor
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to serialize annotation {key}: {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Store rejected merge: {0}")]
    Rejected(String),
}

/// A run that started but could not finish
#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Annotation source failed")]
    Source(#[from] SourceError),

    #[error("Merge of batch {batch} ({records} records) failed")]
    Store {
        batch: usize,
        records: usize,
        #[source]
        source: StoreError,
    },
}

impl IngestionError {
    /// The store failure behind this error, if any
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            IngestionError::Store { source, .. } => Some(source),
            IngestionError::Source(_) => None,
        }
    }
}

/// Any failure of one post-load invocation
#[derive(Error, Debug)]
pub enum PostLoadError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Ingestion of {path} failed")]
    Ingestion {
        path: PathBuf,
        #[source]
        source: IngestionError,
    },
}

impl PostLoadError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, PostLoadError::Configuration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_cause_chain_reaches_store_error() {
        let err = PostLoadError::Ingestion {
            path: PathBuf::from("clinvar.vep"),
            source: IngestionError::Store {
                batch: 3,
                records: 1000,
                source: StoreError::Rejected("duplicate key".to_string()),
            },
        };

        let chain: Vec<String> = std::iter::successors(Some(&err as &dyn std::error::Error), |&e| {
            e.source()
        })
        .map(|e| e.to_string())
        .collect();

        assert_eq!(
            chain,
            vec![
                "Ingestion of clinvar.vep failed".to_string(),
                "Merge of batch 3 (1000 records) failed".to_string(),
                "Store rejected merge: duplicate key".to_string(),
            ]
        );
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_configuration_error_is_transparent() {
        let err: PostLoadError = ConfigurationError::new("Input file x doesn't exist").into();
        assert!(err.is_configuration());
        assert_eq!(err.to_string(), "Configuration error: Input file x doesn't exist");
        assert!(err.source().is_none());
    }
}

//! Error types for the shared annotation model

use thiserror::Error;

/// Result type alias for operations on the shared types
pub type Result<T> = std::result::Result<T, TypesError>;

/// Failure to build an annotation type from its textual form
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypesError {
    #[error("Invalid genomic location '{0}': expected 'chr:start' or 'chr:start-end'")]
    InvalidLocation(String),

    #[error("Invalid position '{0}': expected a positive integer")]
    InvalidPosition(String),

    #[error("Invalid range {start}-{end}: end precedes start")]
    InvertedRange { start: u64, end: u64 },

    #[error("Invalid allele '{0}'")]
    InvalidAllele(String),
}

//! Post-load Common Library
//!
//! Shared types and utilities for the post-load workspace.
//!
//! - **Logging**: one `tracing` setup for every binary
//! - **Types**: variant annotation records as read from annotation files
//!   and merged into the clinical store
//! - **Errors**: failures raised while building those types
//!
//! # Example
//!
//! ```
//! use postload_common::types::GenomicLocation;
//!
//! let location: GenomicLocation = "13:32914437-32914438".parse().unwrap();
//! assert_eq!(location.chromosome, "13");
//! assert_eq!(location.end, 32914438);
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod error;
pub mod logging;
pub mod types;

pub use error::{Result, TypesError};

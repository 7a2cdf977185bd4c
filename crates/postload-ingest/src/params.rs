//! Pre-flight parameter validation
//!
//! Nothing touches the annotation file or the store until [`validate`] has
//! accepted the inputs. The ingestor only takes a [`ValidatedParams`], which
//! can only be built here.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::ConfigurationError;

/// Default number of annotations merged per store call
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Supported human genome assemblies
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Assembly {
    #[serde(rename = "GRCh37")]
    GRCh37,
    #[serde(rename = "GRCh38")]
    GRCh38,
}

impl Assembly {
    pub const ALL: [Assembly; 2] = [Assembly::GRCh37, Assembly::GRCh38];

    pub fn as_str(self) -> &'static str {
        match self {
            Assembly::GRCh37 => "GRCh37",
            Assembly::GRCh38 => "GRCh38",
        }
    }

    fn available() -> String {
        Self::ALL.map(Assembly::as_str).join(", ")
    }
}

impl std::str::FromStr for Assembly {
    type Err = ConfigurationError;

    /// Exact, case-sensitive match against the whitelist
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|assembly| assembly.as_str() == s)
            .ok_or_else(|| {
                ConfigurationError::new(format!(
                    "Please, provide a valid human assembly. Available assemblies: {}",
                    Self::available()
                ))
            })
    }
}

impl std::fmt::Display for Assembly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs that passed every pre-flight check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedParams {
    input: PathBuf,
    assembly: Assembly,
    batch_size: usize,
}

impl ValidatedParams {
    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn assembly(&self) -> Assembly {
        self.assembly
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Override the batch size; zero is rejected
    pub fn with_batch_size(mut self, batch_size: usize) -> Result<Self, ConfigurationError> {
        if batch_size == 0 {
            return Err(ConfigurationError::new("Batch size must be greater than 0"));
        }
        self.batch_size = batch_size;
        Ok(self)
    }
}

/// Check the input file and assembly of a post-load invocation
///
/// The input file is checked first (present, exists, not a directory), then
/// the assembly (present, whitelisted). Only filesystem metadata is read.
pub fn validate(
    input: Option<&Path>,
    assembly: Option<&str>,
) -> Result<ValidatedParams, ConfigurationError> {
    let input = input.ok_or_else(|| {
        ConfigurationError::new("Please check command line syntax. Provide a valid input file name.")
    })?;

    let metadata = std::fs::metadata(input).map_err(|_| {
        ConfigurationError::new(format!("Input file {} doesn't exist", input.display()))
    })?;
    if metadata.is_dir() {
        return Err(ConfigurationError::new(format!(
            "Input file cannot be a directory: {}",
            input.display()
        )));
    }

    let assembly: Assembly = assembly
        .ok_or_else(|| {
            ConfigurationError::new(format!(
                "Providing human assembly is mandatory if loading clinical annotations. Available assemblies: {}",
                Assembly::available()
            ))
        })?
        .parse()?;

    debug!(input = %input.display(), %assembly, "Post-load parameters validated");

    Ok(ValidatedParams {
        input: input.to_path_buf(),
        assembly,
        batch_size: DEFAULT_BATCH_SIZE,
    })
}

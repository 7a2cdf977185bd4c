//! Clinical store adaptors
//!
//! The ingestor only needs one operation from a store: merge a batch of
//! annotations for a species/assembly. Merges are upserts keyed by variant
//! identity, so replaying a batch leaves the store unchanged.

pub mod memory;
pub mod postgres;

pub use memory::MemoryClinicalStore;
pub use postgres::PgClinicalStore;

use async_trait::async_trait;
use postload_common::types::VariantAnnotation;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ConfigurationError, StoreError};
use crate::params::Assembly;

/// Store-specific merge options
///
/// The ingestor forwards these untouched; only the adaptor gives them
/// meaning. Empty by default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MergeOptions(Map<String, Value>);

impl MergeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Build options from `key=value` pairs
    ///
    /// Values that parse as JSON keep their type (`limit=10` is a number),
    /// anything else is taken as a string.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut options = Self::new();
        for pair in pairs {
            let pair = pair.as_ref();
            let (key, raw) = pair
                .split_once('=')
                .filter(|(key, _)| !key.trim().is_empty())
                .ok_or_else(|| {
                    ConfigurationError::new(format!(
                        "Invalid merge option '{}': expected key=value",
                        pair
                    ))
                })?;
            let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
            options.0.insert(key.trim().to_string(), value);
        }
        Ok(options)
    }
}

/// Destination of merged clinical annotations
#[async_trait]
pub trait ClinicalStore: Send + Sync {
    /// Upsert `batch` for `species`/`assembly`
    ///
    /// Must be idempotent: merging an already merged record leaves the store
    /// as it was. Either the whole batch is merged or an error is returned.
    async fn merge_annotations(
        &self,
        species: &str,
        assembly: Assembly,
        batch: &[VariantAnnotation],
        options: &MergeOptions,
    ) -> Result<(), StoreError>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_options_from_pairs() {
        let options = MergeOptions::from_pairs(["upsert=true", "limit=10", "source=clinvar"]).unwrap();
        assert_eq!(options.get("upsert"), Some(&json!(true)));
        assert_eq!(options.get("limit"), Some(&json!(10)));
        assert_eq!(options.get("source"), Some(&json!("clinvar")));
    }

    #[test]
    fn test_merge_options_reject_malformed_pairs() {
        assert!(MergeOptions::from_pairs(["novalue"]).is_err());
        assert!(MergeOptions::from_pairs(["=x"]).is_err());
        assert!(MergeOptions::from_pairs(Vec::<String>::new()).unwrap().is_empty());
    }

    #[test]
    fn test_merge_options_serialize_as_plain_object() {
        let options = MergeOptions::new().with("include", "clinical");
        assert_eq!(serde_json::to_value(&options).unwrap(), json!({"include": "clinical"}));
    }
}

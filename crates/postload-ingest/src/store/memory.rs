//! In-process clinical store
//!
//! Keeps merged annotations in a map keyed by species, assembly and variant.
//! Backs `--dry-run` and the ingestion tests.

use async_trait::async_trait;
use postload_common::types::{VariantAnnotation, VariantKey};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::trace;

use super::{ClinicalStore, MergeOptions};
use crate::error::StoreError;
use crate::params::Assembly;

type StoreKey = (String, Assembly, VariantKey);

#[derive(Debug, Default)]
pub struct MemoryClinicalStore {
    records: Mutex<BTreeMap<StoreKey, VariantAnnotation>>,
    merges: AtomicUsize,
}

impl MemoryClinicalStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, BTreeMap<StoreKey, VariantAnnotation>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of distinct variants stored
    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of successful merge calls
    pub fn merge_count(&self) -> usize {
        self.merges.load(Ordering::SeqCst)
    }

    pub fn get(&self, species: &str, assembly: Assembly, key: &VariantKey) -> Option<VariantAnnotation> {
        self.records()
            .get(&(species.to_string(), assembly, key.clone()))
            .cloned()
    }

    /// Copy of the full store contents
    pub fn snapshot(&self) -> BTreeMap<StoreKey, VariantAnnotation> {
        self.records().clone()
    }
}

#[async_trait]
impl ClinicalStore for MemoryClinicalStore {
    async fn merge_annotations(
        &self,
        species: &str,
        assembly: Assembly,
        batch: &[VariantAnnotation],
        _options: &MergeOptions,
    ) -> Result<(), StoreError> {
        let mut records = self.records();
        for annotation in batch {
            records.insert(
                (species.to_string(), assembly, annotation.key()),
                annotation.clone(),
            );
        }
        drop(records);

        let merges = self.merges.fetch_add(1, Ordering::SeqCst) + 1;
        trace!(merges, records = batch.len(), "Merged batch into memory store");
        Ok(())
    }
}

//! Batch ingestor
//!
//! Drives one run: open the source, then read a batch, merge it, report,
//! until the source is exhausted, then close the source and summarize.
//! Everything is awaited in sequence; there is never more than one batch in
//! flight.

use chrono::{DateTime, Utc};
use postload_common::types::VariantAnnotation;
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::IngestionError;
use crate::params::{Assembly, ValidatedParams};
use crate::progress::ProgressReporter;
use crate::source::{AnnotationSource, OpenSource};
use crate::store::{ClinicalStore, MergeOptions};

/// Context string passed to the reporter after each merged batch
pub const PROGRESS_CONTEXT: &str = "read variants with vep annotations";

/// Lifecycle of one ingestion run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    SourceOpen,
    Reading,
    Merging,
    SourceClosed,
    Completed,
    Failed,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::NotStarted => "not_started",
            RunState::SourceOpen => "source_open",
            RunState::Reading => "reading",
            RunState::Merging => "merging",
            RunState::SourceClosed => "source_closed",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionSummary {
    pub run_id: Uuid,
    pub source: String,
    pub species: String,
    pub assembly: Assembly,
    pub total_records: usize,
    pub batches: usize,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub state: RunState,
}

impl std::fmt::Display for IngestionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} records processed from {}",
            self.total_records, self.source
        )
    }
}

/// Mutable state of a run in progress
#[derive(Debug)]
struct IngestionRun {
    run_id: Uuid,
    state: RunState,
    /// Every state entered, in order
    history: Vec<RunState>,
    total_records: usize,
    batches: usize,
    started_at: DateTime<Utc>,
    started: Instant,
}

impl IngestionRun {
    fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            state: RunState::NotStarted,
            history: vec![RunState::NotStarted],
            total_records: 0,
            batches: 0,
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    fn transition(&mut self, next: RunState) {
        debug!(from = %self.state, to = %next, "Ingestion state change");
        self.state = next;
        self.history.push(next);
    }
}

/// Merges an annotation source into a clinical store in bounded batches
pub struct BatchIngestor<'a, St: ClinicalStore + ?Sized> {
    store: &'a St,
    species: String,
    assembly: Assembly,
    batch_size: usize,
    options: MergeOptions,
}

impl<'a, St: ClinicalStore + ?Sized> BatchIngestor<'a, St> {
    /// Ingestor for `species` with the assembly and batch size of `params`
    pub fn new(store: &'a St, species: impl Into<String>, params: &ValidatedParams) -> Self {
        Self {
            store,
            species: species.into(),
            assembly: params.assembly(),
            batch_size: params.batch_size(),
            options: MergeOptions::default(),
        }
    }

    /// Options forwarded unchanged to every merge call
    pub fn with_options(mut self, options: MergeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Run one ingestion of `source`
    ///
    /// The source is closed exactly once whatever happens. On failure no
    /// summary is reported and batches merged so far stay merged.
    pub async fn ingest<S: AnnotationSource + ?Sized>(
        &self,
        source: &mut S,
        reporter: &mut dyn ProgressReporter,
    ) -> Result<IngestionSummary, IngestionError> {
        let mut run = IngestionRun::new();
        let span = info_span!(
            "ingestion",
            run_id = %run.run_id,
            source = %source.identifier(),
            species = %self.species,
            assembly = %self.assembly,
        );

        self.run(&mut run, source, reporter).instrument(span).await
    }

    async fn run<S: AnnotationSource + ?Sized>(
        &self,
        run: &mut IngestionRun,
        source: &mut S,
        reporter: &mut dyn ProgressReporter,
    ) -> Result<IngestionSummary, IngestionError> {
        let mut open = match OpenSource::open(source) {
            Ok(open) => open,
            Err(e) => {
                run.transition(RunState::Failed);
                return Err(e.into());
            }
        };
        run.transition(RunState::SourceOpen);
        let identifier = open.identifier();

        let outcome = match open.prepare() {
            Ok(()) => self.drive(run, &mut open, reporter).await,
            Err(e) => Err(e.into()),
        };
        let closed = open.finish();
        run.transition(RunState::SourceClosed);

        match (outcome, closed) {
            (Ok(()), Ok(())) => {}
            (Ok(()), Err(close)) => {
                run.transition(RunState::Failed);
                return Err(close.into());
            }
            (Err(e), closed) => {
                if let Err(close) = closed {
                    warn!(error = %close, "Failed to close annotation source after aborted run");
                }
                run.transition(RunState::Failed);
                return Err(e);
            }
        }

        run.transition(RunState::Completed);
        reporter.finish(run.total_records, &identifier);

        let summary = IngestionSummary {
            run_id: run.run_id,
            source: identifier,
            species: self.species.clone(),
            assembly: self.assembly,
            total_records: run.total_records,
            batches: run.batches,
            started_at: run.started_at,
            elapsed: run.started.elapsed(),
            state: run.state,
        };
        info!(
            total_records = summary.total_records,
            batches = summary.batches,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Ingestion completed"
        );

        Ok(summary)
    }

    async fn drive<S: AnnotationSource + ?Sized>(
        &self,
        run: &mut IngestionRun,
        open: &mut OpenSource<'_, S>,
        reporter: &mut dyn ProgressReporter,
    ) -> Result<(), IngestionError> {
        loop {
            run.transition(RunState::Reading);
            let batch = open.read_batch(self.batch_size)?;
            if batch.is_empty() {
                return Ok(());
            }

            run.transition(RunState::Merging);
            self.merge(run, &batch).await?;

            run.total_records += batch.len();
            reporter.report(run.total_records, PROGRESS_CONTEXT);
        }
    }

    async fn merge(
        &self,
        run: &mut IngestionRun,
        batch: &[VariantAnnotation],
    ) -> Result<(), IngestionError> {
        let number = run.batches + 1;
        debug!(batch = number, records = batch.len(), "Merging batch");

        self.store
            .merge_annotations(&self.species, self.assembly, batch, &self.options)
            .await
            .map_err(|source| IngestionError::Store {
                batch: number,
                records: batch.len(),
                source,
            })?;

        run.batches = number;
        Ok(())
    }
}

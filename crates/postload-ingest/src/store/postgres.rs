//! PostgreSQL clinical store
//!
//! Annotations land in `clinical_annotations`, one row per
//! (species, assembly, variant). The full annotation is kept as JSONB.

use async_trait::async_trait;
use postload_common::types::{VariantAnnotation, VariantKey};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::{ClinicalStore, MergeOptions};
use crate::error::StoreError;
use crate::params::Assembly;
use crate::resolver::AssemblyTarget;

/// Rows per INSERT statement; 8 binds per row keeps well under the
/// 65535 bind parameter limit
const ROWS_PER_STATEMENT: usize = 1000;

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS clinical_annotations (
        species TEXT NOT NULL,
        assembly TEXT NOT NULL,
        chromosome TEXT NOT NULL,
        start_position BIGINT NOT NULL,
        reference TEXT NOT NULL,
        alternate TEXT NOT NULL,
        variant_id TEXT NOT NULL,
        annotation JSONB NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        PRIMARY KEY (species, assembly, chromosome, start_position, reference, alternate)
    )
"#;

struct Row {
    chromosome: String,
    start: i64,
    reference: String,
    alternate: String,
    variant_id: String,
    annotation: serde_json::Value,
}

impl Row {
    fn from_annotation(key: &VariantKey, annotation: &VariantAnnotation) -> Result<Self, StoreError> {
        let start = i64::try_from(key.start)
            .map_err(|_| StoreError::Rejected(format!("Start position out of range for {}", key)))?;
        let json = serde_json::to_value(annotation).map_err(|e| StoreError::Serialization {
            key: key.to_string(),
            source: e,
        })?;

        Ok(Self {
            chromosome: key.chromosome.clone(),
            start,
            reference: key.reference.clone(),
            alternate: key.alternate.clone(),
            variant_id: annotation.id.clone(),
            annotation: json,
        })
    }
}

pub struct PgClinicalStore {
    db: PgPool,
    schema: OnceCell<()>,
}

impl PgClinicalStore {
    /// Build a store on a lazily connected pool
    ///
    /// No connection is attempted here; an unreachable server surfaces as a
    /// [`StoreError`] from the first merge.
    pub fn connect_lazy(target: &AssemblyTarget) -> Self {
        let options = PgConnectOptions::new()
            .host(&target.host)
            .port(target.port)
            .username(&target.credentials.user)
            .password(&target.credentials.password)
            .database(&target.database);

        let db = PgPoolOptions::new()
            .max_connections(target.max_connections)
            .acquire_timeout(Duration::from_secs(target.connect_timeout_secs))
            .connect_lazy_with(options);

        info!(
            host = %target.host,
            port = target.port,
            database = %target.database,
            max_connections = target.max_connections,
            "Database connection pool configured"
        );

        Self::from_pool(db)
    }

    pub fn from_pool(db: PgPool) -> Self {
        Self {
            db,
            schema: OnceCell::new(),
        }
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.schema
            .get_or_try_init(|| async {
                sqlx::query(CREATE_TABLE).execute(&self.db).await?;
                debug!("clinical_annotations table ready");
                Ok::<(), StoreError>(())
            })
            .await?;
        Ok(())
    }

    async fn batch_upsert(
        tx: &mut Transaction<'_, Postgres>,
        species: &str,
        assembly: Assembly,
        rows: Vec<Row>,
    ) -> Result<(), StoreError> {
        let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            INSERT INTO clinical_annotations (
                species,
                assembly,
                chromosome,
                start_position,
                reference,
                alternate,
                variant_id,
                annotation
            )
            "#,
        );

        query_builder.push_values(rows, |mut b, row| {
            b.push_bind(species.to_string())
                .push_bind(assembly.as_str())
                .push_bind(row.chromosome)
                .push_bind(row.start)
                .push_bind(row.reference)
                .push_bind(row.alternate)
                .push_bind(row.variant_id)
                .push_bind(row.annotation);
        });

        query_builder.push(
            r#"
            ON CONFLICT (species, assembly, chromosome, start_position, reference, alternate)
            DO UPDATE SET
                variant_id = EXCLUDED.variant_id,
                annotation = EXCLUDED.annotation,
                updated_at = NOW()
            "#,
        );

        query_builder.build().execute(&mut **tx).await?;
        Ok(())
    }
}

/// Collapse a batch to one row per variant, later records winning
fn dedup_rows(batch: &[VariantAnnotation]) -> Result<Vec<Row>, StoreError> {
    let mut latest: BTreeMap<VariantKey, &VariantAnnotation> = BTreeMap::new();
    for annotation in batch {
        latest.insert(annotation.key(), annotation);
    }

    latest
        .iter()
        .map(|(key, annotation)| Row::from_annotation(key, annotation))
        .collect()
}

#[async_trait]
impl ClinicalStore for PgClinicalStore {
    async fn merge_annotations(
        &self,
        species: &str,
        assembly: Assembly,
        batch: &[VariantAnnotation],
        options: &MergeOptions,
    ) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        if !options.is_empty() {
            debug!(?options, "Merge options are not interpreted by the PostgreSQL store");
        }

        self.ensure_schema().await?;

        let mut rows = dedup_rows(batch)?;
        let mut tx = self.db.begin().await?;

        while !rows.is_empty() {
            let rest = rows.split_off(rows.len().min(ROWS_PER_STATEMENT));
            Self::batch_upsert(&mut tx, species, assembly, rows).await?;
            rows = rest;
        }

        tx.commit().await?;
        debug!(species, %assembly, records = batch.len(), "Merged batch into clinical_annotations");
        Ok(())
    }
}

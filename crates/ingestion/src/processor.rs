//! Ingestion processor
//!
//! Loads the dataset snapshot into the store. Every record runs inside its
//! own savepoint of a single stage transaction, so a failing record is
//! rolled back alone and the rest of the snapshot still lands.

use crate::dataset::{load_dataset, DatasetRecord};
use crate::errors::IngestionError;
use chrono::{NaiveDate, Utc};
use pubforge_common::db::{DbPool, EntityResolver, PublicationIndex, Repository};
use pubforge_common::metrics;
use sea_orm::{ConnectionTrait, TransactionTrait};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, error, info, instrument, warn};

/// Counts for one ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub records: usize,
    /// New publication rows
    pub inserted: usize,
    /// Records matched to an existing row by DOI or title
    pub reconciled: usize,
    /// Records whose DOI conflicted with a row the index did not know
    pub existing: usize,
    /// Records without a usable title
    pub skipped: usize,
    /// Records rolled back after a store error
    pub failed: usize,
}

/// Outcome of one committed record
enum RecordOutcome {
    Inserted { id: i32 },
    Reconciled { id: i32, doi_filled: bool },
    Existing,
}

/// Dataset ingestion processor
pub struct IngestionProcessor {
    pool: DbPool,
}

impl IngestionProcessor {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Load the snapshot at `path` into the store
    #[instrument(skip(self, index), fields(path = %path.display()))]
    pub async fn ingest(
        &self,
        path: &Path,
        index: &mut PublicationIndex,
    ) -> Result<IngestReport, IngestionError> {
        let records = load_dataset(path).await.map_err(|e| {
            error!(error = %e, "Dataset could not be loaded, nothing written");
            e
        })?;

        self.ingest_records(&records, index).await
    }

    /// Write already parsed records
    pub async fn ingest_records(
        &self,
        records: &[DatasetRecord],
        index: &mut PublicationIndex,
    ) -> Result<IngestReport, IngestionError> {
        let mut report = IngestReport {
            records: records.len(),
            ..Default::default()
        };

        // Probed before the transaction opens; the column is gone after cleaning
        let with_abstract = Repository::new(self.pool.conn()).has_abstract_column().await;
        if !with_abstract {
            debug!("Abstract column absent, abstracts will not be stored");
        }

        let today = Utc::now().date_naive();
        let txn = self.pool.begin().await?;

        for record in records {
            let Some(title) = record.title() else {
                warn!(record = %record.label(), "Record has no title, skipping");
                report.skipped += 1;
                continue;
            };

            let savepoint = txn.begin().await?;
            match ingest_record(&savepoint, record, today, with_abstract, index).await {
                Ok(outcome) => {
                    savepoint.commit().await?;
                    match outcome {
                        RecordOutcome::Inserted { id } => {
                            index.record(id, title, record.doi());
                            report.inserted += 1;
                        }
                        RecordOutcome::Reconciled { id, doi_filled } => {
                            if doi_filled {
                                index.record(id, title, record.doi());
                            }
                            report.reconciled += 1;
                        }
                        RecordOutcome::Existing => report.existing += 1,
                    }
                }
                Err(e) => {
                    savepoint.rollback().await?;
                    error!(record = %record.label(), error = %e, "Database error while ingesting record");
                    metrics::record_item_failure("ingest");
                    report.failed += 1;
                }
            }
        }

        txn.commit().await?;
        metrics::record_publications_upserted("ingest", report.inserted as u64);

        info!(
            records = report.records,
            inserted = report.inserted,
            reconciled = report.reconciled,
            existing = report.existing,
            skipped = report.skipped,
            failed = report.failed,
            "Ingestion completed"
        );
        Ok(report)
    }
}

async fn ingest_record<C: ConnectionTrait>(
    conn: &C,
    record: &DatasetRecord,
    today: NaiveDate,
    with_abstract: bool,
    index: &PublicationIndex,
) -> Result<RecordOutcome, IngestionError> {
    let repo = Repository::new(conn);
    let resolver = EntityResolver::new(conn);
    let title = record.title().unwrap_or_default();
    let doi = record.doi();

    if let Some(hit) = index.lookup(title, doi) {
        let id = hit.id();
        let doi_filled = match doi {
            Some(doi) if index.doi_available_for(doi, id) => repo.fill_missing_doi(id, doi).await?,
            _ => false,
        };

        resolver.link_authors(id, record.author_names()).await?;
        resolver.link_categories(id, record.categories()).await?;

        debug!(record = %record.label(), id = id, hit = ?hit, "Record matched existing publication");
        return Ok(RecordOutcome::Reconciled { id, doi_filled });
    }

    let inserted = repo
        .insert_dataset_publication(&record.to_publication(today), with_abstract)
        .await?;

    let Some(id) = inserted else {
        debug!(record = %record.label(), "DOI already stored, record skipped");
        return Ok(RecordOutcome::Existing);
    };

    resolver.link_authors(id, record.author_names()).await?;
    resolver.link_categories(id, record.categories()).await?;
    Ok(RecordOutcome::Inserted { id })
}

//! Citation collection
//!
//! Queries the search API with every stored title and replaces the
//! publication's citation rows with one row per organic result.

use crate::errors::EnrichmentError;
use pubforge_common::db::{CitationRow, DbPool, Repository};
use pubforge_common::metrics;
use pubforge_common::scholar::{OrganicResult, ScholarSearch};
use pubforge_common::UNKNOWN;
use sea_orm::TransactionTrait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CitationReport {
    pub publications: usize,
    pub with_citations: usize,
    pub citations_stored: usize,
    pub no_results: usize,
    pub failed: usize,
}

pub struct CitationCollector {
    pool: DbPool,
    search: Arc<dyn ScholarSearch>,
}

fn citation_row(result: &OrganicResult) -> Option<CitationRow> {
    let title = result.title()?;
    Some(CitationRow {
        title: title.to_string(),
        author: Some(result.summary_author().unwrap_or(UNKNOWN).to_string()),
        year: result.summary_year(),
    })
}

impl CitationCollector {
    pub fn new(pool: DbPool, search: Arc<dyn ScholarSearch>) -> Self {
        Self { pool, search }
    }

    #[instrument(skip(self))]
    pub async fn collect_citations(&self) -> Result<CitationReport, EnrichmentError> {
        let publications = Repository::new(self.pool.conn()).publication_keys().await?;
        let mut report = CitationReport {
            publications: publications.len(),
            ..Default::default()
        };

        let txn = self.pool.begin().await?;

        for publication in publications {
            let response = match self.search.query(&publication.title).await {
                Ok(Some(response)) if !response.organic_results.is_empty() => response,
                Ok(_) => {
                    warn!(title = %publication.title, "No results for publication");
                    report.no_results += 1;
                    continue;
                }
                Err(e) => {
                    error!(publication_id = publication.id, error = %e, "Citation lookup failed");
                    metrics::record_item_failure("citations");
                    report.failed += 1;
                    continue;
                }
            };

            let rows: Vec<CitationRow> = response
                .organic_results
                .iter()
                .filter_map(citation_row)
                .collect();
            if rows.is_empty() {
                warn!(title = %publication.title, "No titled results for publication");
                report.no_results += 1;
                continue;
            }

            let savepoint = txn.begin().await?;
            match Repository::new(&savepoint)
                .replace_citations(publication.id, &rows)
                .await
            {
                Ok(stored) => {
                    savepoint.commit().await?;
                    report.with_citations += 1;
                    report.citations_stored += stored;
                }
                Err(e) => {
                    savepoint.rollback().await?;
                    error!(publication_id = publication.id, error = %e, "Citations could not be stored");
                    metrics::record_item_failure("citations");
                    report.failed += 1;
                }
            }
        }

        txn.commit().await?;

        info!(
            publications = report.publications,
            with_citations = report.with_citations,
            stored = report.citations_stored,
            no_results = report.no_results,
            failed = report.failed,
            "Citation collection completed"
        );
        Ok(report)
    }
}

//! Enrichment engine
//!
//! Each cycle samples candidates per category, queries the search API with
//! the candidate title, and writes every organic result back as a
//! publication with its authors and the candidate's categories.
//!
//! A cycle runs in one transaction and each candidate in a savepoint of it.
//! A candidate that fails is rolled back alone and queued; queued candidates
//! go first in the next cycle. Index entries for a candidate are staged and
//! only folded into the run index once its savepoint has committed.

use crate::errors::EnrichmentError;
use chrono::{NaiveDate, Utc};
use pubforge_common::db::{
    Candidate, DbPool, EnrichedPublication, EntityResolver, IndexHit, PublicationIndex,
    Repository,
};
use pubforge_common::metrics;
use pubforge_common::scholar::{OrganicResult, ScholarSearch};
use pubforge_common::UNKNOWN;
use sea_orm::{ConnectionTrait, TransactionTrait};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Counts for one enrichment cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub cycle: u32,
    /// Candidates processed, retried ones included
    pub candidates: usize,
    pub retried: usize,
    pub results_upserted: usize,
    /// Organic results without a title
    pub results_skipped: usize,
    /// Candidates for which the search API gave nothing
    pub no_results: usize,
    pub failures: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentReport {
    pub cycles: Vec<CycleReport>,
    /// Ids of candidates still failing after the last cycle
    pub outstanding: Vec<i32>,
}

impl EnrichmentReport {
    pub fn results_upserted(&self) -> usize {
        self.cycles.iter().map(|c| c.results_upserted).sum()
    }

    pub fn failures(&self) -> usize {
        self.cycles.iter().map(|c| c.failures).sum()
    }
}

/// Writes of one candidate, applied once its savepoint commits
#[derive(Default)]
struct CandidateOutcome {
    upserted: usize,
    skipped: usize,
    no_result: bool,
    staged: PublicationIndex,
}

pub struct EnrichmentEngine {
    pool: DbPool,
    search: Arc<dyn ScholarSearch>,
    per_category_limit: u64,
}

impl EnrichmentEngine {
    pub fn new(pool: DbPool, search: Arc<dyn ScholarSearch>, per_category_limit: u64) -> Self {
        Self {
            pool,
            search,
            per_category_limit,
        }
    }

    /// Run `cycles` enrichment cycles.
    ///
    /// Errors opening or committing a cycle abort the stage; cycles committed
    /// before stay applied.
    #[instrument(skip(self, index))]
    pub async fn enrich(
        &self,
        cycles: u32,
        index: &mut PublicationIndex,
    ) -> Result<EnrichmentReport, EnrichmentError> {
        let mut report = EnrichmentReport::default();
        let mut retry_queue: Vec<Candidate> = Vec::new();

        for cycle in 1..=cycles {
            let (cycle_report, failed) = self.run_cycle(cycle, retry_queue, index).await?;
            report.cycles.push(cycle_report);
            retry_queue = failed;
        }

        report.outstanding = retry_queue.iter().map(|c| c.id).collect();
        if !report.outstanding.is_empty() {
            warn!(
                outstanding = ?report.outstanding,
                "Candidates still failing after the last cycle"
            );
        }

        info!(
            cycles = cycles,
            upserted = report.results_upserted(),
            failures = report.failures(),
            "Enrichment completed"
        );
        Ok(report)
    }

    async fn run_cycle(
        &self,
        cycle: u32,
        retry_queue: Vec<Candidate>,
        index: &mut PublicationIndex,
    ) -> Result<(CycleReport, Vec<Candidate>), EnrichmentError> {
        let txn = self.pool.begin().await?;
        let sampled = Repository::new(&txn)
            .select_candidates(self.per_category_limit)
            .await?;

        let mut report = CycleReport {
            cycle,
            retried: retry_queue.len(),
            ..Default::default()
        };

        let mut seen: HashSet<i32> = retry_queue.iter().map(|c| c.id).collect();
        let mut work = retry_queue;
        work.extend(sampled.into_iter().filter(|c| seen.insert(c.id)));
        report.candidates = work.len();

        info!(cycle = cycle, candidates = work.len(), retried = report.retried, "Enrichment cycle started");

        let today = Utc::now().date_naive();
        let mut failed = Vec::new();

        for candidate in work {
            let savepoint = txn.begin().await?;
            match self.enrich_candidate(&savepoint, &candidate, index, today).await {
                Ok(outcome) => {
                    savepoint.commit().await?;
                    index.absorb(outcome.staged);
                    report.results_upserted += outcome.upserted;
                    report.results_skipped += outcome.skipped;
                    if outcome.no_result {
                        report.no_results += 1;
                    }
                }
                Err(e) => {
                    savepoint.rollback().await?;
                    warn!(
                        cycle = cycle,
                        publication_id = candidate.id,
                        title = %candidate.title,
                        error = %e,
                        "Candidate failed, queued for the next cycle"
                    );
                    metrics::record_item_failure("enrich");
                    report.failures += 1;
                    failed.push(candidate);
                }
            }
        }

        txn.commit().await?;
        metrics::record_publications_upserted("enrich", report.results_upserted as u64);

        info!(
            cycle = cycle,
            upserted = report.results_upserted,
            skipped = report.results_skipped,
            no_results = report.no_results,
            failures = report.failures,
            "Enrichment cycle committed"
        );
        Ok((report, failed))
    }

    async fn enrich_candidate<C: ConnectionTrait>(
        &self,
        conn: &C,
        candidate: &Candidate,
        index: &PublicationIndex,
        today: NaiveDate,
    ) -> Result<CandidateOutcome, EnrichmentError> {
        let mut outcome = CandidateOutcome::default();

        let response = match self.search.query(&candidate.title).await? {
            Some(response) if !response.organic_results.is_empty() => response,
            _ => {
                warn!(title = %candidate.title, "No results for candidate");
                outcome.no_result = true;
                return Ok(outcome);
            }
        };

        for result in &response.organic_results {
            if self
                .write_result(conn, candidate, result, index, &mut outcome.staged, today)
                .await?
            {
                outcome.upserted += 1;
            } else {
                outcome.skipped += 1;
            }
        }

        Ok(outcome)
    }

    /// Upsert one organic result; `false` when it was skipped
    async fn write_result<C: ConnectionTrait>(
        &self,
        conn: &C,
        candidate: &Candidate,
        result: &OrganicResult,
        index: &PublicationIndex,
        staged: &mut PublicationIndex,
        today: NaiveDate,
    ) -> Result<bool, EnrichmentError> {
        let Some(title) = result.title() else {
            debug!(candidate = candidate.id, "Organic result without title, skipping");
            return Ok(false);
        };

        let repo = Repository::new(conn);
        let doi = result.doi();
        let mut row = EnrichedPublication {
            submitter: result.first_author().unwrap_or(UNKNOWN).to_string(),
            title: title.to_string(),
            journal_ref: result.link().map(str::to_string),
            doi: doi.map(str::to_string),
            update_date: today,
        };

        let hit = existing_row(title, doi, [&*staged, index]);
        let id = match hit {
            Some(hit) => {
                let id = hit.id();
                // A DOI owned by another row is left off rather than moved
                row.doi = doi
                    .filter(|d| index.doi_available_for(d, id) && staged.doi_available_for(d, id))
                    .map(str::to_string);
                repo.update_enriched(id, &row).await?;
                debug!(id = id, hit = ?hit, title = title, "Refreshed existing publication");
                id
            }
            None => {
                let id = repo.upsert_enriched(&row).await?;
                debug!(id = id, title = title, "Upserted publication by title");
                id
            }
        };
        // A DOI hit belongs to a row under another title
        let staged_title = match hit {
            Some(IndexHit::Doi(_)) => "",
            _ => title,
        };
        staged.record(id, staged_title, row.doi.as_deref());

        let resolver = EntityResolver::new(conn);
        resolver.link_authors(id, result.author_names()).await?;
        resolver.link_categories(id, &candidate.categories).await?;

        Ok(true)
    }
}

/// Title is the identity key for enrichment writes; DOI only resolves
/// results whose title is not known yet.
fn existing_row(title: &str, doi: Option<&str>, layers: [&PublicationIndex; 2]) -> Option<IndexHit> {
    layers
        .iter()
        .find_map(|layer| layer.by_title(title))
        .map(IndexHit::Title)
        .or_else(|| {
            doi.and_then(|d| layers.iter().find_map(|layer| layer.by_doi(d)))
                .map(IndexHit::Doi)
        })
}

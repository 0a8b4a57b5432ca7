//! Validation reporter
//!
//! Read-only consistency checks over the store. Findings are advisory: a
//! check that cannot run is logged and marks the report degraded, and
//! neither outcome fails the run.

use pubforge_common::db::{DbPool, DuplicateDoi, Repository};
use pubforge_common::metrics;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValidationStatus {
    Clean,
    Findings,
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub status: ValidationStatus,
    pub duplicate_dois: Vec<DuplicateDoi>,
    pub missing_dois: i64,
    pub blank_affiliations: i64,
    /// Checks that could not run
    pub failed_checks: Vec<&'static str>,
}

impl ValidationReport {
    fn has_findings(&self) -> bool {
        !self.duplicate_dois.is_empty() || self.missing_dois > 0 || self.blank_affiliations > 0
    }
}

pub struct ValidationReporter {
    pool: DbPool,
}

impl ValidationReporter {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    pub async fn validate(&self) -> ValidationReport {
        let repo = Repository::new(self.pool.conn());
        let mut failed_checks = Vec::new();

        let duplicate_dois = match repo.duplicate_dois().await {
            Ok(duplicates) if duplicates.is_empty() => {
                info!("No duplicate DOIs found");
                duplicates
            }
            Ok(duplicates) => {
                warn!(duplicates = ?duplicates, "Duplicate DOIs found");
                duplicates
            }
            Err(e) => {
                error!(error = %e, "Duplicate DOI check failed");
                failed_checks.push("duplicate_dois");
                Vec::new()
            }
        };
        metrics::record_validation_findings("duplicate_dois", duplicate_dois.len() as u64);

        let missing_dois = match repo.count_missing_dois().await {
            Ok(0) => {
                info!("No publications with missing DOIs");
                0
            }
            Ok(count) => {
                warn!(count = count, "Publications with missing DOIs");
                count
            }
            Err(e) => {
                error!(error = %e, "Missing DOI check failed");
                failed_checks.push("missing_dois");
                0
            }
        };
        metrics::record_validation_findings("missing_dois", missing_dois as u64);

        let blank_affiliations = match repo.count_blank_affiliations().await {
            Ok(0) => {
                info!("No authors with blank affiliations");
                0
            }
            Ok(count) => {
                warn!(count = count, "Authors with blank affiliations");
                count
            }
            Err(e) => {
                error!(error = %e, "Affiliation check failed");
                failed_checks.push("blank_affiliations");
                0
            }
        };
        metrics::record_validation_findings("blank_affiliations", blank_affiliations as u64);

        let mut report = ValidationReport {
            status: ValidationStatus::Clean,
            duplicate_dois,
            missing_dois,
            blank_affiliations,
            failed_checks,
        };

        report.status = if !report.failed_checks.is_empty() {
            ValidationStatus::Degraded
        } else if report.has_findings() {
            ValidationStatus::Findings
        } else {
            ValidationStatus::Clean
        };

        info!(status = ?report.status, "Validation completed");
        report
    }
}

//! Store cleaning
//!
//! Removes degenerate publications after ingestion and optionally drops the
//! abstract column.

use crate::errors::IngestionError;
use pubforge_common::config::PipelineConfig;
use pubforge_common::db::{DbPool, Repository};
use serde::Serialize;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanReport {
    pub short_titles_deleted: u64,
    pub authorless_deleted: u64,
    pub abstract_dropped: bool,
}

pub struct Cleaner {
    pool: DbPool,
    min_title_length: u32,
    drop_abstracts: bool,
}

impl Cleaner {
    pub fn new(pool: DbPool, config: &PipelineConfig) -> Self {
        Self {
            pool,
            min_title_length: config.min_title_length,
            drop_abstracts: config.drop_abstracts,
        }
    }

    /// Delete degenerate publications, then drop the abstract column.
    ///
    /// Both deletes commit together. The column drop runs on its own and a
    /// failure there (typically: already dropped) does not fail the stage.
    #[instrument(skip(self))]
    pub async fn clean(&self) -> Result<CleanReport, IngestionError> {
        let txn = self.pool.begin().await?;
        let repo = Repository::new(&txn);

        let short_titles_deleted = repo.delete_short_titles(self.min_title_length).await?;
        let authorless_deleted = repo.delete_without_authors().await?;
        txn.commit().await?;

        info!(
            short_titles = short_titles_deleted,
            authorless = authorless_deleted,
            "Degenerate publications removed"
        );

        let abstract_dropped = if self.drop_abstracts {
            match Repository::new(self.pool.conn()).drop_abstract_column().await {
                Ok(()) => {
                    info!("Abstract column dropped");
                    true
                }
                Err(e) => {
                    warn!(error = %e, "Abstract column could not be dropped");
                    false
                }
            }
        } else {
            false
        };

        Ok(CleanReport {
            short_titles_deleted,
            authorless_deleted,
            abstract_dropped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pubforge_common::db::testing::{memory_pool, scalar, seed_publication};
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_clean_removes_degenerate_publications() {
        let pool = memory_pool().await.unwrap();
        seed_publication(&pool, "A", Some("10.1/a"), "hep-ph", Some("X")).await.unwrap();
        seed_publication(&pool, "Orphaned paper", None, "hep-ph", None).await.unwrap();
        let kept = seed_publication(&pool, "Kept paper", None, "hep-ph", Some("Y"))
            .await
            .unwrap();

        let cleaner = Cleaner::new(pool.clone(), &PipelineConfig::default());
        let report = cleaner.clean().await.unwrap();

        assert_eq!(report.short_titles_deleted, 1);
        assert_eq!(report.authorless_deleted, 1);
        assert!(report.abstract_dropped);

        let ids = scalar(&pool, "SELECT id FROM publications", vec![]).await.unwrap();
        let count = scalar(&pool, "SELECT COUNT(*) FROM publications", vec![]).await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(ids, kept as i64);
    }

    #[tokio::test]
    async fn test_second_clean_tolerates_dropped_column() {
        let pool = memory_pool().await.unwrap();
        let cleaner = Cleaner::new(pool.clone(), &PipelineConfig::default());

        assert!(cleaner.clean().await.unwrap().abstract_dropped);
        let second = assert_ok!(cleaner.clean().await);
        assert!(!second.abstract_dropped);
    }

    #[tokio::test]
    async fn test_abstract_kept_when_disabled() {
        let pool = memory_pool().await.unwrap();
        let config = PipelineConfig {
            drop_abstracts: false,
            ..Default::default()
        };

        let report = Cleaner::new(pool.clone(), &config).clean().await.unwrap();

        assert!(!report.abstract_dropped);
        assert!(Repository::new(pool.conn()).has_abstract_column().await);
    }
}

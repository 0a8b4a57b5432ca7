//! Publication type classification from BibTeX entry kinds

use crate::errors::EnrichmentError;
use pubforge_common::db::{DbPool, Repository};
use pubforge_common::metrics;
use pubforge_common::scholar::{ScholarSearch, SearchResponse};
use sea_orm::TransactionTrait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PublicationType {
    JournalArticle,
    ConferencePaper,
    Book,
    Thesis,
    TechnicalReport,
    Manual,
    ConferenceProceedings,
    UnpublishedWork,
    Miscellaneous,
    PhdThesis,
    MastersThesis,
    BookChapter,
    Collection,
    Patent,
    OnlineResource,
    Unknown,
}

impl PublicationType {
    fn from_entry_kind(kind: &str) -> Option<Self> {
        let ty = match kind {
            "article" => Self::JournalArticle,
            "inproceedings" => Self::ConferencePaper,
            "book" => Self::Book,
            "thesis" => Self::Thesis,
            "techreport" => Self::TechnicalReport,
            "manual" => Self::Manual,
            "proceedings" => Self::ConferenceProceedings,
            "unpublished" => Self::UnpublishedWork,
            "misc" => Self::Miscellaneous,
            "phdthesis" => Self::PhdThesis,
            "mastersthesis" => Self::MastersThesis,
            "inbook" => Self::BookChapter,
            "incollection" => Self::Collection,
            "patent" => Self::Patent,
            "online" => Self::OnlineResource,
            _ => return None,
        };
        Some(ty)
    }

    /// Type of the first recognised `@kind` in a BibTeX entry.
    ///
    /// Kinds are read as whole words, so `@booklet` is not `@book`.
    pub fn from_bib_entry(entry: &str) -> Option<Self> {
        entry.split('@').skip(1).find_map(|rest| {
            let end = rest
                .find(|c: char| !c.is_ascii_alphabetic())
                .unwrap_or(rest.len());
            Self::from_entry_kind(&rest[..end].to_ascii_lowercase())
        })
    }

    /// Type of the first result whose entry is recognised
    pub fn from_response(response: &SearchResponse) -> Self {
        response
            .results
            .iter()
            .find_map(|r| Self::from_bib_entry(&r.bib_entry))
            .unwrap_or(Self::Unknown)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::JournalArticle => "Journal Article",
            Self::ConferencePaper => "Conference Paper",
            Self::Book => "Book",
            Self::Thesis => "Thesis",
            Self::TechnicalReport => "Technical Report",
            Self::Manual => "Manual",
            Self::ConferenceProceedings => "Conference Proceedings",
            Self::UnpublishedWork => "Unpublished Work",
            Self::Miscellaneous => "Miscellaneous",
            Self::PhdThesis => "PhD Thesis",
            Self::MastersThesis => "Masters Thesis",
            Self::BookChapter => "Book Chapter",
            Self::Collection => "Collection",
            Self::Patent => "Patent",
            Self::OnlineResource => "Online Resource",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for PublicationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassifyReport {
    pub publications: usize,
    pub classified: usize,
    pub unknown: usize,
    pub no_results: usize,
    pub failed: usize,
}

pub struct PublicationClassifier {
    pool: DbPool,
    search: Arc<dyn ScholarSearch>,
}

impl PublicationClassifier {
    pub fn new(pool: DbPool, search: Arc<dyn ScholarSearch>) -> Self {
        Self { pool, search }
    }

    /// Look up every publication and store its type
    #[instrument(skip(self))]
    pub async fn classify(&self) -> Result<ClassifyReport, EnrichmentError> {
        let publications = Repository::new(self.pool.conn()).publication_keys().await?;
        let mut report = ClassifyReport {
            publications: publications.len(),
            ..Default::default()
        };

        let txn = self.pool.begin().await?;

        for publication in publications {
            let publication_type = match self.search.query(&publication.title).await {
                Ok(Some(response)) => PublicationType::from_response(&response),
                Ok(None) => {
                    warn!(title = %publication.title, "No results for publication");
                    report.no_results += 1;
                    continue;
                }
                Err(e) => {
                    error!(publication_id = publication.id, error = %e, "Type lookup failed");
                    metrics::record_item_failure("classify");
                    report.failed += 1;
                    continue;
                }
            };

            let savepoint = txn.begin().await?;
            match Repository::new(&savepoint)
                .set_publication_type(publication.id, publication_type.as_str())
                .await
            {
                Ok(()) => {
                    savepoint.commit().await?;
                    if publication_type == PublicationType::Unknown {
                        warn!(publication_id = publication.id, "Publication type could not be resolved");
                        report.unknown += 1;
                    } else {
                        report.classified += 1;
                    }
                }
                Err(e) => {
                    savepoint.rollback().await?;
                    error!(publication_id = publication.id, error = %e, "Type could not be stored");
                    metrics::record_item_failure("classify");
                    report.failed += 1;
                }
            }
        }

        txn.commit().await?;

        info!(
            publications = report.publications,
            classified = report.classified,
            unknown = report.unknown,
            failed = report.failed,
            "Classification completed"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pubforge_common::db::testing::{memory_pool, seed_publication, text};
    use pubforge_common::scholar::MockSearchClient;

    #[test]
    fn test_entry_kinds() {
        assert_eq!(
            PublicationType::from_bib_entry("@article{balazs2007, title={...}}"),
            Some(PublicationType::JournalArticle)
        );
        assert_eq!(
            PublicationType::from_bib_entry("@INPROCEEDINGS{x,}"),
            Some(PublicationType::ConferencePaper)
        );
        assert_eq!(
            PublicationType::from_bib_entry("@phdthesis{x,}"),
            Some(PublicationType::PhdThesis)
        );
        assert_eq!(PublicationType::from_bib_entry("@booklet{x,}"), None);
        assert_eq!(PublicationType::from_bib_entry("no entry"), None);
    }

    #[test]
    fn test_first_recognised_result_wins() {
        let response = SearchResponse {
            results: vec![
                pubforge_common::scholar::BibResult { bib_entry: "@booklet{a,}".into() },
                pubforge_common::scholar::BibResult { bib_entry: "@book{b,}".into() },
                pubforge_common::scholar::BibResult { bib_entry: "@article{c,}".into() },
            ],
            ..Default::default()
        };
        assert_eq!(PublicationType::from_response(&response), PublicationType::Book);
        assert_eq!(
            PublicationType::from_response(&SearchResponse::default()),
            PublicationType::Unknown
        );
    }

    #[tokio::test]
    async fn test_classify_stores_types() {
        let pool = memory_pool().await.unwrap();
        let a = seed_publication(&pool, "Paper A", None, "", None).await.unwrap();
        let b = seed_publication(&pool, "Paper B", None, "", None).await.unwrap();

        let search = Arc::new(MockSearchClient::new());
        search.respond_with_bib("Paper A", &["@inproceedings{a, title={A}}"]);
        search.respond_with_bib("Paper B", &["@booklet{b,}"]);

        let report = PublicationClassifier::new(pool.clone(), search)
            .classify()
            .await
            .unwrap();

        assert_eq!(report.classified, 1);
        assert_eq!(report.unknown, 1);

        let type_a = text(&pool, "SELECT publication_type FROM publications WHERE id = $1", vec![a.into()])
            .await
            .unwrap();
        let type_b = text(&pool, "SELECT publication_type FROM publications WHERE id = $1", vec![b.into()])
            .await
            .unwrap();
        assert_eq!(type_a.as_deref(), Some("Conference Paper"));
        assert_eq!(type_b.as_deref(), Some("Unknown"));
    }
}

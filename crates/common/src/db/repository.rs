//! Repository for the statements issued by the pipeline stages
//!
//! The repository borrows whatever connection the caller is working on, so
//! the same statements run on the pool, on a stage transaction, or on a
//! per-item savepoint. Writes that depend on conflict handling use raw
//! statements with portable `ON CONFLICT ... RETURNING` SQL.

use crate::errors::Result;
use chrono::NaiveDate;
use sea_orm::{ConnectionTrait, DbErr, QueryResult, Statement, Value};
use std::collections::HashSet;

/// Publication as loaded from the dataset snapshot
#[derive(Debug, Clone, Default)]
pub struct DatasetPublication {
    pub submitter: Option<String>,
    pub title: String,
    pub comments: Option<String>,
    pub journal_ref: Option<String>,
    pub doi: Option<String>,
    pub report_no: Option<String>,
    pub categories: Option<String>,
    pub license: Option<String>,
    pub abstract_text: Option<String>,
    pub update_date: NaiveDate,
}

/// Publication fields written by enrichment
#[derive(Debug, Clone)]
pub struct EnrichedPublication {
    /// First listed author of the result
    pub submitter: String,
    pub title: String,
    /// Result link
    pub journal_ref: Option<String>,
    /// Result identifier, standing in for a DOI
    pub doi: Option<String>,
    pub update_date: NaiveDate,
}

/// Publication sampled for enrichment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: i32,
    pub title: String,
    /// Space separated category codes of the source publication
    pub categories: String,
}

/// Identifier and title of a stored publication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicationKey {
    pub id: i32,
    pub title: String,
}

/// Citation row for one search result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationRow {
    pub title: String,
    pub author: Option<String>,
    pub year: Option<i32>,
}

/// DOI shared by more than one publication
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DuplicateDoi {
    pub doi: String,
    pub count: i64,
}

/// Repository over a borrowed connection or transaction
pub struct Repository<'c, C> {
    conn: &'c C,
}

impl<'c, C: ConnectionTrait> Repository<'c, C> {
    pub fn new(conn: &'c C) -> Self {
        Self { conn }
    }

    fn stmt(&self, sql: &str, values: Vec<Value>) -> Statement {
        Statement::from_sql_and_values(self.conn.get_database_backend(), sql, values)
    }

    async fn count(&self, sql: &str, values: Vec<Value>) -> Result<i64> {
        let row = self.conn.query_one(self.stmt(sql, values)).await?;
        Ok(match row {
            Some(row) => row.try_get::<i64>("", "n")?,
            None => 0,
        })
    }

    async fn returning_id(&self, sql: &str, values: Vec<Value>) -> Result<Option<i32>> {
        let row = self.conn.query_one(self.stmt(sql, values)).await?;
        row.map(|row| row.try_get::<i32>("", "id"))
            .transpose()
            .map_err(Into::into)
    }

    // ========================================================================
    // Ingestion
    // ========================================================================

    /// Whether the `abstract` column is still present.
    ///
    /// Run outside a transaction: on Postgres a failed check would abort it.
    pub async fn has_abstract_column(&self) -> bool {
        self.conn
            .execute(self.stmt("SELECT abstract FROM publications WHERE 1 = 0", vec![]))
            .await
            .is_ok()
    }

    /// Insert a dataset publication; `None` when its DOI is already stored
    pub async fn insert_dataset_publication(
        &self,
        publication: &DatasetPublication,
        with_abstract: bool,
    ) -> Result<Option<i32>> {
        let mut values: Vec<Value> = vec![
            publication.submitter.clone().into(),
            publication.title.clone().into(),
            publication.comments.clone().into(),
            publication.journal_ref.clone().into(),
            publication.doi.clone().into(),
            publication.report_no.clone().into(),
            publication.categories.clone().into(),
            publication.license.clone().into(),
            publication.update_date.into(),
        ];

        let sql = if with_abstract {
            values.push(publication.abstract_text.clone().into());
            r#"
            INSERT INTO publications (
                submitter, title, comments, journal_ref, doi, report_no,
                categories, license, update_date, abstract
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (doi) DO NOTHING
            RETURNING id
            "#
        } else {
            r#"
            INSERT INTO publications (
                submitter, title, comments, journal_ref, doi, report_no,
                categories, license, update_date
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (doi) DO NOTHING
            RETURNING id
            "#
        };

        self.returning_id(sql, values).await
    }

    /// Set the DOI of a row that has none; returns whether the row changed
    pub async fn fill_missing_doi(&self, id: i32, doi: &str) -> Result<bool> {
        let result = self
            .conn
            .execute(self.stmt(
                "UPDATE publications SET doi = $1 \
                 WHERE id = $2 AND (doi IS NULL OR trim(doi) = '')",
                vec![doi.into(), id.into()],
            ))
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ========================================================================
    // Enrichment
    // ========================================================================

    /// Insert a publication keyed by title, or refresh the row holding that title.
    ///
    /// On conflict the journal reference and update date are replaced and the
    /// DOI is replaced only when a new one is given.
    pub async fn upsert_enriched(&self, publication: &EnrichedPublication) -> Result<i32> {
        self.returning_id(
            r#"
            INSERT INTO publications (submitter, title, journal_ref, doi, update_date)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (title) DO UPDATE
            SET journal_ref = excluded.journal_ref,
                doi = COALESCE(excluded.doi, publications.doi),
                update_date = excluded.update_date
            RETURNING id
            "#,
            vec![
                publication.submitter.clone().into(),
                publication.title.clone().into(),
                publication.journal_ref.clone().into(),
                publication.doi.clone().into(),
                publication.update_date.into(),
            ],
        )
        .await?
        .ok_or_else(|| DbErr::RecordNotInserted.into())
    }

    /// Refresh an existing row found through the identity index
    pub async fn update_enriched(&self, id: i32, publication: &EnrichedPublication) -> Result<()> {
        self.conn
            .execute(self.stmt(
                r#"
                UPDATE publications
                SET journal_ref = $1,
                    doi = COALESCE($2, doi),
                    update_date = $3
                WHERE id = $4
                "#,
                vec![
                    publication.journal_ref.clone().into(),
                    publication.doi.clone().into(),
                    publication.update_date.into(),
                    id.into(),
                ],
            ))
            .await?;
        Ok(())
    }

    /// Every known category code, oldest first
    pub async fn category_codes(&self) -> Result<Vec<String>> {
        let rows = self
            .conn
            .query_all(self.stmt(
                "SELECT category_name FROM categories ORDER BY id",
                vec![],
            ))
            .await?;

        rows.iter()
            .map(|row| row.try_get::<String>("", "category_name"))
            .collect::<std::result::Result<_, _>>()
            .map_err(Into::into)
    }

    /// Up to `limit_per_category` publications per category, each at most once
    pub async fn select_candidates(&self, limit_per_category: u64) -> Result<Vec<Candidate>> {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();

        for code in self.category_codes().await? {
            let rows = self
                .conn
                .query_all(self.stmt(
                    r#"
                    SELECT id, title, categories FROM publications
                    WHERE categories LIKE $1
                    ORDER BY id
                    LIMIT $2
                    "#,
                    vec![
                        format!("%{}%", code).into(),
                        (limit_per_category as i64).into(),
                    ],
                ))
                .await?;

            for row in rows {
                let candidate = candidate_from_row(&row)?;
                if seen.insert(candidate.id) {
                    candidates.push(candidate);
                }
            }
        }

        Ok(candidates)
    }

    // ========================================================================
    // Citations and classification
    // ========================================================================

    /// Every publication id and title, in id order
    pub async fn publication_keys(&self) -> Result<Vec<PublicationKey>> {
        let rows = self
            .conn
            .query_all(self.stmt("SELECT id, title FROM publications ORDER BY id", vec![]))
            .await?;

        rows.iter()
            .map(|row| {
                Ok(PublicationKey {
                    id: row.try_get::<i32>("", "id")?,
                    title: row.try_get::<String>("", "title")?,
                })
            })
            .collect()
    }

    /// Replace the citation rows of one publication
    pub async fn replace_citations(&self, publication_id: i32, rows: &[CitationRow]) -> Result<usize> {
        self.conn
            .execute(self.stmt(
                "DELETE FROM citations WHERE publication_id = $1",
                vec![publication_id.into()],
            ))
            .await?;

        for row in rows {
            self.conn
                .execute(self.stmt(
                    "INSERT INTO citations (publication_id, title, author, year) \
                     VALUES ($1, $2, $3, $4)",
                    vec![
                        publication_id.into(),
                        row.title.clone().into(),
                        row.author.clone().into(),
                        row.year.into(),
                    ],
                ))
                .await?;
        }

        Ok(rows.len())
    }

    pub async fn set_publication_type(&self, id: i32, publication_type: &str) -> Result<()> {
        self.conn
            .execute(self.stmt(
                "UPDATE publications SET publication_type = $1 WHERE id = $2",
                vec![publication_type.into(), id.into()],
            ))
            .await?;
        Ok(())
    }

    // ========================================================================
    // Cleaning
    // ========================================================================

    /// Delete publications whose trimmed title is shorter than `min_length`
    pub async fn delete_short_titles(&self, min_length: u32) -> Result<u64> {
        let selection = "SELECT id FROM publications WHERE length(trim(title)) < $1";
        self.delete_dependents(selection, vec![(min_length as i32).into()])
            .await?;

        let result = self
            .conn
            .execute(self.stmt(
                "DELETE FROM publications WHERE length(trim(title)) < $1",
                vec![(min_length as i32).into()],
            ))
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete publications that have no authorship rows
    pub async fn delete_without_authors(&self) -> Result<u64> {
        let selection =
            "SELECT id FROM publications WHERE id NOT IN (SELECT publication_id FROM authorship)";
        self.delete_dependents(selection, vec![]).await?;

        let result = self
            .conn
            .execute(self.stmt(
                "DELETE FROM publications WHERE id NOT IN (SELECT publication_id FROM authorship)",
                vec![],
            ))
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_dependents(&self, selection: &str, values: Vec<Value>) -> Result<()> {
        for table in ["authorship", "publication_category", "citations"] {
            let sql = format!(
                "DELETE FROM {} WHERE publication_id IN ({})",
                table, selection
            );
            self.conn.execute(self.stmt(&sql, values.clone())).await?;
        }
        Ok(())
    }

    pub async fn drop_abstract_column(&self) -> Result<()> {
        self.conn
            .execute(self.stmt("ALTER TABLE publications DROP COLUMN abstract", vec![]))
            .await?;
        Ok(())
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// DOIs held by more than one publication, compared trimmed and lower-cased
    pub async fn duplicate_dois(&self) -> Result<Vec<DuplicateDoi>> {
        let rows = self
            .conn
            .query_all(self.stmt(
                r#"
                SELECT lower(trim(doi)) AS doi, COUNT(*) AS n
                FROM publications
                WHERE doi IS NOT NULL AND trim(doi) <> ''
                GROUP BY lower(trim(doi))
                HAVING COUNT(*) > 1
                ORDER BY 1
                "#,
                vec![],
            ))
            .await?;

        rows.iter()
            .map(|row| {
                Ok(DuplicateDoi {
                    doi: row.try_get::<String>("", "doi")?,
                    count: row.try_get::<i64>("", "n")?,
                })
            })
            .collect()
    }

    pub async fn count_missing_dois(&self) -> Result<i64> {
        self.count(
            "SELECT COUNT(*) AS n FROM publications WHERE doi IS NULL OR trim(doi) = ''",
            vec![],
        )
        .await
    }

    pub async fn count_blank_affiliations(&self) -> Result<i64> {
        self.count(
            "SELECT COUNT(*) AS n FROM authors WHERE affiliation IS NULL OR trim(affiliation) = ''",
            vec![],
        )
        .await
    }
}

fn candidate_from_row(row: &QueryResult) -> std::result::Result<Candidate, DbErr> {
    Ok(Candidate {
        id: row.try_get::<i32>("", "id")?,
        title: row.try_get::<String>("", "title")?,
        categories: row
            .try_get::<Option<String>>("", "categories")?
            .unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::{exec, memory_pool, scalar, seed_publication, text};

    fn enriched(title: &str, doi: Option<&str>) -> EnrichedPublication {
        EnrichedPublication {
            submitter: "J. Doe".to_string(),
            title: title.to_string(),
            journal_ref: Some("https://example.org/t".to_string()),
            doi: doi.map(str::to_string),
            update_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_upsert_preserves_doi_when_absent() {
        let pool = memory_pool().await.unwrap();
        let id = seed_publication(&pool, "T", Some("D1"), "", Some("A"))
            .await
            .unwrap();
        let repo = Repository::new(pool.conn());

        let upserted = repo.upsert_enriched(&enriched("T", None)).await.unwrap();

        assert_eq!(upserted, id);
        let doi = text(&pool, "SELECT doi FROM publications WHERE id = $1", vec![id.into()])
            .await
            .unwrap();
        assert_eq!(doi.as_deref(), Some("D1"));
        let link = text(&pool, "SELECT journal_ref FROM publications WHERE id = $1", vec![id.into()])
            .await
            .unwrap();
        assert_eq!(link.as_deref(), Some("https://example.org/t"));
    }

    #[tokio::test]
    async fn test_upsert_replaces_doi_when_present() {
        let pool = memory_pool().await.unwrap();
        let id = seed_publication(&pool, "T", Some("D1"), "", None).await.unwrap();
        let repo = Repository::new(pool.conn());

        repo.upsert_enriched(&enriched("T", Some("D2"))).await.unwrap();

        let doi = text(&pool, "SELECT doi FROM publications WHERE id = $1", vec![id.into()])
            .await
            .unwrap();
        assert_eq!(doi.as_deref(), Some("D2"));
    }

    #[tokio::test]
    async fn test_update_enriched_keeps_doi() {
        let pool = memory_pool().await.unwrap();
        let id = seed_publication(&pool, "T", Some("D1"), "", None).await.unwrap();
        let repo = Repository::new(pool.conn());

        repo.update_enriched(id, &enriched("t", None)).await.unwrap();

        let doi = text(&pool, "SELECT doi FROM publications WHERE id = $1", vec![id.into()])
            .await
            .unwrap();
        assert_eq!(doi.as_deref(), Some("D1"));
    }

    #[tokio::test]
    async fn test_dataset_insert_conflicts_on_doi() {
        let pool = memory_pool().await.unwrap();
        let repo = Repository::new(pool.conn());
        let publication = DatasetPublication {
            title: "Paper".to_string(),
            doi: Some("10.1/x".to_string()),
            update_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            ..Default::default()
        };

        assert!(repo.insert_dataset_publication(&publication, true).await.unwrap().is_some());
        let other = DatasetPublication {
            title: "Paper, retitled".to_string(),
            ..publication.clone()
        };
        assert!(repo.insert_dataset_publication(&other, true).await.unwrap().is_none());
        let count = scalar(&pool, "SELECT COUNT(*) FROM publications", vec![]).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_select_candidates_per_category() {
        let pool = memory_pool().await.unwrap();
        let a = seed_publication(&pool, "A1", None, "hep-ph", Some("X")).await.unwrap();
        let b = seed_publication(&pool, "A2", None, "hep-ph math.CO", Some("X")).await.unwrap();
        seed_publication(&pool, "A3", None, "hep-ph", Some("X")).await.unwrap();
        let d = seed_publication(&pool, "B1", None, "math.CO", Some("X")).await.unwrap();

        let repo = Repository::new(pool.conn());
        let candidates = repo.select_candidates(2).await.unwrap();
        let ids: Vec<i32> = candidates.iter().map(|c| c.id).collect();

        // hep-ph yields a and b; math.CO yields b (already taken) and d
        assert_eq!(ids, vec![a, b, d]);
        assert_eq!(candidates[1].categories, "hep-ph math.CO");
    }

    #[tokio::test]
    async fn test_cleaning_deletes() {
        let pool = memory_pool().await.unwrap();
        let short = seed_publication(&pool, "A", None, "hep-ph", Some("X")).await.unwrap();
        seed_publication(&pool, "No authors", None, "", None).await.unwrap();
        let keeper = seed_publication(&pool, "Kept paper", None, "hep-ph", Some("Y"))
            .await
            .unwrap();
        exec(
            &pool,
            "INSERT INTO citations (publication_id, title) VALUES ($1, 'cited')",
            vec![short.into()],
        )
        .await
        .unwrap();

        let repo = Repository::new(pool.conn());
        assert_eq!(repo.delete_short_titles(2).await.unwrap(), 1);
        assert_eq!(repo.delete_without_authors().await.unwrap(), 1);

        let remaining = scalar(&pool, "SELECT COUNT(*) FROM publications", vec![]).await.unwrap();
        assert_eq!(remaining, 1);
        let kept = scalar(&pool, "SELECT id FROM publications", vec![]).await.unwrap();
        assert_eq!(kept, keeper as i64);
        let orphans = scalar(&pool, "SELECT COUNT(*) FROM citations", vec![]).await.unwrap();
        assert_eq!(orphans, 0);
    }

    #[tokio::test]
    async fn test_replace_citations() {
        let pool = memory_pool().await.unwrap();
        let id = seed_publication(&pool, "Paper", None, "", None).await.unwrap();
        let repo = Repository::new(pool.conn());
        let rows = vec![
            CitationRow { title: "One".into(), author: Some("A".into()), year: Some(2019) },
            CitationRow { title: "Two".into(), author: None, year: None },
        ];

        repo.replace_citations(id, &rows).await.unwrap();
        repo.replace_citations(id, &rows[..1]).await.unwrap();

        let count = scalar(&pool, "SELECT COUNT(*) FROM citations", vec![]).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_abstract_column_detected_and_dropped() {
        let pool = memory_pool().await.unwrap();
        let repo = Repository::new(pool.conn());

        assert!(repo.has_abstract_column().await);
        repo.drop_abstract_column().await.unwrap();
        assert!(!repo.has_abstract_column().await);
        assert!(repo.drop_abstract_column().await.is_err());
    }
}

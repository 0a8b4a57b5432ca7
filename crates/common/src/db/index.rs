//! Publication identity index
//!
//! Ingestion writes with DOI as the conflict target while enrichment writes
//! with title, so one publication could otherwise end up in two rows. The
//! index maps the canonical identity (normalized title) and the DOI to the
//! row id, letting both stages find the existing row before they insert.
//!
//! The index is built from the store at the start of a stage and lives for
//! that run only. Nothing is evicted; callers record rows after the write
//! that created them has been committed.

use crate::errors::Result;
use sea_orm::{ConnectionTrait, Statement};
use std::collections::HashMap;

/// Canonical identity key: trimmed, lower-cased, inner whitespace collapsed
pub fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn normalize_doi(doi: &str) -> Option<String> {
    let doi = doi.trim();
    (!doi.is_empty()).then(|| doi.to_lowercase())
}

/// How an index lookup matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexHit {
    Doi(i32),
    Title(i32),
}

impl IndexHit {
    pub fn id(self) -> i32 {
        match self {
            IndexHit::Doi(id) | IndexHit::Title(id) => id,
        }
    }
}

/// Run-scoped lookup table from identity keys to publication ids
#[derive(Debug, Default, Clone)]
pub struct PublicationIndex {
    by_title: HashMap<String, i32>,
    by_doi: HashMap<String, i32>,
}

impl PublicationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the index from every publication currently in the store
    pub async fn load<C: ConnectionTrait>(conn: &C) -> Result<Self> {
        let rows = conn
            .query_all(Statement::from_string(
                conn.get_database_backend(),
                "SELECT id, title, doi FROM publications ORDER BY id",
            ))
            .await?;

        let mut index = Self::new();
        for row in rows {
            let id = row.try_get::<i32>("", "id")?;
            let title = row.try_get::<String>("", "title")?;
            let doi = row.try_get::<Option<String>>("", "doi")?;
            index.record(id, &title, doi.as_deref());
        }

        tracing::debug!(
            titles = index.by_title.len(),
            dois = index.by_doi.len(),
            "Publication index loaded"
        );
        Ok(index)
    }

    /// Remember a committed row. The first id seen for a key wins.
    pub fn record(&mut self, id: i32, title: &str, doi: Option<&str>) {
        let key = normalize_title(title);
        if !key.is_empty() {
            self.by_title.entry(key).or_insert(id);
        }
        if let Some(doi) = doi.and_then(normalize_doi) {
            self.by_doi.entry(doi).or_insert(id);
        }
    }

    /// Fold entries staged during a committed unit of work into this index
    pub fn absorb(&mut self, staged: PublicationIndex) {
        for (key, id) in staged.by_title {
            self.by_title.entry(key).or_insert(id);
        }
        for (doi, id) in staged.by_doi {
            self.by_doi.entry(doi).or_insert(id);
        }
    }

    pub fn by_title(&self, title: &str) -> Option<i32> {
        self.by_title.get(&normalize_title(title)).copied()
    }

    pub fn by_doi(&self, doi: &str) -> Option<i32> {
        normalize_doi(doi).and_then(|doi| self.by_doi.get(&doi).copied())
    }

    /// Look up by DOI first, then by normalized title
    pub fn lookup(&self, title: &str, doi: Option<&str>) -> Option<IndexHit> {
        doi.and_then(|d| self.by_doi(d))
            .map(IndexHit::Doi)
            .or_else(|| self.by_title(title).map(IndexHit::Title))
    }

    /// Whether `doi` may be written to row `id` without colliding with another row
    pub fn doi_available_for(&self, doi: &str, id: i32) -> bool {
        self.by_doi(doi).map_or(true, |owner| owner == id)
    }

    pub fn len(&self) -> usize {
        self.by_title.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_title.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::{memory_pool, seed_publication};

    #[test]
    fn test_normalize_title() {
        assert_eq!(
            normalize_title("  Calculation of prompt diphoton\n  production "),
            "calculation of prompt diphoton production"
        );
        assert_eq!(normalize_title("   "), "");
    }

    #[test]
    fn test_lookup_prefers_doi() {
        let mut index = PublicationIndex::new();
        index.record(1, "Sparsity-certifying Graph Decompositions", None);
        index.record(2, "Another Paper", Some("10.1/x"));

        assert_eq!(
            index.lookup("sparsity-certifying  graph decompositions", None),
            Some(IndexHit::Title(1))
        );
        assert_eq!(
            index.lookup("Sparsity-certifying Graph Decompositions", Some("10.1/X")),
            Some(IndexHit::Doi(2))
        );
        assert_eq!(index.lookup("Unrelated", Some(" ")), None);
    }

    #[test]
    fn test_first_id_wins() {
        let mut index = PublicationIndex::new();
        index.record(1, "Title", Some("10.1/a"));
        index.record(2, "title", Some("10.1/a"));
        assert_eq!(index.by_title("TITLE"), Some(1));
        assert_eq!(index.by_doi("10.1/a"), Some(1));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_doi_available_for() {
        let mut index = PublicationIndex::new();
        index.record(7, "Owner", Some("10.1/x"));
        assert!(index.doi_available_for("10.1/x", 7));
        assert!(!index.doi_available_for("10.1/x", 8));
        assert!(index.doi_available_for("10.1/y", 8));
    }

    #[test]
    fn test_absorb_keeps_existing_entries() {
        let mut index = PublicationIndex::new();
        index.record(1, "Kept", Some("10.1/k"));

        let mut staged = PublicationIndex::new();
        staged.record(2, "kept", None);
        staged.record(3, "New", Some("10.1/n"));
        index.absorb(staged);

        assert_eq!(index.by_title("Kept"), Some(1));
        assert_eq!(index.by_title("new"), Some(3));
        assert_eq!(index.by_doi("10.1/N"), Some(3));
    }

    #[tokio::test]
    async fn test_load_from_store() {
        let pool = memory_pool().await.unwrap();
        let a = seed_publication(&pool, "Paper  A", Some("10.1/a"), "", None)
            .await
            .unwrap();
        let b = seed_publication(&pool, "Paper B", None, "", None).await.unwrap();

        let index = PublicationIndex::load(pool.conn()).await.unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.by_title("paper a"), Some(a));
        assert_eq!(index.by_doi("10.1/A"), Some(a));
        assert_eq!(index.lookup("PAPER B", None), Some(IndexHit::Title(b)));
    }
}

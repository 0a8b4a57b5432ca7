//! Entity resolution for authors and categories
//!
//! Maps free-text names to stable identifiers, inserting a row with
//! placeholder fields the first time a name is seen. Lookup and insert are
//! two statements, so two processes resolving the same new name at once can
//! both insert; pipeline runs are single-process.

use crate::errors::Result;
use crate::UNKNOWN;
use sea_orm::{ConnectionTrait, DbErr, Statement, Value};
use tracing::debug;

/// Kind of entity addressed by a natural key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// Keyed by `authors.name`
    Author,
    /// Keyed by `categories.category_name`
    Category,
}

impl EntityKind {
    fn lookup_sql(self) -> &'static str {
        match self {
            EntityKind::Author => "SELECT id FROM authors WHERE name = $1",
            EntityKind::Category => "SELECT id FROM categories WHERE category_name = $1",
        }
    }

    fn insert_sql(self) -> &'static str {
        match self {
            EntityKind::Author => {
                "INSERT INTO authors (name, affiliation) VALUES ($1, $2) RETURNING id"
            }
            EntityKind::Category => {
                "INSERT INTO categories (category_name) VALUES ($1) RETURNING id"
            }
        }
    }

    fn insert_values(self, key: &str) -> Vec<Value> {
        match self {
            EntityKind::Author => vec![key.into(), UNKNOWN.into()],
            EntityKind::Category => vec![key.into()],
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Author => write!(f, "author"),
            EntityKind::Category => write!(f, "category"),
        }
    }
}

/// Get-or-create resolver running on the caller's connection or transaction
pub struct EntityResolver<'c, C> {
    conn: &'c C,
}

impl<'c, C: ConnectionTrait> EntityResolver<'c, C> {
    pub fn new(conn: &'c C) -> Self {
        Self { conn }
    }

    /// Identifier for `key`, creating the entity if it does not exist yet
    pub async fn resolve(&self, kind: EntityKind, key: &str) -> Result<i32> {
        let backend = self.conn.get_database_backend();

        let existing = self
            .conn
            .query_one(Statement::from_sql_and_values(
                backend,
                kind.lookup_sql(),
                vec![key.into()],
            ))
            .await?;

        if let Some(row) = existing {
            return Ok(row.try_get::<i32>("", "id")?);
        }

        let inserted = self
            .conn
            .query_one(Statement::from_sql_and_values(
                backend,
                kind.insert_sql(),
                kind.insert_values(key),
            ))
            .await?
            .ok_or(DbErr::RecordNotInserted)?;

        let id = inserted.try_get::<i32>("", "id")?;
        debug!(kind = %kind, key = key, id = id, "Created entity");
        Ok(id)
    }

    pub async fn resolve_author(&self, name: &str) -> Result<i32> {
        self.resolve(EntityKind::Author, name).await
    }

    pub async fn resolve_category(&self, code: &str) -> Result<i32> {
        self.resolve(EntityKind::Category, code).await
    }

    /// Link an author to a publication; an existing pair is left alone
    pub async fn link_author(&self, publication_id: i32, author_id: i32) -> Result<()> {
        self.conn
            .execute(Statement::from_sql_and_values(
                self.conn.get_database_backend(),
                "INSERT INTO authorship (author_id, publication_id) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
                vec![author_id.into(), publication_id.into()],
            ))
            .await?;
        Ok(())
    }

    /// Link a category to a publication; an existing pair is left alone
    pub async fn link_category(&self, publication_id: i32, category_id: i32) -> Result<()> {
        self.conn
            .execute(Statement::from_sql_and_values(
                self.conn.get_database_backend(),
                "INSERT INTO publication_category (publication_id, category_id) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
                vec![publication_id.into(), category_id.into()],
            ))
            .await?;
        Ok(())
    }

    /// Resolve and link every author name; blank names are skipped
    pub async fn link_authors<'a, I>(&self, publication_id: i32, names: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut linked = 0;
        for name in names.into_iter().map(str::trim).filter(|n| !n.is_empty()) {
            let author_id = self.resolve_author(name).await?;
            self.link_author(publication_id, author_id).await?;
            linked += 1;
        }
        Ok(linked)
    }

    /// Resolve and link every code of a space separated category string
    pub async fn link_categories(&self, publication_id: i32, categories: &str) -> Result<usize> {
        let mut linked = 0;
        for code in categories.split_whitespace() {
            let category_id = self.resolve_category(code).await?;
            self.link_category(publication_id, category_id).await?;
            linked += 1;
        }
        Ok(linked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::{memory_pool, scalar, text};

    #[tokio::test]
    async fn test_resolve_returns_existing_author() {
        let pool = memory_pool().await.unwrap();
        let resolver = EntityResolver::new(pool.conn());

        let first = resolver.resolve_author("Ada Lovelace").await.unwrap();
        let second = resolver.resolve_author("Ada Lovelace").await.unwrap();

        assert_eq!(first, second);
        let count = scalar(&pool, "SELECT COUNT(*) FROM authors", vec![]).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_new_author_gets_placeholder_affiliation() {
        let pool = memory_pool().await.unwrap();
        let resolver = EntityResolver::new(pool.conn());

        let id = resolver.resolve(EntityKind::Author, "C. Balázs").await.unwrap();
        let affiliation = text(
            &pool,
            "SELECT affiliation FROM authors WHERE id = $1",
            vec![id.into()],
        )
        .await
        .unwrap();

        assert_eq!(affiliation.as_deref(), Some("Unknown"));
    }

    #[tokio::test]
    async fn test_name_variants_are_distinct() {
        let pool = memory_pool().await.unwrap();
        let resolver = EntityResolver::new(pool.conn());

        let a = resolver.resolve_author("E. L. Berger").await.unwrap();
        let b = resolver.resolve_author("E.L. Berger").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_category_links_are_idempotent() {
        let pool = memory_pool().await.unwrap();
        let pub_id = crate::db::testing::seed_publication(&pool, "Paper", None, "", None)
            .await
            .unwrap();
        let resolver = EntityResolver::new(pool.conn());

        assert_eq!(resolver.link_categories(pub_id, "hep-ph math.CO").await.unwrap(), 2);
        assert_eq!(resolver.link_categories(pub_id, "hep-ph").await.unwrap(), 1);

        let links = scalar(&pool, "SELECT COUNT(*) FROM publication_category", vec![])
            .await
            .unwrap();
        let categories = scalar(&pool, "SELECT COUNT(*) FROM categories", vec![])
            .await
            .unwrap();
        assert_eq!(links, 2);
        assert_eq!(categories, 2);
    }

    #[tokio::test]
    async fn test_blank_author_names_skipped() {
        let pool = memory_pool().await.unwrap();
        let pub_id = crate::db::testing::seed_publication(&pool, "Paper", None, "", None)
            .await
            .unwrap();
        let resolver = EntityResolver::new(pool.conn());

        let linked = resolver
            .link_authors(pub_id, ["A. Author", "  ", "B. Author "])
            .await
            .unwrap();
        assert_eq!(linked, 2);
    }
}

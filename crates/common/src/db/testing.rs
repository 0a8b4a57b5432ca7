//! In-memory store for tests
//!
//! A single SQLite connection holds the whole database, so a stage
//! transaction must be committed or dropped before the pool is queried again.

use crate::db::{schema, DbPool};
use crate::errors::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DbBackend, Statement, Value};

/// Fresh in-memory store with every table created
pub async fn memory_pool() -> Result<DbPool> {
    let pool = empty_memory_pool().await?;
    schema::create_tables(pool.conn()).await?;
    Ok(pool)
}

/// Fresh in-memory store without tables, for tests that bring their own DDL
pub async fn empty_memory_pool() -> Result<DbPool> {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1).min_connections(1).sqlx_logging(false);

    let conn = Database::connect(opts).await?;
    Ok(DbPool::from_connection(conn))
}

/// Run a statement with positional values against the pool
pub async fn exec(pool: &DbPool, sql: &str, values: Vec<Value>) -> Result<u64> {
    let stmt = Statement::from_sql_and_values(DbBackend::Sqlite, sql, values);
    Ok(pool.conn().execute(stmt).await?.rows_affected())
}

/// Single integer from a scalar query such as `SELECT COUNT(*) AS n ...`
pub async fn scalar(pool: &DbPool, sql: &str, values: Vec<Value>) -> Result<i64> {
    let stmt = Statement::from_sql_and_values(DbBackend::Sqlite, sql, values);
    let row = pool.conn().query_one(stmt).await?;
    Ok(match row {
        Some(row) => row.try_get_by_index::<i64>(0)?,
        None => 0,
    })
}

/// Optional text value from a single-row query
pub async fn text(pool: &DbPool, sql: &str, values: Vec<Value>) -> Result<Option<String>> {
    let stmt = Statement::from_sql_and_values(DbBackend::Sqlite, sql, values);
    let row = pool.conn().query_one(stmt).await?;
    Ok(match row {
        Some(row) => row.try_get_by_index::<Option<String>>(0)?,
        None => None,
    })
}

/// Insert a publication with an author link, the usual shape after ingestion
pub async fn seed_publication(
    pool: &DbPool,
    title: &str,
    doi: Option<&str>,
    categories: &str,
    author: Option<&str>,
) -> Result<i32> {
    let stmt = Statement::from_sql_and_values(
        DbBackend::Sqlite,
        "INSERT INTO publications (title, doi, categories) VALUES ($1, $2, $3) RETURNING id",
        vec![title.into(), doi.map(str::to_string).into(), categories.into()],
    );
    let id = match pool.conn().query_one(stmt).await? {
        Some(row) => row.try_get::<i32>("", "id")?,
        None => return Err(sea_orm::DbErr::RecordNotInserted.into()),
    };

    if let Some(name) = author {
        let resolver = crate::db::EntityResolver::new(pool.conn());
        let author_id = resolver.resolve_author(name).await?;
        resolver.link_author(id, author_id).await?;
    }

    for code in categories.split_whitespace() {
        let resolver = crate::db::EntityResolver::new(pool.conn());
        let category_id = resolver.resolve_category(code).await?;
        resolver.link_category(id, category_id).await?;
    }

    Ok(id)
}

//! Table bootstrap for development stores and tests
//!
//! Production schemas are managed outside this workspace. This builds the
//! same tables from the entity definitions so a fresh store can be used
//! without external migrations.

use crate::db::models::*;
use crate::errors::Result;
use sea_orm::{ConnectionTrait, EntityTrait, Schema};
use tracing::info;

/// Create every table that does not exist yet, parents before children
pub async fn create_tables<C: ConnectionTrait>(conn: &C) -> Result<()> {
    create_table(conn, PublicationEntity).await?;
    create_table(conn, AuthorEntity).await?;
    create_table(conn, CategoryEntity).await?;
    create_table(conn, AuthorshipEntity).await?;
    create_table(conn, PublicationCategoryEntity).await?;
    create_table(conn, CitationEntity).await?;

    info!("Store tables ready");
    Ok(())
}

async fn create_table<C, E>(conn: &C, entity: E) -> Result<()>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let backend = conn.get_database_backend();
    let schema = Schema::new(backend);

    let mut stmt = schema.create_table_from_entity(entity);
    stmt.if_not_exists();

    conn.execute(backend.build(&stmt)).await?;
    Ok(())
}

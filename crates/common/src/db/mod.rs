//! Database layer for PubForge
//!
//! Provides:
//! - SeaORM entity models
//! - Repository for the statements each stage issues
//! - Entity resolution (get-or-create) for authors and categories
//! - The run-scoped publication identity index
//! - Connection management

pub mod models;
mod index;
mod repository;
mod resolver;
pub mod schema;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use index::{normalize_title, IndexHit, PublicationIndex};
pub use repository::{
    Candidate, CitationRow, DatasetPublication, DuplicateDoi, EnrichedPublication, PublicationKey,
    Repository,
};
pub use resolver::{EntityKind, EntityResolver};

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use backoff::{future::retry, ExponentialBackoff};
use sea_orm::{
    ConnectOptions, Database, DatabaseConnection, DatabaseTransaction, TransactionTrait,
};
use std::time::Duration;
use tracing::{info, warn};

/// Database connection pool wrapper
///
/// Stages take their own transaction from the pool with [`DbPool::begin`];
/// nothing else should touch the pool while that transaction is open.
#[derive(Clone)]
pub struct DbPool {
    conn: DatabaseConnection,
}

impl DbPool {
    /// Connect using the configuration, retrying while the store comes up
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        info!(host = %config.host, database = %config.database, "Connecting to database...");

        let url = config.connection_url()?;
        let mut opts = ConnectOptions::new(url);
        opts.max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(config.connect_timeout())
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .sqlx_logging(false);

        let policy = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(config.connect_retry_secs)),
            ..Default::default()
        };

        let conn = retry(policy, || async {
            Database::connect(opts.clone()).await.map_err(|e| {
                warn!(error = %e, "Database not reachable yet, retrying");
                backoff::Error::transient(e)
            })
        })
        .await
        .map_err(|e| AppError::DatabaseConnection {
            message: format!("Failed to connect: {}", e),
        })?;

        info!("Database connection established");

        Ok(Self { conn })
    }

    /// Wrap an existing connection
    pub fn from_connection(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// The underlying connection, for reads outside a stage transaction
    pub fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Open a stage transaction
    pub async fn begin(&self) -> Result<DatabaseTransaction> {
        self.conn.begin().await.map_err(Into::into)
    }
}

//! Enrichment error types

use pubforge_common::errors::{AppError, SearchError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnrichmentError {
    #[error("Database error: {0}")]
    Database(#[source] AppError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),
}

impl From<AppError> for EnrichmentError {
    fn from(e: AppError) -> Self {
        match e {
            AppError::Search(e) => EnrichmentError::Search(e),
            other => EnrichmentError::Database(other),
        }
    }
}

impl From<sea_orm::DbErr> for EnrichmentError {
    fn from(e: sea_orm::DbErr) -> Self {
        EnrichmentError::Database(AppError::Database(e))
    }
}

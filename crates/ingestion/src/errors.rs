//! Ingestion error types

use pubforge_common::errors::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Dataset not found: {0}")]
    FileNotFound(String),

    #[error("Dataset parse error for {path}: {message}")]
    DatasetParse { path: String, message: String },

    #[error("Database error: {0}")]
    Database(#[source] AppError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<AppError> for IngestionError {
    fn from(e: AppError) -> Self {
        IngestionError::Database(e)
    }
}

impl From<sea_orm::DbErr> for IngestionError {
    fn from(e: sea_orm::DbErr) -> Self {
        IngestionError::Database(AppError::Database(e))
    }
}

//! PubForge Common Library
//!
//! Shared code for all PubForge pipeline stages including:
//! - Configuration management
//! - Error types and handling
//! - Store access: entities, repository, entity resolution, identity index
//! - Scholar search client with rate-limit backoff
//! - Metrics

pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod scholar;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{DbPool, EntityKind, EntityResolver, PublicationIndex, Repository};
pub use errors::{AppError, Result, SearchError};
pub use scholar::{ScholarSearch, SearchResponse};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Placeholder used for unknown authors and affiliations
pub const UNKNOWN: &str = "Unknown";

//! PubForge Ingestion
//!
//! Loads the publication metadata snapshot into the store and prunes
//! degenerate rows afterwards.

pub mod cleaner;
pub mod dataset;
pub mod errors;
pub mod processor;

pub use cleaner::{CleanReport, Cleaner};
pub use dataset::{load_dataset, DatasetRecord};
pub use errors::IngestionError;
pub use processor::{IngestReport, IngestionProcessor};

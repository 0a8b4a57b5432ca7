//! PubForge Enrichment
//!
//! Stages that call the scholar search API:
//! - Enrichment engine: upserts publications found for sampled candidates
//! - Citation collector: stores citation rows per publication
//! - Publication type classifier: derives a type from BibTeX entry kinds

pub mod citations;
pub mod classify;
pub mod engine;
pub mod errors;

pub use citations::{CitationCollector, CitationReport};
pub use classify::{ClassifyReport, PublicationClassifier, PublicationType};
pub use engine::{CycleReport, EnrichmentEngine, EnrichmentReport};
pub use errors::EnrichmentError;

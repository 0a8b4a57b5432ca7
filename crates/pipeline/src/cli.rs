//! Command-line interface

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// PubForge publication metadata pipeline
#[derive(Parser, Debug)]
#[command(name = "pubforge")]
#[command(version, about = "Batch ETL for academic publication metadata")]
pub struct Cli {
    /// Load configuration from this file instead of the config/ directory
    #[arg(short, long, global = true, env = "PUBFORGE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Load the dataset snapshot into the store
    Ingest {
        /// Snapshot to load (defaults to pipeline.dataset_path)
        #[arg(long)]
        dataset: Option<PathBuf>,
    },
    /// Delete degenerate publications and drop the abstract column
    Clean,
    /// Enrich sampled publications through the search API
    Enrich {
        /// Number of cycles (defaults to pipeline.enrichment_cycles)
        #[arg(long)]
        cycles: Option<u32>,
    },
    /// Store citation rows for every publication
    Citations,
    /// Derive publication types from BibTeX entries
    Classify,
    /// Report duplicate and missing keys
    Validate,
    /// Run ingest, clean, enrich, citations and validate in order
    Run,
    /// Create missing tables in the configured store
    InitSchema,
}

//! Dataset snapshot loading
//!
//! The snapshot is a JSON array of arXiv-style metadata records. Only
//! `title`, `authors` and `categories` are used for linking; every other
//! field is optional and may be `null`.

use crate::errors::IngestionError;
use chrono::NaiveDate;
use pubforge_common::db::DatasetPublication;
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// One record of the snapshot
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatasetRecord {
    /// Source identifier; a string such as `"0704.0001"` or a number
    pub id: Option<serde_json::Value>,
    pub submitter: Option<String>,
    pub title: Option<String>,
    pub comments: Option<String>,
    #[serde(rename = "journal-ref")]
    pub journal_ref: Option<String>,
    pub doi: Option<String>,
    #[serde(rename = "report-no")]
    pub report_no: Option<String>,
    pub categories: Option<String>,
    pub license: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    /// Comma-space separated author names
    pub authors: Option<String>,
    pub update_date: Option<String>,
}

impl DatasetRecord {
    /// Trimmed title, `None` when missing or blank
    pub fn title(&self) -> Option<&str> {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Trimmed DOI, `None` when missing or blank
    pub fn doi(&self) -> Option<&str> {
        self.doi.as_deref().map(str::trim).filter(|d| !d.is_empty())
    }

    pub fn author_names(&self) -> impl Iterator<Item = &str> {
        self.authors.as_deref().unwrap_or_default().split(", ")
    }

    pub fn categories(&self) -> &str {
        self.categories.as_deref().unwrap_or_default()
    }

    /// Identifier for log lines
    pub fn label(&self) -> String {
        match (&self.id, self.doi()) {
            (Some(serde_json::Value::String(id)), _) => id.clone(),
            (Some(id), _) => id.to_string(),
            (None, Some(doi)) => doi.to_string(),
            (None, None) => self.title().unwrap_or("<untitled>").to_string(),
        }
    }

    /// Row to insert, stamped with `today`
    pub fn to_publication(&self, today: NaiveDate) -> DatasetPublication {
        DatasetPublication {
            submitter: self.submitter.clone(),
            title: self.title().unwrap_or_default().to_string(),
            comments: self.comments.clone(),
            journal_ref: self.journal_ref.clone(),
            doi: self.doi().map(str::to_string),
            report_no: self.report_no.clone(),
            categories: self.categories.clone(),
            license: self.license.clone(),
            abstract_text: self.abstract_text.clone(),
            update_date: today,
        }
    }
}

/// Read and parse the snapshot at `path`
pub async fn load_dataset(path: &Path) -> Result<Vec<DatasetRecord>, IngestionError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => IngestionError::FileNotFound(path.display().to_string()),
        _ => IngestionError::Io(e),
    })?;

    let records: Vec<DatasetRecord> =
        serde_json::from_slice(&bytes).map_err(|e| IngestionError::DatasetParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

    info!(path = %path.display(), records = records.len(), "Dataset loaded");
    Ok(records)
}

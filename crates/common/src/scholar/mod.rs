//! Scholar search abstraction
//!
//! Provides a single interface over the publication search API:
//! - SerpApi Google Scholar client with rate-limit backoff
//! - Scripted mock client for tests
//!
//! Every implementation answers with `Ok(Some(response))`, `Ok(None)` when
//! no result could be obtained (rate limit exhausted, network failure), or a
//! terminal [`SearchError`].

mod retry;
mod serpapi;

#[cfg(any(test, feature = "test-util"))]
mod mock;

pub use crate::errors::SearchError;
pub use retry::{run_with_backoff, AttemptOutcome, RetryPolicy};
pub use serpapi::SerpApiClient;

#[cfg(any(test, feature = "test-util"))]
pub use mock::{organic_result, MockSearchClient};

use async_trait::async_trait;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Result type of a search query
pub type SearchResult<T> = std::result::Result<T, SearchError>;

/// Trait for publication search
#[async_trait]
pub trait ScholarSearch: Send + Sync {
    /// Search for `term`; `None` means no result could be obtained
    async fn query(&self, term: &str) -> SearchResult<Option<SearchResponse>>;
}

/// Search API response. Unknown fields are ignored, missing ones default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchResponse {
    pub organic_results: Vec<OrganicResult>,
    /// Citation export entries, present on citation lookups
    pub results: Vec<BibResult>,
}

/// One matched publication
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganicResult {
    pub title: String,
    pub link: String,
    pub result_id: String,
    pub snippet: String,
    pub publication_info: PublicationInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublicationInfo {
    pub authors: Vec<ResultAuthor>,
    /// Free text such as `"J Doe, A Roe - Physical Review D, 2007 - APS"`
    pub summary: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultAuthor {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BibResult {
    pub bib_entry: String,
}

impl OrganicResult {
    /// Trimmed title, `None` when blank
    pub fn title(&self) -> Option<&str> {
        let title = self.title.trim();
        (!title.is_empty()).then_some(title)
    }

    /// Result identifier used in place of a DOI, `None` when blank
    pub fn doi(&self) -> Option<&str> {
        let id = self.result_id.trim();
        (!id.is_empty()).then_some(id)
    }

    pub fn link(&self) -> Option<&str> {
        let link = self.link.trim();
        (!link.is_empty()).then_some(link)
    }

    /// Every listed author name, in order
    pub fn author_names(&self) -> impl Iterator<Item = &str> {
        self.publication_info
            .authors
            .iter()
            .map(|a| a.name.trim())
            .filter(|n| !n.is_empty())
    }

    /// First listed author, if any
    pub fn first_author(&self) -> Option<&str> {
        self.author_names().next()
    }

    /// Trimmed text before the first `-` of the summary; empty when nothing
    /// precedes it, `None` when the summary has no `-`
    pub fn summary_author(&self) -> Option<&str> {
        let (author, _) = self.publication_info.summary.split_once('-')?;
        Some(author.trim())
    }

    /// Last plausible publication year in the summary
    pub fn summary_year(&self) -> Option<i32> {
        static YEAR: OnceLock<Regex> = OnceLock::new();
        let re = YEAR.get_or_init(|| Regex::new(r"\b(18|19|20)\d{2}\b").expect("valid year pattern"));

        re.find_iter(&self.publication_info.summary)
            .last()
            .and_then(|m| m.as_str().parse().ok())
    }
}

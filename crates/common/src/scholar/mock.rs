//! Scripted search client for tests

use super::{
    BibResult, OrganicResult, PublicationInfo, ResultAuthor, ScholarSearch, SearchResponse,
    SearchResult,
};
use crate::errors::SearchError;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

#[derive(Debug, Clone)]
enum Scripted {
    Response(SearchResponse),
    NoResult,
    Status(u16),
}

/// Mock search client answering from per-term scripts.
///
/// Each term has a queue of answers. Answers are consumed in order and the
/// last one repeats; an unscripted term gets no result.
#[derive(Debug, Default)]
pub struct MockSearchClient {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<String>>,
}

impl MockSearchClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, term: &str, answer: Scripted) -> &Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(term.to_string())
            .or_default()
            .push_back(answer);
        self
    }

    /// Answer `term` with `response`
    pub fn respond(&self, term: &str, response: SearchResponse) -> &Self {
        self.push(term, Scripted::Response(response))
    }

    /// Answer `term` with organic results
    pub fn respond_with(&self, term: &str, results: Vec<OrganicResult>) -> &Self {
        self.respond(
            term,
            SearchResponse {
                organic_results: results,
                ..Default::default()
            },
        )
    }

    /// Answer `term` with BibTeX entries
    pub fn respond_with_bib(&self, term: &str, entries: &[&str]) -> &Self {
        self.respond(
            term,
            SearchResponse {
                results: entries
                    .iter()
                    .map(|e| BibResult {
                        bib_entry: e.to_string(),
                    })
                    .collect(),
                ..Default::default()
            },
        )
    }

    /// Answer `term` with no result, as after exhausted rate-limit retries
    pub fn no_result(&self, term: &str) -> &Self {
        self.push(term, Scripted::NoResult)
    }

    /// Answer `term` with a terminal upstream status
    pub fn fail(&self, term: &str, status: u16) -> &Self {
        self.push(term, Scripted::Status(status))
    }

    /// Every queried term, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, term: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|t| *t == term).count()
    }
}

#[async_trait]
impl ScholarSearch for MockSearchClient {
    async fn query(&self, term: &str) -> SearchResult<Option<SearchResponse>> {
        self.calls.lock().unwrap().push(term.to_string());

        let answer = {
            let mut scripts = self.scripts.lock().unwrap();
            match scripts.get_mut(term) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match answer {
            Some(Scripted::Response(response)) => Ok(Some(response)),
            Some(Scripted::NoResult) | None => Ok(None),
            Some(Scripted::Status(status)) => Err(SearchError::UpstreamStatus {
                status,
                body: "scripted failure".to_string(),
            }),
        }
    }
}

/// Organic result with the fields the pipeline reads
pub fn organic_result(title: &str, result_id: &str, authors: &[&str]) -> OrganicResult {
    OrganicResult {
        title: title.to_string(),
        link: format!("https://scholar.example.org/{}", result_id),
        result_id: result_id.to_string(),
        snippet: String::new(),
        publication_info: PublicationInfo {
            authors: authors
                .iter()
                .map(|name| ResultAuthor {
                    name: name.to_string(),
                })
                .collect(),
            summary: String::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_answers_in_order_last_repeats() {
        let client = MockSearchClient::new();
        client
            .fail("T", 500)
            .respond_with("T", vec![organic_result("T", "r1", &["A"])]);

        assert!(client.query("T").await.is_err());
        assert_eq!(client.query("T").await.unwrap().unwrap().organic_results.len(), 1);
        assert!(client.query("T").await.unwrap().is_some());
        assert!(client.query("other").await.unwrap().is_none());

        assert_eq!(client.call_count("T"), 3);
        assert_eq!(client.calls().len(), 4);
    }
}

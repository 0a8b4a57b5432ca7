//! SerpApi Google Scholar client

use super::retry::{run_with_backoff, AttemptOutcome, RetryPolicy};
use super::{ScholarSearch, SearchResponse, SearchResult};
use crate::config::SearchConfig;
use crate::errors::{Result, SearchError};
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::StatusCode;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::debug;

/// Longest upstream error body kept in a [`SearchError`]
const MAX_ERROR_BODY: usize = 512;

/// Search client for the SerpApi HTTP endpoint
pub struct SerpApiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    engine: String,
    results_per_query: String,
    language: String,
    policy: RetryPolicy,
    throttle: Option<Arc<DefaultDirectRateLimiter>>,
}

impl SerpApiClient {
    /// Create a client from configuration. Fails when no API key is configured.
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let api_key = config.require_api_key()?.to_string();

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        // No burst: consecutive requests are at least 1/rps apart
        let throttle = NonZeroU32::new(config.requests_per_second).map(|rps| {
            Arc::new(RateLimiter::direct(
                Quota::per_second(rps).allow_burst(NonZeroU32::MIN),
            ))
        });

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key,
            engine: config.engine.clone(),
            results_per_query: config.results_per_query.to_string(),
            language: config.language.clone(),
            policy: RetryPolicy::from_config(config),
            throttle,
        })
    }

    /// Override the retry policy
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    async fn attempt(&self, term: &str) -> AttemptOutcome<SearchResponse> {
        if let Some(throttle) = &self.throttle {
            throttle.until_ready().await;
        }

        let sent = self
            .client
            .get(&self.base_url)
            .query(&[
                ("engine", self.engine.as_str()),
                ("q", term),
                ("start", "0"),
                ("num", self.results_per_query.as_str()),
                ("api_key", self.api_key.as_str()),
                ("hl", self.language.as_str()),
            ])
            .send()
            .await;

        let response = match sent {
            Ok(response) => response,
            Err(e) => return AttemptOutcome::Unreachable(e.to_string()),
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return AttemptOutcome::RateLimited;
        }

        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            body.truncate(floor_char_boundary(&body, MAX_ERROR_BODY));
            return AttemptOutcome::Failed(SearchError::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => return AttemptOutcome::Unreachable(e.to_string()),
        };

        match serde_json::from_slice::<SearchResponse>(&bytes) {
            Ok(parsed) => AttemptOutcome::Done(parsed),
            Err(e) => AttemptOutcome::Failed(SearchError::Decode(e.to_string())),
        }
    }
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    (0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}

#[async_trait]
impl ScholarSearch for SerpApiClient {
    async fn query(&self, term: &str) -> SearchResult<Option<SearchResponse>> {
        debug!(term = term, "Querying search API");
        run_with_backoff(&self.policy, |_| self.attempt(term)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use std::time::Duration;

    fn config(base_url: String) -> SearchConfig {
        SearchConfig {
            api_key: Some("test-key".to_string()),
            base_url,
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_api_key_rejected() {
        let config = SearchConfig::default();
        assert!(SerpApiClient::new(&config).is_err());
    }

    #[tokio::test]
    async fn test_query_sends_fixed_parameters() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/search")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("engine".into(), "google_scholar".into()),
                Matcher::UrlEncoded("q".into(), "prompt diphoton".into()),
                Matcher::UrlEncoded("start".into(), "0".into()),
                Matcher::UrlEncoded("num".into(), "2".into()),
                Matcher::UrlEncoded("api_key".into(), "test-key".into()),
                Matcher::UrlEncoded("hl".into(), "en".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"organic_results": [{"title": "Prompt diphoton", "result_id": "r1",
                    "link": "https://example.org/p",
                    "publication_info": {"authors": [{"name": "C Balázs"}]}}]}"#,
            )
            .expect(1)
            .create_async()
            .await;

        let client = SerpApiClient::new(&config(format!("{}/search", server.url()))).unwrap();
        let response = client.query("prompt diphoton").await.unwrap().unwrap();

        mock.assert_async().await;
        assert_eq!(response.organic_results.len(), 1);
        assert_eq!(response.organic_results[0].doi(), Some("r1"));
    }

    #[tokio::test]
    async fn test_server_error_is_terminal() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/search")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("internal")
            .expect(1)
            .create_async()
            .await;

        let client = SerpApiClient::new(&config(format!("{}/search", server.url()))).unwrap();
        let err = client.query("anything").await.unwrap_err();

        mock.assert_async().await;
        assert!(matches!(err, SearchError::UpstreamStatus { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_rate_limit_exhaustion_returns_none() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/search")
            .match_query(Matcher::Any)
            .with_status(429)
            .expect(5)
            .create_async()
            .await;

        let client = SerpApiClient::new(&config(format!("{}/search", server.url())))
            .unwrap()
            .with_policy(RetryPolicy::new(5, Duration::ZERO));
        let result = client.query("anything").await.unwrap();

        mock.assert_async().await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_undecodable_body_is_terminal() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/search")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let client = SerpApiClient::new(&config(format!("{}/search", server.url()))).unwrap();
        let err = client.query("anything").await.unwrap_err();

        assert!(matches!(err, SearchError::Decode(_)));
    }

    #[tokio::test]
    async fn test_throttle_spaces_requests() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/search")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"organic_results": []}"#)
            .expect(3)
            .create_async()
            .await;

        // governor keeps its own clock, so this runs in real time
        let client = SerpApiClient::new(&SearchConfig {
            requests_per_second: 4,
            ..config(format!("{}/search", server.url()))
        })
        .unwrap();

        let start = std::time::Instant::now();
        for term in ["a", "b", "c"] {
            assert!(client.query(term).await.unwrap().is_some());
        }
        let elapsed = start.elapsed();

        mock.assert_async().await;
        assert!(elapsed >= Duration::from_millis(450), "elapsed {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_no_result() {
        let client = SerpApiClient::new(&config("http://127.0.0.1:9/search".to_string())).unwrap();
        let result = client.query("anything").await.unwrap();
        assert!(result.is_none());
    }
}

//! Candidate-link discovery via an external search provider.
//!
//! One search query per call, the document title verbatim as the query.
//! Provider errors propagate as [`PostforgeError::Search`] — an error is a
//! different condition than a genuinely empty result set, and the caller
//! must be able to tell them apart. An empty result set is a normal,
//! non-error outcome handled one level up.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, instrument};

use postforge_shared::{CandidateLink, PostforgeError, Result};

/// Timeout for a single search call.
const SEARCH_TIMEOUT: Duration = Duration::from_secs(15);

// ---------------------------------------------------------------------------
// Provider response shape
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    link: String,
}

// ---------------------------------------------------------------------------
// SerpClient
// ---------------------------------------------------------------------------

/// Search client for a SERP-style JSON API.
#[derive(Debug, Clone)]
pub struct SerpClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    engine: String,
    max_results: usize,
}

impl SerpClient {
    /// Create a client against `base_url` (the provider origin, no path).
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        engine: impl Into<String>,
        max_results: usize,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(SEARCH_TIMEOUT)
            .build()
            .map_err(|e| PostforgeError::Search(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            engine: engine.into(),
            max_results,
        })
    }

    /// Query the provider for pages on `topic`, bounded to `max_results`
    /// candidates in provider ranking order.
    #[instrument(skip(self), fields(topic = %topic))]
    pub async fn discover(&self, topic: &str) -> Result<Vec<CandidateLink>> {
        let url = format!("{}/search.json", self.base_url);
        let num = self.max_results.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", topic),
                ("num", num.as_str()),
                ("engine", self.engine.as_str()),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| PostforgeError::Search(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PostforgeError::Search(format!(
                "provider returned HTTP {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| PostforgeError::Search(format!("invalid provider response: {e}")))?;

        let candidates: Vec<CandidateLink> = parsed
            .organic_results
            .into_iter()
            .take(self.max_results)
            .map(|r| CandidateLink {
                title: r.title,
                url: r.link,
            })
            .collect();

        debug!(count = candidates.len(), "search complete");
        Ok(candidates)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> SerpClient {
        SerpClient::new(server.uri(), "test-key", "google", 5).expect("build client")
    }

    #[tokio::test]
    async fn parses_organic_results_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search.json"))
            .and(query_param("q", "rust web scraping"))
            .and(query_param("num", "5"))
            .and(query_param("engine", "google"))
            .and(query_param("api_key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "organic_results": [
                    {"title": "First", "link": "https://a.test/1"},
                    {"title": "Second", "link": "https://b.test/2"},
                ]
            })))
            .mount(&server)
            .await;

        let candidates = client(&server)
            .discover("rust web scraping")
            .await
            .expect("discover");
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].title, "First");
        assert_eq!(candidates[0].url, "https://a.test/1");
        assert_eq!(candidates[1].url, "https://b.test/2");
    }

    #[tokio::test]
    async fn empty_results_is_ok_not_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let candidates = client(&server).discover("anything").await.expect("discover");
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn provider_error_propagates_as_search_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search.json"))
            .respond_with(
                ResponseTemplate::new(401).set_body_string(r#"{"error":"Invalid API key"}"#),
            )
            .mount(&server)
            .await;

        let err = client(&server).discover("anything").await.unwrap_err();
        assert!(matches!(err, PostforgeError::Search(_)));
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn results_are_capped_at_max() {
        let results: Vec<_> = (0..8)
            .map(|i| serde_json::json!({"title": format!("R{i}"), "link": format!("https://x.test/{i}")}))
            .collect();

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "organic_results": results
            })))
            .mount(&server)
            .await;

        let candidates = client(&server).discover("anything").await.expect("discover");
        assert_eq!(candidates.len(), 5);
        assert_eq!(candidates[4].title, "R4");
    }

    #[tokio::test]
    async fn malformed_response_is_search_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client(&server).discover("anything").await.unwrap_err();
        assert!(matches!(err, PostforgeError::Search(_)));
    }
}

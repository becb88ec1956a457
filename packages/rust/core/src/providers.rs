//! Collaborator seams for the pipelines.
//!
//! The pipelines are generic over these traits rather than holding the
//! concrete network clients, so tests can run them against deterministic
//! stubs. The production implementations simply delegate to the
//! discovery/extract/synthesis clients.

use postforge_shared::{CandidateLink, ExtractedContent, Result};
use postforge_synthesis::{Formatted, Synthesis};

/// Finds candidate reference links for a topic.
pub trait SearchProvider: Send + Sync {
    /// Ordered candidate links, bounded by the provider's result cap.
    /// Provider errors propagate; an empty list is a normal outcome.
    fn discover(&self, topic: &str) -> impl Future<Output = Result<Vec<CandidateLink>>> + Send;
}

/// Fetches a page and extracts its main text. Failure is reported through
/// the `ok` flag, never as an error.
pub trait PageExtractor: Send + Sync {
    fn extract(&self, url: &str) -> impl Future<Output = ExtractedContent> + Send;
}

/// Fetches raw HTML, for pages the caller parses itself (seed index pages).
/// Unlike [`PageExtractor`], a fetch failure here is an error.
pub trait PageFetcher: Send + Sync {
    fn fetch_html(&self, url: &str) -> impl Future<Output = Result<String>> + Send;
}

/// Produces enhanced and cleaned article content via a generative model.
pub trait ArticleSynthesizer: Send + Sync {
    /// Model identifier recorded on enriched documents.
    fn model(&self) -> &str;

    fn synthesize(
        &self,
        title: &str,
        original: &str,
        references: &[ExtractedContent],
    ) -> impl Future<Output = Synthesis> + Send;

    fn format_original(
        &self,
        title: &str,
        original: &str,
    ) -> impl Future<Output = Formatted> + Send;
}

impl SearchProvider for postforge_discovery::SerpClient {
    async fn discover(&self, topic: &str) -> Result<Vec<CandidateLink>> {
        postforge_discovery::SerpClient::discover(self, topic).await
    }
}

impl PageExtractor for postforge_extract::Extractor {
    async fn extract(&self, url: &str) -> ExtractedContent {
        postforge_extract::Extractor::extract(self, url).await
    }
}

impl PageFetcher for postforge_extract::Extractor {
    async fn fetch_html(&self, url: &str) -> Result<String> {
        postforge_extract::Extractor::fetch_html(self, url).await
    }
}

impl ArticleSynthesizer for postforge_synthesis::LlmClient {
    fn model(&self) -> &str {
        postforge_synthesis::LlmClient::model(self)
    }

    async fn synthesize(
        &self,
        title: &str,
        original: &str,
        references: &[ExtractedContent],
    ) -> Synthesis {
        postforge_synthesis::LlmClient::synthesize(self, title, original, references).await
    }

    async fn format_original(&self, title: &str, original: &str) -> Formatted {
        postforge_synthesis::LlmClient::format_original(self, title, original).await
    }
}

/// Progress callback for pipeline runs. The CLI hooks a progress bar in
/// here; tests and headless runs use [`SilentProgress`].
pub trait RunProgress: Send + Sync {
    fn item_started(&self, current: usize, total: usize, title: &str);
    fn item_finished(&self, outcome: &postforge_shared::RunOutcome);
}

/// No-op progress reporter.
pub struct SilentProgress;

impl RunProgress for SilentProgress {
    fn item_started(&self, _current: usize, _total: usize, _title: &str) {}
    fn item_finished(&self, _outcome: &postforge_shared::RunOutcome) {}
}

//! The enrichment pipeline driver.
//!
//! One run makes a single pass over the pending document set. Each document
//! moves through discover → acquire → synthesize → persist; every terminal
//! branch is recorded as a [`RunOutcome`] and no single document's failure
//! interrupts the run. Documents already carrying enhanced content are
//! skipped without any network activity, which makes repeated runs over the
//! same set idempotent and cheap.

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use postforge_shared::{
    CandidateLink, Document, DocumentStore, EnrichmentUpdate, ExtractedContent, Result,
    RunOutcome, RunStatus, RunSummary, TARGET_REFERENCES,
};

use crate::pacing::{CancelFlag, Pacer};
use crate::providers::{ArticleSynthesizer, PageExtractor, RunProgress, SearchProvider};

/// Advisory quality score recorded on successful enrichment.
const QUALITY_SCORE: u8 = 85;

/// Drives the per-document enrichment state machine over a document store.
pub struct EnrichmentPipeline<'a, S, P, X, Y>
where
    S: DocumentStore,
    P: SearchProvider,
    X: PageExtractor,
    Y: ArticleSynthesizer,
{
    store: &'a S,
    search: &'a P,
    extractor: &'a X,
    synthesizer: &'a Y,
    pacer: Pacer,
    cancel: CancelFlag,
    target_references: usize,
}

impl<'a, S, P, X, Y> EnrichmentPipeline<'a, S, P, X, Y>
where
    S: DocumentStore,
    P: SearchProvider,
    X: PageExtractor,
    Y: ArticleSynthesizer,
{
    pub fn new(
        store: &'a S,
        search: &'a P,
        extractor: &'a X,
        synthesizer: &'a Y,
        pacer: Pacer,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            store,
            search,
            extractor,
            synthesizer,
            pacer,
            cancel,
            target_references: TARGET_REFERENCES,
        }
    }

    /// Override the acquisition target (number of successful extractions
    /// that stops the candidate loop).
    pub fn with_target_references(mut self, target: usize) -> Self {
        self.target_references = target;
        self
    }

    /// One full pass over the pending document set.
    ///
    /// Only a store failure while listing documents is an error; everything
    /// that happens to an individual document ends up in the summary.
    #[instrument(skip_all)]
    pub async fn run(&self, progress: &dyn RunProgress) -> Result<RunSummary> {
        let docs = self.store.find_pending().await?;
        let total = docs.len();
        info!(total, "starting enrichment pass");

        let mut summary = RunSummary::default();

        for (i, doc) in docs.iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!(processed = i, "run cancelled, stopping before next document");
                break;
            }

            progress.item_started(i + 1, total, &doc.title);
            let outcome = self.process_document(doc).await;
            match outcome.status {
                RunStatus::Failed => {
                    warn!(url = %doc.url, message = %outcome.message, "document failed")
                }
                _ => info!(url = %doc.url, status = %outcome.status, "document done"),
            }
            progress.item_finished(&outcome);
            summary.push(outcome);

            if i + 1 < total {
                self.pacer.between_documents().await;
            }
        }

        info!(
            success = summary.success_count(),
            failed = summary.failed_count(),
            skipped = summary.skipped_count(),
            "enrichment pass complete"
        );
        Ok(summary)
    }

    /// Run one document through the state machine and report its outcome.
    async fn process_document(&self, doc: &Document) -> RunOutcome {
        let outcome = |status, message: String| RunOutcome {
            document_id: doc.id.to_string(),
            title: doc.title.clone(),
            status,
            message,
        };

        // Already enhanced: no network activity at all.
        if doc.is_enhanced() {
            return outcome(RunStatus::Skipped, "already has updated content".into());
        }

        // Discover. A provider error fails this document only.
        let candidates = match self.search.discover(&doc.title).await {
            Ok(candidates) => candidates,
            Err(e) => return outcome(RunStatus::Failed, format!("search failed: {e}")),
        };
        if candidates.is_empty() {
            return outcome(RunStatus::Failed, "no related articles found".into());
        }

        // Acquire references, stopping at the target count.
        let references = self.acquire_references(&candidates).await;
        if references.is_empty() {
            return outcome(
                RunStatus::Failed,
                "failed to extract any reference articles".into(),
            );
        }

        // Synthesize. Not retried within a run.
        let synthesis = self
            .synthesizer
            .synthesize(&doc.title, &doc.original_content, &references)
            .await;
        if !synthesis.ok {
            return outcome(RunStatus::Failed, "synthesis produced no usable content".into());
        }

        // Persist exactly the enrichment fields, keyed by the stable URL.
        let source_count = synthesis.sources.len();
        let update = EnrichmentUpdate {
            updated_content: synthesis.updated_content,
            sources: synthesis.sources,
            model: self.synthesizer.model().to_string(),
            enriched_at: Utc::now(),
            quality_score: QUALITY_SCORE,
        };
        if let Err(e) = self.store.update_enrichment(&doc.url, &update).await {
            // The synthesized content is lost unless an operator recovers it
            // from the debug log.
            debug!(url = %doc.url, content = %update.updated_content, "unpersisted synthesis output");
            return outcome(RunStatus::Failed, format!("store write failed: {e}"));
        }

        outcome(
            RunStatus::Success,
            format!("enhanced with {source_count} sources"),
        )
    }

    /// Try candidates strictly in discovery order, halting the moment the
    /// target number of successful extractions is accumulated. Candidates
    /// past that point are never fetched.
    async fn acquire_references(&self, candidates: &[CandidateLink]) -> Vec<ExtractedContent> {
        let mut references = Vec::new();

        for (i, candidate) in candidates.iter().enumerate() {
            if references.len() >= self.target_references {
                break;
            }
            if i > 0 {
                self.pacer.between_fetches().await;
            }

            let extracted = self.extractor.extract(&candidate.url).await;
            if extracted.ok {
                debug!(url = %candidate.url, "reference extracted");
                references.push(extracted);
            } else {
                debug!(url = %candidate.url, "candidate extraction failed, trying next");
            }
        }

        references
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use postforge_shared::{DocumentId, ENHANCED_MIN_CHARS};
    use postforge_storage::MemoryStore;
    use postforge_synthesis::{Formatted, Synthesis};

    use crate::providers::SilentProgress;

    // -- stub collaborators -------------------------------------------------

    struct StubSearch {
        candidates: Vec<CandidateLink>,
        fail: bool,
        calls: Mutex<usize>,
        cancel_on_call: Option<CancelFlag>,
    }

    impl StubSearch {
        fn with_candidates(urls: &[&str]) -> Self {
            Self {
                candidates: urls
                    .iter()
                    .map(|u| CandidateLink {
                        title: format!("Candidate {u}"),
                        url: (*u).to_string(),
                    })
                    .collect(),
                fail: false,
                calls: Mutex::new(0),
                cancel_on_call: None,
            }
        }

        fn failing() -> Self {
            let mut stub = Self::with_candidates(&[]);
            stub.fail = true;
            stub
        }

        fn call_count(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    impl SearchProvider for StubSearch {
        async fn discover(&self, _topic: &str) -> Result<Vec<CandidateLink>> {
            *self.calls.lock().unwrap() += 1;
            if let Some(flag) = &self.cancel_on_call {
                flag.cancel();
            }
            if self.fail {
                return Err(postforge_shared::PostforgeError::Search(
                    "quota exceeded".into(),
                ));
            }
            Ok(self.candidates.clone())
        }
    }

    struct StubExtractor {
        /// URLs that extract successfully; everything else fails.
        ok_urls: Vec<String>,
        fetched: Mutex<Vec<String>>,
    }

    impl StubExtractor {
        fn ok_for(urls: &[&str]) -> Self {
            Self {
                ok_urls: urls.iter().map(|u| u.to_string()).collect(),
                fetched: Mutex::new(Vec::new()),
            }
        }

        fn fetched_urls(&self) -> Vec<String> {
            self.fetched.lock().unwrap().clone()
        }
    }

    impl PageExtractor for StubExtractor {
        async fn extract(&self, url: &str) -> ExtractedContent {
            self.fetched.lock().unwrap().push(url.to_string());
            let ok = self.ok_urls.iter().any(|u| u == url);
            ExtractedContent {
                url: url.to_string(),
                title: format!("Title of {url}"),
                text: if ok { "t".repeat(150) } else { String::new() },
                ok,
            }
        }
    }

    struct StubSynthesizer {
        fail: bool,
        seen_references: Mutex<Vec<Vec<String>>>,
    }

    impl StubSynthesizer {
        fn new() -> Self {
            Self {
                fail: false,
                seen_references: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            let mut stub = Self::new();
            stub.fail = true;
            stub
        }

        fn last_references(&self) -> Vec<String> {
            self.seen_references
                .lock()
                .unwrap()
                .last()
                .cloned()
                .unwrap_or_default()
        }
    }

    impl ArticleSynthesizer for StubSynthesizer {
        fn model(&self) -> &str {
            "stub-model"
        }

        async fn synthesize(
            &self,
            _title: &str,
            _original: &str,
            references: &[ExtractedContent],
        ) -> Synthesis {
            self.seen_references
                .lock()
                .unwrap()
                .push(references.iter().map(|r| r.url.clone()).collect());

            if self.fail {
                return Synthesis {
                    updated_content: String::new(),
                    sources: Vec::new(),
                    ok: false,
                };
            }
            Synthesis {
                updated_content: "enhanced ".repeat(60),
                sources: references.iter().map(|r| r.url.clone()).collect(),
                ok: true,
            }
        }

        async fn format_original(&self, _title: &str, _original: &str) -> Formatted {
            Formatted {
                content: String::new(),
                ok: false,
            }
        }
    }

    fn doc(url: &str, updated: Option<String>) -> Document {
        Document {
            id: DocumentId::new(),
            url: url.into(),
            title: format!("Post at {url}"),
            author: "Author".into(),
            published: "Jan 1, 2024".into(),
            excerpt: "Excerpt".into(),
            category: None,
            original_content: "o".repeat(400),
            content_hash: "hash".into(),
            formatted_original_content: None,
            updated_content: updated,
            sources: Vec::new(),
            enrichment_model: None,
            enriched_at: None,
            quality_score: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn pipeline<'a>(
        store: &'a MemoryStore,
        search: &'a StubSearch,
        extractor: &'a StubExtractor,
        synthesizer: &'a StubSynthesizer,
    ) -> EnrichmentPipeline<'a, MemoryStore, StubSearch, StubExtractor, StubSynthesizer> {
        EnrichmentPipeline::new(
            store,
            search,
            extractor,
            synthesizer,
            Pacer::none(),
            CancelFlag::new(),
        )
    }

    // -- tests --------------------------------------------------------------

    #[tokio::test]
    async fn full_pass_enriches_and_persists() {
        let store = MemoryStore::with_documents([doc("https://blog.test/a", None)]);
        let search = StubSearch::with_candidates(&["https://ref.test/1", "https://ref.test/2"]);
        let extractor = StubExtractor::ok_for(&["https://ref.test/1", "https://ref.test/2"]);
        let synthesizer = StubSynthesizer::new();

        let summary = pipeline(&store, &search, &extractor, &synthesizer)
            .run(&SilentProgress)
            .await
            .expect("run");

        assert_eq!(summary.success_count(), 1);
        let enriched = store
            .get_by_url("https://blog.test/a")
            .await
            .unwrap()
            .unwrap();
        assert!(enriched.is_enhanced());
        assert_eq!(
            enriched.sources,
            vec!["https://ref.test/1", "https://ref.test/2"]
        );
        assert_eq!(enriched.enrichment_model.as_deref(), Some("stub-model"));
        assert!(enriched.enriched_at.is_some());
        assert_eq!(enriched.quality_score, 85);
    }

    #[tokio::test]
    async fn second_pass_skips_without_network_activity() {
        let store = MemoryStore::with_documents([doc("https://blog.test/a", None)]);
        let search = StubSearch::with_candidates(&["https://ref.test/1"]);
        let extractor = StubExtractor::ok_for(&["https://ref.test/1"]);
        let synthesizer = StubSynthesizer::new();

        let first = pipeline(&store, &search, &extractor, &synthesizer)
            .run(&SilentProgress)
            .await
            .expect("first run");
        assert_eq!(first.success_count(), 1);
        assert_eq!(search.call_count(), 1);

        let second = pipeline(&store, &search, &extractor, &synthesizer)
            .run(&SilentProgress)
            .await
            .expect("second run");
        assert_eq!(second.skipped_count(), 1);
        assert_eq!(second.success_count(), 0);
        // No further search call for the skipped document.
        assert_eq!(search.call_count(), 1);
    }

    #[tokio::test]
    async fn skip_threshold_boundary() {
        // Exactly 200 chars: NOT enhanced, gets re-attempted. 201: skipped.
        let store = MemoryStore::with_documents([
            doc("https://blog.test/at", Some("x".repeat(ENHANCED_MIN_CHARS))),
            doc(
                "https://blog.test/over",
                Some("x".repeat(ENHANCED_MIN_CHARS + 1)),
            ),
        ]);
        let search = StubSearch::with_candidates(&["https://ref.test/1"]);
        let extractor = StubExtractor::ok_for(&["https://ref.test/1"]);
        let synthesizer = StubSynthesizer::new();

        let summary = pipeline(&store, &search, &extractor, &synthesizer)
            .run(&SilentProgress)
            .await
            .expect("run");

        assert_eq!(summary.success_count(), 1);
        assert_eq!(summary.skipped_count(), 1);
        // Only the 200-char document triggered a search.
        assert_eq!(search.call_count(), 1);
    }

    #[tokio::test]
    async fn search_failure_fails_document_but_run_continues() {
        let store = MemoryStore::with_documents([
            doc("https://blog.test/a", None),
            doc("https://blog.test/b", None),
        ]);
        let search = StubSearch::failing();
        let extractor = StubExtractor::ok_for(&[]);
        let synthesizer = StubSynthesizer::new();

        let summary = pipeline(&store, &search, &extractor, &synthesizer)
            .run(&SilentProgress)
            .await
            .expect("run");

        assert_eq!(summary.failed_count(), 2);
        assert_eq!(summary.total(), 2);
        let messages: Vec<_> = summary.failures().map(|o| o.message.clone()).collect();
        assert!(messages.iter().all(|m| m.contains("search failed")));
    }

    #[tokio::test]
    async fn zero_candidates_fails_document() {
        let store = MemoryStore::with_documents([doc("https://blog.test/a", None)]);
        let search = StubSearch::with_candidates(&[]);
        let extractor = StubExtractor::ok_for(&[]);
        let synthesizer = StubSynthesizer::new();

        let summary = pipeline(&store, &search, &extractor, &synthesizer)
            .run(&SilentProgress)
            .await
            .expect("run");

        assert_eq!(summary.failed_count(), 1);
        assert_eq!(summary.outcomes[0].message, "no related articles found");
        assert!(extractor.fetched_urls().is_empty());
    }

    #[tokio::test]
    async fn zero_extractions_fails_document() {
        let store = MemoryStore::with_documents([doc("https://blog.test/a", None)]);
        let search = StubSearch::with_candidates(&["https://ref.test/1", "https://ref.test/2"]);
        let extractor = StubExtractor::ok_for(&[]); // everything fails
        let synthesizer = StubSynthesizer::new();

        let summary = pipeline(&store, &search, &extractor, &synthesizer)
            .run(&SilentProgress)
            .await
            .expect("run");

        assert_eq!(summary.failed_count(), 1);
        // Every candidate was tried before giving up.
        assert_eq!(extractor.fetched_urls().len(), 2);
        // The synthesizer was never invoked.
        assert!(synthesizer.seen_references.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn acquisition_stops_at_two_successes() {
        let store = MemoryStore::with_documents([doc("https://blog.test/a", None)]);
        let search = StubSearch::with_candidates(&[
            "https://ref.test/1",
            "https://ref.test/2",
            "https://ref.test/3",
        ]);
        // All three would succeed, but the third must never be fetched.
        let extractor = StubExtractor::ok_for(&[
            "https://ref.test/1",
            "https://ref.test/2",
            "https://ref.test/3",
        ]);
        let synthesizer = StubSynthesizer::new();

        let summary = pipeline(&store, &search, &extractor, &synthesizer)
            .run(&SilentProgress)
            .await
            .expect("run");

        assert_eq!(summary.success_count(), 1);
        assert_eq!(
            extractor.fetched_urls(),
            vec!["https://ref.test/1", "https://ref.test/2"]
        );
    }

    #[tokio::test]
    async fn failed_candidate_is_replaced_by_later_one() {
        // Candidates 1 and 3 extract, candidate 2 fails: synthesis must see
        // exactly 1 and 3, and sources must record them in that order.
        let store = MemoryStore::with_documents([doc("https://blog.test/a", None)]);
        let search = StubSearch::with_candidates(&[
            "https://ref.test/1",
            "https://ref.test/2",
            "https://ref.test/3",
        ]);
        let extractor = StubExtractor::ok_for(&["https://ref.test/1", "https://ref.test/3"]);
        let synthesizer = StubSynthesizer::new();

        let summary = pipeline(&store, &search, &extractor, &synthesizer)
            .run(&SilentProgress)
            .await
            .expect("run");

        assert_eq!(summary.success_count(), 1);
        assert_eq!(
            synthesizer.last_references(),
            vec!["https://ref.test/1", "https://ref.test/3"]
        );
        let enriched = store
            .get_by_url("https://blog.test/a")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            enriched.sources,
            vec!["https://ref.test/1", "https://ref.test/3"]
        );
    }

    #[tokio::test]
    async fn single_reference_is_enough() {
        let store = MemoryStore::with_documents([doc("https://blog.test/a", None)]);
        let search = StubSearch::with_candidates(&["https://ref.test/1", "https://ref.test/2"]);
        let extractor = StubExtractor::ok_for(&["https://ref.test/2"]);
        let synthesizer = StubSynthesizer::new();

        let summary = pipeline(&store, &search, &extractor, &synthesizer)
            .run(&SilentProgress)
            .await
            .expect("run");

        assert_eq!(summary.success_count(), 1);
        assert_eq!(synthesizer.last_references(), vec!["https://ref.test/2"]);
    }

    #[tokio::test]
    async fn sources_are_subset_of_discovered_candidates() {
        let candidate_urls = ["https://ref.test/1", "https://ref.test/2"];
        let store = MemoryStore::with_documents([doc("https://blog.test/a", None)]);
        let search = StubSearch::with_candidates(&candidate_urls);
        let extractor = StubExtractor::ok_for(&candidate_urls);
        let synthesizer = StubSynthesizer::new();

        pipeline(&store, &search, &extractor, &synthesizer)
            .run(&SilentProgress)
            .await
            .expect("run");

        let enriched = store
            .get_by_url("https://blog.test/a")
            .await
            .unwrap()
            .unwrap();
        assert!(!enriched.sources.is_empty());
        for source in &enriched.sources {
            assert!(candidate_urls.contains(&source.as_str()));
        }
    }

    #[tokio::test]
    async fn synthesis_failure_fails_document_without_persisting() {
        let store = MemoryStore::with_documents([doc("https://blog.test/a", None)]);
        let search = StubSearch::with_candidates(&["https://ref.test/1"]);
        let extractor = StubExtractor::ok_for(&["https://ref.test/1"]);
        let synthesizer = StubSynthesizer::failing();

        let summary = pipeline(&store, &search, &extractor, &synthesizer)
            .run(&SilentProgress)
            .await
            .expect("run");

        assert_eq!(summary.failed_count(), 1);
        let untouched = store
            .get_by_url("https://blog.test/a")
            .await
            .unwrap()
            .unwrap();
        assert!(untouched.updated_content.is_none());
        assert!(untouched.sources.is_empty());
    }

    #[tokio::test]
    async fn persistence_failure_is_recorded_not_fatal() {
        // Empty store: update_enrichment has no matching row and errors.
        // Hand the pipeline a pending document the store does not hold.
        struct PhantomStore {
            inner: MemoryStore,
            phantom: Document,
        }

        impl DocumentStore for PhantomStore {
            async fn find_pending(&self) -> Result<Vec<Document>> {
                Ok(vec![self.phantom.clone()])
            }
            async fn get_by_url(&self, url: &str) -> Result<Option<Document>> {
                self.inner.get_by_url(url).await
            }
            async fn insert_if_absent(&self, d: &Document) -> Result<bool> {
                self.inner.insert_if_absent(d).await
            }
            async fn update_enrichment(&self, url: &str, u: &EnrichmentUpdate) -> Result<()> {
                self.inner.update_enrichment(url, u).await
            }
            async fn update_formatted(&self, url: &str, f: &str) -> Result<()> {
                self.inner.update_formatted(url, f).await
            }
            async fn list(&self) -> Result<Vec<Document>> {
                self.inner.list().await
            }
        }

        let store = PhantomStore {
            inner: MemoryStore::new(),
            phantom: doc("https://blog.test/ghost", None),
        };
        let search = StubSearch::with_candidates(&["https://ref.test/1"]);
        let extractor = StubExtractor::ok_for(&["https://ref.test/1"]);
        let synthesizer = StubSynthesizer::new();

        let summary = EnrichmentPipeline::new(
            &store,
            &search,
            &extractor,
            &synthesizer,
            Pacer::none(),
            CancelFlag::new(),
        )
        .run(&SilentProgress)
        .await
        .expect("run");

        assert_eq!(summary.failed_count(), 1);
        assert!(summary.outcomes[0].message.contains("store write failed"));
    }

    #[tokio::test]
    async fn cancellation_stops_before_next_document() {
        let store = MemoryStore::with_documents([
            doc("https://blog.test/a", None),
            doc("https://blog.test/b", None),
        ]);
        let cancel = CancelFlag::new();
        let mut search = StubSearch::with_candidates(&["https://ref.test/1"]);
        search.cancel_on_call = Some(cancel.clone());
        let extractor = StubExtractor::ok_for(&["https://ref.test/1"]);
        let synthesizer = StubSynthesizer::new();

        let summary = EnrichmentPipeline::new(
            &store,
            &search,
            &extractor,
            &synthesizer,
            Pacer::none(),
            cancel,
        )
        .run(&SilentProgress)
        .await
        .expect("run");

        // The in-flight document finished; the second never started.
        assert_eq!(summary.total(), 1);
        assert_eq!(summary.success_count(), 1);
        assert_eq!(search.call_count(), 1);
    }
}

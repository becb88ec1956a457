//! Seed ingestion: load the oldest posts from a blog index page into the
//! document store.
//!
//! A failure to fetch or parse the index page aborts the whole run, since
//! nothing can proceed without it. Per-post failures behave like the other
//! pipelines: recorded as outcomes, never fatal.

use chrono::Utc;
use tracing::{info, instrument, warn};

use postforge_extract::seed::{oldest, parse_seed_index};
use postforge_shared::{
    Document, DocumentId, DocumentStore, PostforgeError, Result, RunOutcome, RunStatus,
    RunSummary, SeedPost,
};
use postforge_storage::content_hash;

use crate::pacing::Pacer;
use crate::providers::{PageExtractor, PageFetcher, RunProgress};

/// Ingests seed posts from a blog index page.
pub struct Ingestor<'a, S, X>
where
    S: DocumentStore,
    X: PageFetcher + PageExtractor,
{
    store: &'a S,
    extractor: &'a X,
    pacer: Pacer,
}

impl<'a, S, X> Ingestor<'a, S, X>
where
    S: DocumentStore,
    X: PageFetcher + PageExtractor,
{
    pub fn new(store: &'a S, extractor: &'a X, pacer: Pacer) -> Self {
        Self {
            store,
            extractor,
            pacer,
        }
    }

    /// Ingest the `count` oldest posts listed at `index_url`.
    #[instrument(skip(self, progress))]
    pub async fn run(
        &self,
        index_url: &str,
        count: usize,
        progress: &dyn RunProgress,
    ) -> Result<RunSummary> {
        let html = self.extractor.fetch_html(index_url).await?;
        let posts = parse_seed_index(&html);
        if posts.is_empty() {
            return Err(PostforgeError::extraction(
                index_url,
                "no post cards found on index page",
            ));
        }

        let picked = oldest(&posts, count);
        let total = picked.len();
        info!(found = posts.len(), total, "ingesting seed posts");

        let mut summary = RunSummary::default();
        for (i, post) in picked.iter().enumerate() {
            progress.item_started(i + 1, total, &post.title);
            let outcome = self.ingest_post(post).await;
            progress.item_finished(&outcome);
            summary.push(outcome);

            if i + 1 < total {
                self.pacer.between_fetches().await;
            }
        }

        info!(
            success = summary.success_count(),
            failed = summary.failed_count(),
            skipped = summary.skipped_count(),
            "ingestion complete"
        );
        Ok(summary)
    }

    async fn ingest_post(&self, post: &SeedPost) -> RunOutcome {
        let outcome = |id: String, status, message: String| RunOutcome {
            document_id: id,
            title: post.title.clone(),
            status,
            message,
        };

        // Already ingested: no fetch.
        match self.store.get_by_url(&post.url).await {
            Ok(Some(existing)) => {
                return outcome(
                    existing.id.to_string(),
                    RunStatus::Skipped,
                    "already ingested".into(),
                );
            }
            Ok(None) => {}
            Err(e) => {
                return outcome(
                    String::new(),
                    RunStatus::Failed,
                    format!("store lookup failed: {e}"),
                );
            }
        }

        let extracted = self.extractor.extract(&post.url).await;
        if !extracted.ok {
            warn!(url = %post.url, "post content extraction failed, not ingesting");
            return outcome(
                String::new(),
                RunStatus::Failed,
                "content extraction failed".into(),
            );
        }

        let now = Utc::now();
        let doc = Document {
            id: DocumentId::new(),
            url: post.url.clone(),
            title: post.title.clone(),
            author: post.author.clone(),
            published: post.published.clone(),
            excerpt: post.excerpt.clone(),
            category: Some(post.category.clone()),
            content_hash: content_hash(&extracted.text),
            original_content: extracted.text,
            formatted_original_content: None,
            updated_content: None,
            sources: Vec::new(),
            enrichment_model: None,
            enriched_at: None,
            quality_score: 0,
            created_at: now,
            updated_at: now,
        };

        match self.store.insert_if_absent(&doc).await {
            Ok(true) => outcome(doc.id.to_string(), RunStatus::Success, "ingested".into()),
            Ok(false) => outcome(
                doc.id.to_string(),
                RunStatus::Skipped,
                "already ingested".into(),
            ),
            Err(e) => outcome(
                String::new(),
                RunStatus::Failed,
                format!("store write failed: {e}"),
            ),
        }
    }
}

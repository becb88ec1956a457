//! The storage capability consumed by the pipelines.
//!
//! Pipelines are generic over [`DocumentStore`] so they can be exercised
//! against an in-memory store in tests; `postforge-storage` provides the
//! libSQL implementation used in production.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::Document;

/// Enrichment fields written after a successful synthesis.
///
/// Exactly these fields are updated on the matching document; the original
/// content and ingestion metadata are never touched by enrichment.
#[derive(Debug, Clone)]
pub struct EnrichmentUpdate {
    pub updated_content: String,
    pub sources: Vec<String>,
    pub model: String,
    pub enriched_at: DateTime<Utc>,
    pub quality_score: u8,
}

/// Store of documents and their enrichment status.
///
/// Documents are unique by source URL; that constraint is load-bearing for
/// the pipeline, which assumes at most one document per URL when persisting.
pub trait DocumentStore {
    /// All documents eligible for a pipeline pass, oldest first. The
    /// already-enhanced skip decision belongs to the caller, not the store.
    fn find_pending(&self) -> impl Future<Output = Result<Vec<Document>>> + Send;

    /// Look up a document by its stable URL key.
    fn get_by_url(&self, url: &str) -> impl Future<Output = Result<Option<Document>>> + Send;

    /// Insert a document unless one with the same URL already exists.
    /// Returns `true` if a row was created.
    fn insert_if_absent(&self, doc: &Document) -> impl Future<Output = Result<bool>> + Send;

    /// Update the enrichment fields of the document with the given URL.
    fn update_enrichment(
        &self,
        url: &str,
        update: &EnrichmentUpdate,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Store the cleaned restatement of the original content.
    fn update_formatted(
        &self,
        url: &str,
        formatted: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// All documents, oldest first. For operator listings.
    fn list(&self) -> impl Future<Output = Result<Vec<Document>>> + Send;
}

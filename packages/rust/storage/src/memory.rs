//! In-memory [`DocumentStore`] for tests and dry runs.

use std::sync::Mutex;

use chrono::Utc;

use postforge_shared::{Document, DocumentStore, EnrichmentUpdate, PostforgeError, Result};

/// Stores documents in a `Mutex<Vec<_>>`, preserving insertion order.
/// Enforces the same URL uniqueness as the SQL store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: Mutex<Vec<Document>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with documents, ignoring URL duplicates.
    pub fn with_documents(docs: impl IntoIterator<Item = Document>) -> Self {
        let store = Self::new();
        {
            let mut guard = store.docs.lock().expect("store lock");
            for doc in docs {
                if !guard.iter().any(|d| d.url == doc.url) {
                    guard.push(doc);
                }
            }
        }
        store
    }
}

impl DocumentStore for MemoryStore {
    async fn find_pending(&self) -> Result<Vec<Document>> {
        let mut docs = self.docs.lock().expect("store lock").clone();
        docs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(docs)
    }

    async fn get_by_url(&self, url: &str) -> Result<Option<Document>> {
        Ok(self
            .docs
            .lock()
            .expect("store lock")
            .iter()
            .find(|d| d.url == url)
            .cloned())
    }

    async fn insert_if_absent(&self, doc: &Document) -> Result<bool> {
        let mut guard = self.docs.lock().expect("store lock");
        if guard.iter().any(|d| d.url == doc.url) {
            return Ok(false);
        }
        guard.push(doc.clone());
        Ok(true)
    }

    async fn update_enrichment(&self, url: &str, update: &EnrichmentUpdate) -> Result<()> {
        let mut guard = self.docs.lock().expect("store lock");
        let doc = guard
            .iter_mut()
            .find(|d| d.url == url)
            .ok_or_else(|| PostforgeError::Storage(format!("no document with url {url}")))?;

        doc.updated_content = Some(update.updated_content.clone());
        doc.sources = update.sources.clone();
        doc.enrichment_model = Some(update.model.clone());
        doc.enriched_at = Some(update.enriched_at);
        doc.quality_score = update.quality_score;
        doc.updated_at = Utc::now();
        Ok(())
    }

    async fn update_formatted(&self, url: &str, formatted: &str) -> Result<()> {
        let mut guard = self.docs.lock().expect("store lock");
        let doc = guard
            .iter_mut()
            .find(|d| d.url == url)
            .ok_or_else(|| PostforgeError::Storage(format!("no document with url {url}")))?;

        doc.formatted_original_content = Some(formatted.to_string());
        doc.updated_at = Utc::now();
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Document>> {
        self.find_pending().await
    }
}

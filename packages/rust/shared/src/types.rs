//! Core domain types for the Postforge enrichment pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------
//
// All thresholds are character counts, not bytes.

/// A document whose `updated_content` exceeds this many characters is
/// considered already enhanced and is skipped on subsequent runs.
pub const ENHANCED_MIN_CHARS: usize = 200;

/// Minimum extracted text length for an extraction to count as successful.
pub const EXTRACT_OK_MIN_CHARS: usize = 100;

/// A content locator's match is accepted once its text exceeds this length;
/// otherwise the next locator in the chain is tried.
pub const LOCATOR_ACCEPT_MIN_CHARS: usize = 200;

/// Extracted page text is capped at this length to bound downstream payloads.
pub const EXTRACT_CAP_CHARS: usize = 8_000;

/// A reference qualifies for synthesis only if its text exceeds this length.
pub const REFERENCE_MIN_CHARS: usize = 100;

/// Each qualifying reference is truncated to this length in the prompt.
pub const REFERENCE_CAP_CHARS: usize = 3_000;

/// Model output shorter than this is treated as a failed synthesis.
pub const SYNTHESIS_MIN_CHARS: usize = 100;

/// Formatted-original output shorter than this is treated as a failure.
pub const FORMAT_MIN_CHARS: usize = 50;

/// Maximum number of search results requested per discovery call.
pub const MAX_SEARCH_RESULTS: usize = 5;

/// The acquisition loop stops once this many references extract successfully.
pub const TARGET_REFERENCES: usize = 2;

// ---------------------------------------------------------------------------
// DocumentId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for document row identifiers (time-sortable).
///
/// The stable lookup key for a document is its source URL; the id exists for
/// row identity and operator-facing output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub Uuid);

impl DocumentId {
    /// Generate a new time-sortable document identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for DocumentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A unit of content under enrichment, persisted in storage.
///
/// Created once at ingestion with `original_content` populated and all
/// enrichment fields empty; the enrichment pass only ever updates
/// `updated_content`, `sources`, `enrichment_model`, `enriched_at`, and
/// `quality_score` by the document's stable URL key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Row identifier (UUID v7).
    pub id: DocumentId,
    /// Unique source URL — the stable key, never reused.
    pub url: String,
    /// Post title, also the verbatim search topic.
    pub title: String,
    /// Author name from the source site.
    pub author: String,
    /// Publish date as shown on the source site.
    pub published: String,
    /// Short excerpt from the source listing.
    pub excerpt: String,
    /// Source-site category, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Raw extracted text, immutable once set at ingestion.
    pub original_content: String,
    /// SHA-256 hash of `original_content`.
    pub content_hash: String,
    /// Cleaned restatement of the original, no added facts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted_original_content: Option<String>,
    /// The synthesized enhanced document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_content: Option<String>,
    /// URLs consulted during synthesis, in discovery order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
    /// Identifier of the generative model used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrichment_model: Option<String>,
    /// Timestamp of the last successful synthesis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enriched_at: Option<DateTime<Utc>>,
    /// Advisory quality score, 0–100.
    pub quality_score: u8,
    /// When the document was first ingested.
    pub created_at: DateTime<Utc>,
    /// When the document was last written.
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Whether this document already carries enhanced content.
    ///
    /// Content of exactly [`ENHANCED_MIN_CHARS`] characters or fewer is
    /// treated as not enhanced, guarding against truncated or garbage fills.
    pub fn is_enhanced(&self) -> bool {
        self.updated_content
            .as_deref()
            .is_some_and(|c| c.chars().count() > ENHANCED_MIN_CHARS)
    }
}

// ---------------------------------------------------------------------------
// Ephemeral pipeline types
// ---------------------------------------------------------------------------

/// A search result considered as a reference source. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CandidateLink {
    pub title: String,
    pub url: String,
}

/// Best-effort extraction result for a single URL. Never persisted; failed
/// extractions (`ok == false`) are discarded by callers.
#[derive(Debug, Clone)]
pub struct ExtractedContent {
    pub url: String,
    pub title: String,
    pub text: String,
    /// True when the extracted text clears [`EXTRACT_OK_MIN_CHARS`].
    pub ok: bool,
}

/// A blog post card parsed from a seed index page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedPost {
    pub title: String,
    pub url: String,
    pub category: String,
    pub author: String,
    pub published: String,
    pub excerpt: String,
}

// ---------------------------------------------------------------------------
// Run outcomes
// ---------------------------------------------------------------------------

/// Terminal status of one document within one pipeline pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
    Skipped,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Per-document outcome of one pipeline pass. Operator output, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub document_id: String,
    pub title: String,
    pub status: RunStatus,
    pub message: String,
}

/// Aggregated outcomes for a full pass over the pending document set.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub outcomes: Vec<RunOutcome>,
}

impl RunSummary {
    pub fn push(&mut self, outcome: RunOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn success_count(&self) -> usize {
        self.count(RunStatus::Success)
    }

    pub fn failed_count(&self) -> usize {
        self.count(RunStatus::Failed)
    }

    pub fn skipped_count(&self) -> usize {
        self.count(RunStatus::Skipped)
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// Outcomes with `Failed` status, for the summary's failure listing.
    pub fn failures(&self) -> impl Iterator<Item = &RunOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.status == RunStatus::Failed)
    }

    fn count(&self, status: RunStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Truncate a string to at most `max_chars` characters, on a char boundary.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

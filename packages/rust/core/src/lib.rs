//! Pipeline orchestration for postforge.
//!
//! Three sequential pipelines share the same shape: walk the document set,
//! run one document at a time through its stages, pace between remote
//! calls, and report per-document outcomes. [`Ingestor`] seeds the store
//! from a blog index, [`EnrichmentPipeline`] enhances stored posts with
//! reference-backed synthesis, and [`FormatPipeline`] cleans up the raw
//! extracted text.

pub mod enrichment;
pub mod formatter;
pub mod ingest;
pub mod pacing;
pub mod providers;

pub use enrichment::EnrichmentPipeline;
pub use formatter::FormatPipeline;
pub use ingest::Ingestor;
pub use pacing::{CancelFlag, Pacer};
pub use providers::{
    ArticleSynthesizer, PageExtractor, PageFetcher, RunProgress, SearchProvider, SilentProgress,
};

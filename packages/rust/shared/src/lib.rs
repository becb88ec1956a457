//! Shared types, error model, and configuration for Postforge.
//!
//! This crate is the foundation depended on by all other Postforge crates.
//! It provides:
//! - [`PostforgeError`] — the unified error type
//! - Domain types ([`Document`], [`CandidateLink`], [`ExtractedContent`],
//!   [`RunOutcome`], [`RunSummary`])
//! - The [`DocumentStore`] capability trait
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod store;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, OpenAiConfig, PacingConfig, SerpConfig, config_dir,
    config_file_path, expand_home, init_config, load_config, load_config_from, read_api_key,
};
pub use error::{PostforgeError, Result};
pub use store::{DocumentStore, EnrichmentUpdate};
pub use types::{
    CandidateLink, Document, DocumentId, ENHANCED_MIN_CHARS, EXTRACT_CAP_CHARS,
    EXTRACT_OK_MIN_CHARS, ExtractedContent, FORMAT_MIN_CHARS, LOCATOR_ACCEPT_MIN_CHARS,
    MAX_SEARCH_RESULTS, REFERENCE_CAP_CHARS, REFERENCE_MIN_CHARS, RunOutcome, RunStatus,
    RunSummary, SYNTHESIS_MIN_CHARS, SeedPost, TARGET_REFERENCES, truncate_chars,
};

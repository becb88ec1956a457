//! Error types for Postforge.
//!
//! Library crates use [`PostforgeError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Postforge operations.
///
/// `Search`, `Extraction`, `Synthesis`, and `Storage` carry the pipeline's
/// failure taxonomy: a search failure fails the current document's pass, an
/// extraction failure only discards one candidate, a synthesis or storage
/// failure marks the document failed without stopping the run.
#[derive(Debug, thiserror::Error)]
pub enum PostforgeError {
    /// Configuration loading or validation error. Fatal before a run starts.
    #[error("config error: {message}")]
    Config { message: String },

    /// Search provider error (auth, quota, network).
    #[error("search error: {0}")]
    Search(String),

    /// Page fetch or content extraction error for a single URL.
    #[error("extraction error for {url}: {message}")]
    Extraction { url: String, message: String },

    /// Generative model error (API, transport, or unusable output).
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (malformed URL, invalid input, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PostforgeError>;

impl PostforgeError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an extraction error for a specific URL.
    pub fn extraction(url: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Extraction {
            url: url.into(),
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

//! Scheduling primitives for the sequential pipelines.
//!
//! [`Pacer`] holds the courtesy delays between remote calls — fixed sleeps,
//! not a backoff algorithm (no growth, no jitter). [`CancelFlag`] is the
//! run-level cancellation token: when triggered, the in-flight document
//! finishes its current stage, but the loop stops before the next one.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Fixed inter-call delays to avoid hammering remote hosts.
#[derive(Debug, Clone)]
pub struct Pacer {
    document_delay: Duration,
    fetch_delay: Duration,
}

impl Pacer {
    pub fn new(document_delay_ms: u64, fetch_delay_ms: u64) -> Self {
        Self {
            document_delay: Duration::from_millis(document_delay_ms),
            fetch_delay: Duration::from_millis(fetch_delay_ms),
        }
    }

    /// No delays at all, for tests.
    pub fn none() -> Self {
        Self::new(0, 0)
    }

    /// Pause between documents in a run.
    pub async fn between_documents(&self) {
        if !self.document_delay.is_zero() {
            tokio::time::sleep(self.document_delay).await;
        }
    }

    /// Pause between successive fetches within one document's pass.
    pub async fn between_fetches(&self) {
        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }
    }
}

/// Cloneable cancellation flag shared between a run and its controller.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

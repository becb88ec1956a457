//! Formatting pass: clean up raw extracted article text without changing
//! its wording.
//!
//! Runs over the whole document set, skipping documents that already carry a
//! formatted rendition. Like enrichment, one document's failure never stops
//! the run.

use tracing::{info, instrument, warn};

use postforge_shared::{Document, DocumentStore, Result, RunOutcome, RunStatus, RunSummary};

use crate::pacing::{CancelFlag, Pacer};
use crate::providers::{ArticleSynthesizer, RunProgress};

/// Drives the original-content formatting pass.
pub struct FormatPipeline<'a, S, Y>
where
    S: DocumentStore,
    Y: ArticleSynthesizer,
{
    store: &'a S,
    synthesizer: &'a Y,
    pacer: Pacer,
    cancel: CancelFlag,
}

impl<'a, S, Y> FormatPipeline<'a, S, Y>
where
    S: DocumentStore,
    Y: ArticleSynthesizer,
{
    pub fn new(store: &'a S, synthesizer: &'a Y, pacer: Pacer, cancel: CancelFlag) -> Self {
        Self {
            store,
            synthesizer,
            pacer,
            cancel,
        }
    }

    /// One pass over the document set.
    #[instrument(skip_all)]
    pub async fn run(&self, progress: &dyn RunProgress) -> Result<RunSummary> {
        let docs = self.store.list().await?;
        let total = docs.len();
        info!(total, "starting formatting pass");

        let mut summary = RunSummary::default();
        for (i, doc) in docs.iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!(processed = i, "run cancelled, stopping before next document");
                break;
            }

            progress.item_started(i + 1, total, &doc.title);
            let outcome = self.format_document(doc).await;
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
            "formatting pass complete"
        );
        Ok(summary)
    }

    async fn format_document(&self, doc: &Document) -> RunOutcome {
        let outcome = |status, message: String| RunOutcome {
            document_id: doc.id.to_string(),
            title: doc.title.clone(),
            status,
            message,
        };

        if doc.formatted_original_content.is_some() {
            return outcome(RunStatus::Skipped, "already formatted".into());
        }

        let formatted = self
            .synthesizer
            .format_original(&doc.title, &doc.original_content)
            .await;
        if !formatted.ok {
            warn!(url = %doc.url, "formatting produced no usable content");
            return outcome(
                RunStatus::Failed,
                "formatting produced no usable content".into(),
            );
        }

        if let Err(e) = self
            .store
            .update_formatted(&doc.url, &formatted.content)
            .await
        {
            return outcome(RunStatus::Failed, format!("store write failed: {e}"));
        }

        outcome(RunStatus::Success, "formatted".into())
    }
}

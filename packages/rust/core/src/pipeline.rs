//! One featurization pass: unprocessed raw documents → feature records.

use std::time::{Duration, Instant};

use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, error, info, instrument, warn};

use pressfeat_extract::{CompiledLayout, extract_article, extract_page_context};
use pressfeat_shared::{FeatureRecord, PassConfig, ProcessOutcome, RawDocument, Result, RunId};
use pressfeat_storage::Storage;

use crate::features::engineer;
use crate::labels::build_labels;
use crate::tagger::Tagger;

/// Result of a featurization pass.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PassSummary {
    pub run_id: RunId,
    /// Documents taken from the snapshot and marked.
    pub visited: usize,
    pub persisted: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Snapshot ids that were gone or already marked when loaded.
    pub missing: usize,
    #[serde(skip)]
    pub elapsed: Duration,
}

/// Progress callback for reporting pass status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before each document of the snapshot is processed.
    fn document(&self, id: &str, current: usize, total: usize);
    /// Called when the pass completes.
    fn done(&self, summary: &PassSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn document(&self, _id: &str, _current: usize, _total: usize) {}
    fn done(&self, _summary: &PassSummary) {}
}

/// Featurize one raw document.
///
/// `Ok(None)` means text, location or org could not be derived. Parse errors
/// and tagger rejections are document-level; a broken tagger process is not
/// (see [`PressfeatError::is_document_level`]).
///
/// [`PressfeatError::is_document_level`]: pressfeat_shared::PressfeatError::is_document_level
pub fn featurize(
    doc: &RawDocument,
    layout: &CompiledLayout,
    tagger: &dyn Tagger,
) -> Result<Option<FeatureRecord>> {
    let article = extract_article(&doc.body_html, &doc.link)?;
    let context = extract_page_context(&doc.page_html, &doc.link, layout);

    let Some(fields) = engineer(&article, &context) else {
        debug!(id = %doc.id, "text, location or org missing");
        return Ok(None);
    };

    let label = build_labels(&doc.id, tagger)?;

    Ok(Some(FeatureRecord {
        id: doc.id.clone(),
        link: doc.link.clone(),
        source: doc.source.clone(),
        date: context.date,
        time: context.time,
        summary: context.summary,
        img: context.img,
        text: fields.text,
        location: fields.location,
        org: fields.org,
        keywords: article.keywords,
        lang: article.lang,
        source_url: article.source_url,
        label,
    }))
}

/// Run one pass over the unprocessed documents of `config.source`.
///
/// 1. Snapshot the ids of unprocessed documents
/// 2. For each: extract, engineer, label, then commit record + marker
/// 3. Record the pass in the run history
///
/// A single document never stops the pass. Storage errors and tagger process
/// failures do, leaving the remaining documents unmarked.
#[instrument(skip_all, fields(source = %config.source))]
pub async fn run_pass(
    config: &PassConfig,
    storage: &Storage,
    tagger: &dyn Tagger,
    progress: &dyn ProgressReporter,
) -> Result<PassSummary> {
    let start = Instant::now();
    let layout = CompiledLayout::compile(&config.layout)?;

    let run_id = storage.insert_run(&config.source).await?;
    let mut summary = PassSummary {
        run_id: run_id.clone(),
        visited: 0,
        persisted: 0,
        skipped: 0,
        failed: 0,
        missing: 0,
        elapsed: Duration::ZERO,
    };

    progress.phase("Querying unprocessed documents");
    let ids = storage.unprocessed_ids(&config.source).await?;
    let total = ids.len();
    info!(%run_id, total, "starting featurization pass");

    progress.phase("Featurizing");
    for (i, id) in ids.iter().enumerate() {
        progress.document(id, i + 1, total);

        let Some(doc) = storage.get_unprocessed_document(id).await? else {
            warn!(%id, "document no longer pending, skipping");
            summary.missing += 1;
            continue;
        };
        summary.visited += 1;

        match blocking(|| featurize(&doc, &layout, tagger)) {
            Ok(Some(record)) => {
                storage
                    .commit_document(
                        &doc.id,
                        Some(&record),
                        ProcessOutcome::Persisted,
                        None,
                        Some(&run_id),
                    )
                    .await?;
                summary.persisted += 1;
            }
            Ok(None) => {
                storage
                    .commit_document(&doc.id, None, ProcessOutcome::Skipped, None, Some(&run_id))
                    .await?;
                summary.skipped += 1;
            }
            Err(e) if e.is_document_level() => {
                warn!(id = %doc.id, error = %e, "featurization failed");
                let message = e.to_string();
                storage
                    .commit_document(
                        &doc.id,
                        None,
                        ProcessOutcome::Failed,
                        Some(&message),
                        Some(&run_id),
                    )
                    .await?;
                summary.failed += 1;
            }
            Err(e) => {
                error!(id = %doc.id, error = %e, "aborting pass");
                return Err(e);
            }
        }
    }

    summary.elapsed = start.elapsed();
    let stats_json = serde_json::to_string(&summary).unwrap_or_default();
    storage.finish_run(&run_id, &stats_json).await?;

    info!(
        visited = summary.visited,
        persisted = summary.persisted,
        skipped = summary.skipped,
        failed = summary.failed,
        missing = summary.missing,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "featurization pass complete"
    );
    progress.done(&summary);
    Ok(summary)
}

/// Run parsing and tagger I/O without stalling other tasks on a worker thread.
fn blocking<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current().map(|h| h.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => tokio::task::block_in_place(f),
        _ => f(),
    }
}

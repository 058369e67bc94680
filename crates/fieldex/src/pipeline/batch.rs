use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use log::info;
use tracing::info_span;

use crate::dedup::DedupDetector;
use crate::error::WorkerError;
use crate::extraction::ExtractionResult;
use crate::review::{ReviewRecord, ReviewRecordBuilder};
use crate::worker::job::{DocumentJob, ExtractedDocument};
use crate::worker::pool::WorkerPool;

use super::progress::{ProgressEvent, ProgressReporter};
use super::runner::Pipeline;

/// Runs every job through the pool, waits for all of them, then flags
/// duplicates across the whole batch. Records come back in job order.
pub fn run_batch(
    pipeline: Arc<Pipeline>,
    jobs: Vec<DocumentJob>,
    archived_keys: &HashSet<String>,
    progress: Arc<dyn ProgressReporter>,
) -> Result<Vec<ReviewRecord>, WorkerError> {
    let _span = info_span!("batch", documents = jobs.len()).entered();

    let total = jobs.len();
    progress.report(ProgressEvent::BatchStarted { total });
    if total == 0 {
        return Ok(Vec::new());
    }

    let deadline = pipeline.config().page_timeout.map(|t| Instant::now() + t);
    let worker_count = pipeline.config().worker_count.clamp(1, total);
    let detector = DedupDetector::new(pipeline.config().dedupe_key.clone());

    let pool = WorkerPool::new(pipeline, Arc::clone(&progress), worker_count);
    for job in jobs {
        if let Err(e) = pool.submit(job.with_deadline(deadline)) {
            pool.shutdown();
            pool.wait();
            return Err(e);
        }
    }

    let collected = pool.collect(total);
    pool.shutdown();
    pool.wait();
    let mut documents = collected?;
    documents.sort_by_key(|d| d.index);

    progress.report(ProgressEvent::Phase {
        message: "Checking for duplicates...".to_string(),
    });
    let records = build_records(documents, &detector, archived_keys);

    info!(
        "Extracted {} record(s), {} flagged as possible duplicates",
        records.len(),
        records.iter().filter(|r| r.is_duplicate()).count()
    );
    Ok(records)
}

/// The barrier step: dedupe needs every result of the batch at once.
pub fn build_records(
    documents: Vec<ExtractedDocument>,
    detector: &DedupDetector,
    archived_keys: &HashSet<String>,
) -> Vec<ReviewRecord> {
    let flags = {
        let keyed: Vec<(String, &ExtractionResult)> = documents
            .iter()
            .map(|d| (d.source_name.clone(), &d.extraction))
            .collect();
        detector.flag_batch(&keyed, archived_keys)
    };

    documents
        .into_iter()
        .zip(flags)
        .map(|(document, flag)| {
            let builder = ReviewRecordBuilder::new(document.source_name, document.source_path)
                .extraction(document.extraction)
                .dedupe(flag);
            document
                .problems
                .into_iter()
                .fold(builder, |builder, problem| builder.problem(problem))
                .build()
        })
        .collect()
}

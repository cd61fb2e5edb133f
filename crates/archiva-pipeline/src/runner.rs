//! Stage runner: one task per item on a bounded worker pool.
//!
//! Each item runs in its own Tokio task, so a panicking handler turns into a
//! FATAL item instead of taking the batch down. Cancellation is checked
//! before an item is scheduled; in-flight items always finish.

use crate::error::{AccessRequests, ProcessingError};
use crate::handler::{ActionHandler, HandlerIo, ItemStatus, StageReport, WorkerParameters};
use archiva_core::EvidenceStatus;
use futures::{future, stream, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

enum ItemOutcome {
    Done(ItemStatus),
    Retry(AccessRequests),
}

/// Run every item of `handler` and record the stage report on the run.
pub async fn run_stage(handler: Arc<dyn ActionHandler>, io: &HandlerIo) -> StageReport {
    let stage = handler.name();
    let items = match handler.items(io).await {
        Ok(items) => items,
        Err(e) => {
            warn!(stage, error = %e, "Could not list stage items");
            let report = StageReport {
                stage,
                status: EvidenceStatus::Fatal,
                items: vec![ItemStatus::new(stage, EvidenceStatus::Fatal).with_message(e.to_string())],
                skipped: 0,
                access_requests: AccessRequests::new(),
            };
            io.control.record(report.clone()).await;
            return report;
        }
    };

    let total = items.len();
    info!(stage, items = total, run_id = %io.run_id(), "Stage started");

    let control = io.control.clone();
    let always = handler.runs_when_cancelled();
    let concurrency = io.config.worker_concurrency.max(1);
    let outcomes: Vec<ItemOutcome> = stream::iter(items)
        .take_while(move |_| future::ready(always || !control.is_cancelled()))
        .map(|item| {
            let handler = Arc::clone(&handler);
            let task_io = io.clone();
            let parameters = WorkerParameters {
                run_id: io.run_id().to_string(),
                stage,
                item: item.clone(),
            };
            async move {
                let task = tokio::spawn(async move { handler.execute(&parameters, &task_io).await });
                match task.await {
                    Ok(Ok(status)) => ItemOutcome::Done(status),
                    Ok(Err(ProcessingError::RetryLater { access_requests })) => {
                        ItemOutcome::Retry(access_requests)
                    }
                    Ok(Err(ProcessingError::Fatal { reason })) => ItemOutcome::Done(
                        ItemStatus::new(item, EvidenceStatus::Fatal).with_message(reason),
                    ),
                    Err(e) => ItemOutcome::Done(
                        ItemStatus::new(item, EvidenceStatus::Fatal)
                            .with_message(format!("Task aborted: {e}")),
                    ),
                }
            }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let mut report = StageReport {
        stage,
        status: EvidenceStatus::Ok,
        items: Vec::with_capacity(outcomes.len()),
        skipped: total - outcomes.len(),
        access_requests: AccessRequests::new(),
    };
    for outcome in outcomes {
        match outcome {
            ItemOutcome::Done(status) => {
                if !status.status.is_ok() {
                    debug!(stage, item = %status.item, status = %status.status, "Item not OK");
                }
                report.status = report.status.worst(status.status);
                report.items.push(status);
            }
            ItemOutcome::Retry(requests) => {
                for (context, ids) in requests {
                    report.access_requests.entry(context).or_default().extend(ids);
                }
            }
        }
    }
    report.items.sort_by(|a, b| a.item.cmp(&b.item));

    if report.skipped > 0 {
        warn!(stage, skipped = report.skipped, "Run cancelled, items not scheduled");
    }
    info!(stage, status = %report.status, retry = report.needs_retry(), "Stage finished");
    io.control.record(report.clone()).await;
    report
}

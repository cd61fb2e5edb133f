//! Finalize stage shared by both pipelines.

use crate::error::ProcessingError;
use crate::handler::{ActionHandler, HandlerIo, ItemStatus, WorkerParameters};
use crate::report::{Report, ReportEntry};
use crate::workspace::{CONTEXT, SUMMARY};
use archiva_core::{DataCategory, LogbookEvent};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::marker::PhantomData;
use tracing::info;
use uuid::Uuid;

/// Aggregates the entries staged under one directory into the run report,
/// persists it (category REPORT, `<runId>.jsonl`) and links it from the run's
/// logbook operation.
pub struct Finalize<E> {
    ev_type: &'static str,
    dir: &'static str,
    stage: &'static str,
    _entry: PhantomData<fn() -> E>,
}

impl<E> Finalize<E> {
    pub fn new(ev_type: &'static str, dir: &'static str, stage: &'static str) -> Self {
        Self {
            ev_type,
            dir,
            stage,
            _entry: PhantomData,
        }
    }
}

/// Storage name of a run's report.
pub fn report_name(run_id: &str) -> String {
    format!("{run_id}.jsonl")
}

#[async_trait]
impl<E> ActionHandler for Finalize<E>
where
    E: ReportEntry + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        self.stage
    }

    async fn items(&self, _io: &HandlerIo) -> Result<Vec<String>, ProcessingError> {
        Ok(vec![self.stage.to_string()])
    }

    async fn execute(
        &self,
        parameters: &WorkerParameters,
        io: &HandlerIo,
    ) -> Result<ItemStatus, ProcessingError> {
        let entries: Vec<E> = io.workspace.read_all(self.dir).await?;
        let context: Value = io.workspace.get_json(CONTEXT).await?;
        let now = io.collaborators.clock.now().await;
        let stage_status = io.control.stage_status().await;

        let report = Report::build(
            io.run_id(),
            self.ev_type,
            (io.started_at, now),
            context,
            entries,
            stage_status,
            io.control.run_end(),
        );
        let status = report.summary.status(stage_status);

        let name = report_name(io.run_id());
        io.collaborators
            .storage
            .store_container(
                &io.config.default_strategy,
                DataCategory::Report,
                &name,
                report.to_jsonl()?,
            )
            .await?;

        let event = LogbookEvent::new(
            Uuid::new_v4().to_string(),
            self.stage,
            now,
            status.into(),
        )
        .with_detail(json!({
            "ReportFile": name,
            "vitamResults": report.summary.vitam_results,
        }));
        io.collaborators
            .logbook
            .append_event(io.run_id(), event)
            .await?;
        io.workspace.put_json(SUMMARY, &report.summary).await?;

        info!(
            run_id = %io.run_id(),
            status = %status,
            entries = report.summary.vitam_results.total(),
            "Report persisted"
        );
        Ok(ItemStatus::new(&parameters.item, status).with_message(report.operation.out_message))
    }

    fn runs_when_cancelled(&self) -> bool {
        true
    }
}

//! Evidence auditor: current state of one object against its secured record.
//!
//! The audit runs in two phases so pipelines can share one downloaded export
//! between many objects:
//!
//! 1. [`EvidenceAuditor::check_database`] reads the database side (metadata,
//!    lifecycle, covering traceability operation, current digests, replica
//!    digests).
//! 2. [`EvidenceAuditor::verify_against_record`] compares that state with the
//!    object's record from the secure export.
//!
//! [`EvidenceAuditor::audit`] runs both for a single object. Failures never
//! escape as errors; every check ends in an [`EvidenceStatus`] and message on
//! the parameters.

use crate::export::ExtractedExport;
use crate::kind::{self, ObjectKind};
use crate::model::{
    AuditParameters, CheckFailure, EvidenceAuditReportLine, EvidenceAuditReportObject,
    SecureExportRef, SubObjectParameters,
};
use crate::verifier::{compare_replicas, verify_sub_objects, LINKED_OBJECT_ERROR};
use crate::version::check_version;
use archiva_core::types::{
    fields, format_logbook_date, object_versions, parse_logbook_date, strip_fields,
};
use archiva_core::{
    digest, ArchivalObjectRef, Collaborators, DataCategory, DigestAlgorithm, EvidenceConfig,
    EvidenceStatus, OperationQuery, StoragePointer, TraceabilitySecureRecord,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Audits archival objects against traceability secure exports.
#[derive(Debug, Clone)]
pub struct EvidenceAuditor {
    collaborators: Collaborators,
    config: Arc<EvidenceConfig>,
}

impl EvidenceAuditor {
    pub fn new(collaborators: Collaborators, config: Arc<EvidenceConfig>) -> Self {
        Self {
            collaborators,
            config,
        }
    }

    pub fn config(&self) -> &EvidenceConfig {
        &self.config
    }

    /// Database phase of the audit.
    ///
    /// On success the parameters carry everything needed to compare with a
    /// secured record; otherwise they carry the failure verdict.
    pub async fn check_database(&self, object: &ArchivalObjectRef) -> AuditParameters {
        let handle = kind::handle(object.object_type);
        let mut parameters = AuditParameters::new(object);
        if let Err(failure) = self.collect(handle, &mut parameters).await {
            log_failure(object, &failure);
            parameters.fail(failure);
        } else {
            debug!(object = %object, "Database check passed");
        }
        parameters
    }

    async fn collect(
        &self,
        handle: &dyn ObjectKind,
        parameters: &mut AuditParameters,
    ) -> Result<(), CheckFailure> {
        let id = parameters.id.clone();
        let object_type = handle.metadata_type();

        let raw = handle.fetch_raw(&self.collaborators, &id).await?;
        let lifecycle = handle.fetch_lifecycle(&self.collaborators, &id).await?;

        let lfc_version = lifecycle
            .get(fields::LFC_VERSION)
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                CheckFailure::fatal(format!(
                    "Lifecycle of {id} has no '{}' field",
                    fields::LFC_VERSION
                ))
            })?;
        parameters.lfc_version = Some(lfc_version);
        let last_persisted = lifecycle
            .get(fields::LAST_PERSISTED_DATE)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                CheckFailure::fatal(format!(
                    "Lifecycle of {id} has no '{}' field",
                    fields::LAST_PERSISTED_DATE
                ))
            })?;
        let last_persisted = parse_logbook_date(last_persisted).map_err(|e| {
            CheckFailure::fatal(format!("Invalid last persisted date '{last_persisted}': {e}"))
        })?;

        let logbook = &self.collaborators.logbook;
        let covering = logbook
            .select_operations(
                &OperationQuery::lfc_traceability(object_type).covering(last_persisted),
            )
            .await
            .map_err(|e| CheckFailure::fatal(e.to_string()))?;
        let Some(operation) = covering.into_iter().next() else {
            return Err(CheckFailure::warn(format!(
                "No traceability operation found matching date {}",
                format_logbook_date(last_persisted)
            )));
        };

        let latest = logbook
            .select_operations(&OperationQuery::lfc_traceability(object_type))
            .await
            .map_err(|e| CheckFailure::fatal(e.to_string()))?;
        let Some(latest) = latest.first() else {
            return Err(CheckFailure::fatal(format!(
                "No {} operation found although one covers {}",
                object_type.traceability_event_type(),
                format_logbook_date(last_persisted)
            )));
        };
        parameters.is_last_securisation = latest.event_id == operation.event_id;
        parameters.securisation_operation_id = Some(operation.event_id.clone());

        let operation = logbook
            .select_operation_by_id(&operation.event_id)
            .await
            .map_err(|e| {
                CheckFailure::fatal(format!(
                    "Traceability operation {}: {e}",
                    operation.event_id
                ))
            })?;
        let detail = operation.traceability_detail().map_err(CheckFailure::fatal)?;
        let algorithm: DigestAlgorithm = detail
            .digest_algorithm
            .parse()
            .map_err(|e: archiva_core::UnknownAlgorithm| CheckFailure::fatal(e.to_string()))?;
        parameters.secure_export = Some(SecureExportRef {
            file_name: detail.file_name,
            digest_algorithm: algorithm,
            hash: detail.hash,
        });

        let mut metadata = raw.clone();
        strip_fields(&mut metadata, handle.computed_fields(&self.config));
        parameters.hash_md_from_database = Some(digest(&metadata, algorithm));
        parameters.hash_lfc_from_database = Some(digest(&lifecycle, algorithm));

        let storage = StoragePointer::from_document(&raw)
            .map_err(|e| CheckFailure::fatal(format!("Object {id}: {e}")))?;
        let category = handle.data_category();
        parameters.offer_digests = self
            .replica_digests(&storage, category, &category.object_name(&id))
            .await?;
        parameters.storage = Some(storage);

        if handle.has_sub_objects() {
            let versions = object_versions(&raw)
                .map_err(|e| CheckFailure::fatal(format!("Object group {id}: {e}")))?;
            for version in versions {
                let offer_digests = self
                    .replica_digests(&version.storage, DataCategory::Object, &version.id)
                    .await?;
                parameters.sub_objects.push(SubObjectParameters {
                    id: version.id,
                    storage: version.storage,
                    offer_digests,
                });
            }
        }
        Ok(())
    }

    async fn replica_digests(
        &self,
        storage: &StoragePointer,
        category: DataCategory,
        name: &str,
    ) -> Result<BTreeMap<String, String>, CheckFailure> {
        Ok(self
            .collaborators
            .storage
            .replica_digests(&storage.strategy_id, category, name, &storage.offer_ids)
            .await?)
    }

    /// Comparison phase: the database state in `parameters` against `record`.
    ///
    /// Updates the verdict on `parameters` and returns the report line.
    pub fn verify_against_record(
        &self,
        parameters: &mut AuditParameters,
        record: &TraceabilitySecureRecord,
    ) -> EvidenceAuditReportLine {
        let handle = kind::handle(parameters.object_type);
        parameters.secured_version = Some(record.version);

        let mut sub_reports = Vec::new();
        let outcome = self.compare(handle, parameters, record, &mut sub_reports);
        if let Err(failure) = outcome {
            log_failure(&parameters.object_ref(), &failure);
            parameters.fail(failure);
        }

        let mut line = handle.report_line(parameters);
        line.secured_hash = Some(record.hash_global_from_storage.clone());
        if let Some(reports) = line.sub_object_reports.as_mut() {
            *reports = sub_reports;
        }
        line
    }

    fn compare(
        &self,
        handle: &dyn ObjectKind,
        parameters: &AuditParameters,
        record: &TraceabilitySecureRecord,
        sub_reports: &mut Vec<EvidenceAuditReportObject>,
    ) -> Result<(), CheckFailure> {
        let lfc_version = parameters.lfc_version.ok_or_else(|| {
            CheckFailure::fatal("Database check did not record a lifecycle version")
        })?;
        check_version(lfc_version, record.version, parameters.is_last_securisation)?;

        let mut errors = Vec::new();
        if parameters.hash_md_from_database.as_deref() != Some(record.hash_metadata.as_str()) {
            errors.push(format!(
                "Metadata hash '{}' mismatch secured hash '{}'",
                parameters.hash_md_from_database.as_deref().unwrap_or_default(),
                record.hash_metadata
            ));
        }
        if parameters.hash_lfc_from_database.as_deref() != Some(record.hash_lfc.as_str()) {
            errors.push(format!(
                "Lifecycle hash '{}' mismatch secured hash '{}'",
                parameters.hash_lfc_from_database.as_deref().unwrap_or_default(),
                record.hash_lfc
            ));
        }

        let offer_ids = parameters
            .storage
            .as_ref()
            .map(|s| s.offer_ids.as_slice())
            .unwrap_or_default();
        errors.extend(compare_replicas(
            offer_ids,
            &parameters.offer_digests,
            &record.hash_global_from_storage,
        ));

        if handle.has_sub_objects() {
            *sub_reports = verify_sub_objects(&record.sub_object_hashes, &parameters.sub_objects);
            if sub_reports.iter().any(|r| !r.evidence_status.is_ok()) {
                errors.push(LINKED_OBJECT_ERROR.to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CheckFailure::ko(format!(
                "Traceability audit KO Database check failure Errors are : [{}]",
                errors.join(", ")
            )))
        }
    }

    /// Download the export named by `parameters`, locate the object's record
    /// and compare. The export is deleted before this returns.
    pub async fn verify_with_export(
        &self,
        parameters: &mut AuditParameters,
    ) -> EvidenceAuditReportLine {
        let handle = kind::handle(parameters.object_type);
        let record = match self.fetch_record(parameters).await {
            Ok(record) => record,
            Err(failure) => {
                log_failure(&parameters.object_ref(), &failure);
                parameters.fail(failure);
                return handle.report_line(parameters);
            }
        };
        self.verify_against_record(parameters, &record)
    }

    async fn fetch_record(
        &self,
        parameters: &AuditParameters,
    ) -> Result<TraceabilitySecureRecord, CheckFailure> {
        let export_ref = parameters
            .secure_export
            .as_ref()
            .ok_or_else(|| CheckFailure::fatal("No secure export recorded for object"))?;
        let export = ExtractedExport::download(
            self.collaborators.storage.as_ref(),
            &self.config,
            export_ref,
        )
        .await?;
        export.locate(parameters.object_type, &parameters.id).await
    }

    /// Full audit of one object.
    pub async fn audit(
        &self,
        object: &ArchivalObjectRef,
    ) -> (AuditParameters, EvidenceAuditReportLine) {
        let mut parameters = self.check_database(object).await;
        if !parameters.is_ok() {
            let line = kind::handle(object.object_type).report_line(&parameters);
            return (parameters, line);
        }
        let line = self.verify_with_export(&mut parameters).await;
        (parameters, line)
    }
}

fn log_failure(object: &ArchivalObjectRef, failure: &CheckFailure) {
    match failure.status {
        EvidenceStatus::Fatal => {
            error!(object = %object, error = %failure.message, "Evidence audit failed");
        }
        status => {
            warn!(object = %object, status = %status, message = %failure.message, "Evidence audit finding");
        }
    }
}

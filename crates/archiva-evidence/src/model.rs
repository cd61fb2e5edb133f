//! Evidence audit data model.
//!
//! [`AuditParameters`] is the working state of one object during one run and
//! is only ever staged inside that run's workspace. Report lines and
//! correction entries are the durable outputs.

use archiva_core::effects::{LookupError, StorageError};
use archiva_core::{
    ArchivalObjectRef, DataCategory, DigestAlgorithm, EvidenceStatus, MetadataType,
    StoragePointer,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Outcome of a failed check: the verdict and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckFailure {
    pub status: EvidenceStatus,
    pub message: String,
}

impl CheckFailure {
    pub fn new(status: EvidenceStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self::new(EvidenceStatus::Warn, message)
    }

    pub fn ko(message: impl Into<String>) -> Self {
        Self::new(EvidenceStatus::Ko, message)
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(EvidenceStatus::Fatal, message)
    }
}

impl fmt::Display for CheckFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl From<LookupError> for CheckFailure {
    fn from(err: LookupError) -> Self {
        Self::new(err.evidence_status(), err.to_string())
    }
}

impl From<StorageError> for CheckFailure {
    fn from(err: StorageError) -> Self {
        Self::fatal(err.to_string())
    }
}

/// Secure export referenced by a traceability operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecureExportRef {
    pub file_name: String,
    pub digest_algorithm: DigestAlgorithm,
    /// Root hash recorded by the operation, kept as file digest metadata
    pub hash: String,
}

/// Database-side state of one content version of an object group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubObjectParameters {
    pub id: String,
    pub storage: StoragePointer,
    pub offer_digests: BTreeMap<String, String>,
}

/// Working state of one object's audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditParameters {
    pub id: String,
    pub object_type: MetadataType,
    pub lfc_version: Option<i64>,
    pub secured_version: Option<i64>,
    pub hash_md_from_database: Option<String>,
    pub hash_lfc_from_database: Option<String>,
    pub storage: Option<StoragePointer>,
    /// Digest of the primary stored file per offer
    #[serde(default)]
    pub offer_digests: BTreeMap<String, String>,
    #[serde(default)]
    pub is_last_securisation: bool,
    pub securisation_operation_id: Option<String>,
    pub secure_export: Option<SecureExportRef>,
    #[serde(default)]
    pub sub_objects: Vec<SubObjectParameters>,
    pub evidence_status: EvidenceStatus,
    pub audit_message: Option<String>,
}

impl AuditParameters {
    pub fn new(object: &ArchivalObjectRef) -> Self {
        Self {
            id: object.id.clone(),
            object_type: object.object_type,
            lfc_version: None,
            secured_version: None,
            hash_md_from_database: None,
            hash_lfc_from_database: None,
            storage: None,
            offer_digests: BTreeMap::new(),
            is_last_securisation: false,
            securisation_operation_id: None,
            secure_export: None,
            sub_objects: Vec::new(),
            evidence_status: EvidenceStatus::Ok,
            audit_message: None,
        }
    }

    pub fn object_ref(&self) -> ArchivalObjectRef {
        ArchivalObjectRef::new(self.id.clone(), self.object_type)
    }

    /// Record a failed check. The status only moves towards more severe.
    pub fn fail(&mut self, failure: CheckFailure) {
        if failure.status >= self.evidence_status {
            self.evidence_status = failure.status;
            self.audit_message = Some(failure.message);
        }
    }

    pub fn is_ok(&self) -> bool {
        self.evidence_status.is_ok()
    }
}

/// Audit result of one content version of an object group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceAuditReportObject {
    pub identifier: String,
    pub evidence_status: EvidenceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy_id: Option<String>,
    /// Offers of the current storage pointer
    #[serde(default)]
    pub offer_ids: Vec<String>,
    #[serde(default)]
    pub offers_hashes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secured_hash: Option<String>,
}

/// Audit result of one object; one line of an audit report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceAuditReportLine {
    pub identifier: String,
    pub object_type: MetadataType,
    pub evidence_status: EvidenceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy_id: Option<String>,
    #[serde(default)]
    pub offer_ids: Vec<String>,
    #[serde(default)]
    pub offers_hashes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secured_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub securisation_operation_id: Option<String>,
    /// Present for object groups only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_object_reports: Option<Vec<EvidenceAuditReportObject>>,
}

impl EvidenceAuditReportLine {
    /// Line carrying the parameters' current verdict, before any comparison
    /// with a secured record. Kind-specific parts are added by
    /// [`crate::kind::ObjectKind::report_line`].
    pub fn from_parameters(parameters: &AuditParameters) -> Self {
        Self {
            identifier: parameters.id.clone(),
            object_type: parameters.object_type,
            evidence_status: parameters.evidence_status,
            message: parameters.audit_message.clone(),
            strategy_id: parameters.storage.as_ref().map(|s| s.strategy_id.clone()),
            offer_ids: parameters
                .storage
                .as_ref()
                .map(|s| s.offer_ids.clone())
                .unwrap_or_default(),
            offers_hashes: parameters.offer_digests.clone(),
            secured_hash: None,
            securisation_operation_id: parameters.securisation_operation_id.clone(),
            sub_object_reports: None,
        }
    }

    pub fn object_ref(&self) -> ArchivalObjectRef {
        ArchivalObjectRef::new(self.identifier.clone(), self.object_type)
    }
}

/// Outcome of one repair attempt on one replica set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectionReportEntry {
    pub identifier: String,
    pub object_type: DataCategory,
    pub status: EvidenceStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_offer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrected_offer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secured_hash: Option<String>,
    #[serde(default)]
    pub offers_hashes: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_never_lower_the_status() {
        let mut params = AuditParameters::new(&ArchivalObjectRef::unit("u1"));
        params.fail(CheckFailure::ko("mismatch"));
        params.fail(CheckFailure::warn("late"));
        assert_eq!(params.evidence_status, EvidenceStatus::Ko);
        assert_eq!(params.audit_message.as_deref(), Some("mismatch"));
    }

    #[test]
    fn lookup_errors_map_to_statuses() {
        let failure = CheckFailure::from(LookupError::not_found("unit u1"));
        assert_eq!(failure.status, EvidenceStatus::Ko);
        let failure = CheckFailure::from(LookupError::unavailable("timeout"));
        assert_eq!(failure.status, EvidenceStatus::Fatal);
    }

    #[test]
    fn unit_lines_have_no_sub_object_reports() {
        let params = AuditParameters::new(&ArchivalObjectRef::unit("u1"));
        let line = EvidenceAuditReportLine::from_parameters(&params);
        let json = serde_json::to_value(&line).unwrap();
        assert!(json.get("subObjectReports").is_none());
        assert_eq!(json["evidenceStatus"], "OK");
    }
}

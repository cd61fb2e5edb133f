//! Per-kind capabilities of audited objects.
//!
//! Everything that differs between units and object groups goes through
//! [`ObjectKind`], resolved once per object with [`handle`].

use crate::model::{AuditParameters, EvidenceAuditReportLine};
use archiva_core::effects::LookupError;
use archiva_core::{Collaborators, DataCategory, EvidenceConfig, MetadataType};
use async_trait::async_trait;
use serde_json::Value;

/// Capabilities of one kind of archival object.
#[async_trait]
pub trait ObjectKind: Send + Sync {
    fn metadata_type(&self) -> MetadataType;

    async fn fetch_raw(&self, collaborators: &Collaborators, id: &str)
        -> Result<Value, LookupError>;

    async fn fetch_lifecycle(
        &self,
        collaborators: &Collaborators,
        id: &str,
    ) -> Result<Value, LookupError>;

    /// Fields derived by the archive after securisation, excluded from digests.
    fn computed_fields<'a>(&self, config: &'a EvidenceConfig) -> &'a [String];

    fn data_category(&self) -> DataCategory {
        self.metadata_type().data_category()
    }

    /// Whether the object owns binary content versions.
    fn has_sub_objects(&self) -> bool {
        false
    }

    fn report_line(&self, parameters: &AuditParameters) -> EvidenceAuditReportLine {
        EvidenceAuditReportLine::from_parameters(parameters)
    }
}

/// Descriptive metadata node.
pub struct UnitKind;

/// Binary content container.
pub struct ObjectGroupKind;

#[async_trait]
impl ObjectKind for UnitKind {
    fn metadata_type(&self) -> MetadataType {
        MetadataType::Unit
    }

    async fn fetch_raw(
        &self,
        collaborators: &Collaborators,
        id: &str,
    ) -> Result<Value, LookupError> {
        collaborators.metadata.get_raw_unit(id).await
    }

    async fn fetch_lifecycle(
        &self,
        collaborators: &Collaborators,
        id: &str,
    ) -> Result<Value, LookupError> {
        collaborators.lifecycle.get_raw_unit_lifecycle(id).await
    }

    fn computed_fields<'a>(&self, config: &'a EvidenceConfig) -> &'a [String] {
        &config.unit_computed_fields
    }
}

#[async_trait]
impl ObjectKind for ObjectGroupKind {
    fn metadata_type(&self) -> MetadataType {
        MetadataType::ObjectGroup
    }

    async fn fetch_raw(
        &self,
        collaborators: &Collaborators,
        id: &str,
    ) -> Result<Value, LookupError> {
        collaborators.metadata.get_raw_object_group(id).await
    }

    async fn fetch_lifecycle(
        &self,
        collaborators: &Collaborators,
        id: &str,
    ) -> Result<Value, LookupError> {
        collaborators.lifecycle.get_raw_object_group_lifecycle(id).await
    }

    fn computed_fields<'a>(&self, config: &'a EvidenceConfig) -> &'a [String] {
        &config.object_group_computed_fields
    }

    fn has_sub_objects(&self) -> bool {
        true
    }

    fn report_line(&self, parameters: &AuditParameters) -> EvidenceAuditReportLine {
        EvidenceAuditReportLine {
            sub_object_reports: Some(Vec::new()),
            ..EvidenceAuditReportLine::from_parameters(parameters)
        }
    }
}

/// Capabilities for `object_type`.
pub fn handle(object_type: MetadataType) -> &'static dyn ObjectKind {
    match object_type {
        MetadataType::Unit => &UnitKind,
        MetadataType::ObjectGroup => &ObjectGroupKind,
    }
}

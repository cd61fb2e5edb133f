//! Audited objects, storage categories and raw-document accessors.

use super::fields;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Kind of audited archival object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MetadataType {
    /// Descriptive metadata node
    #[serde(rename = "UNIT")]
    Unit,
    /// Binary content container owning content-version sub-objects
    #[serde(rename = "OBJECTGROUP")]
    ObjectGroup,
}

impl MetadataType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unit => "UNIT",
            Self::ObjectGroup => "OBJECTGROUP",
        }
    }

    /// Storage category holding the object's metadata file.
    pub fn data_category(self) -> DataCategory {
        match self {
            Self::Unit => DataCategory::Unit,
            Self::ObjectGroup => DataCategory::ObjectGroup,
        }
    }

    /// Logbook event type of the lifecycle traceability operation securing this kind.
    pub fn traceability_event_type(self) -> &'static str {
        match self {
            Self::Unit => "LOGBOOK_UNIT_LFC_TRACEABILITY",
            Self::ObjectGroup => "LOGBOOK_OBJECTGROUP_LFC_TRACEABILITY",
        }
    }
}

impl fmt::Display for MetadataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage category of a stored file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataCategory {
    Unit,
    #[serde(rename = "OBJECTGROUP")]
    ObjectGroup,
    Object,
    Logbook,
    Report,
}

impl DataCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unit => "UNIT",
            Self::ObjectGroup => "OBJECTGROUP",
            Self::Object => "OBJECT",
            Self::Logbook => "LOGBOOK",
            Self::Report => "REPORT",
        }
    }

    /// Name under which an object of this category is stored.
    ///
    /// Metadata files carry a `.json` suffix, binary objects are stored under
    /// their bare identifier.
    pub fn object_name(self, id: &str) -> String {
        match self {
            Self::Unit | Self::ObjectGroup => format!("{id}.json"),
            _ => id.to_string(),
        }
    }
}

impl fmt::Display for DataCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one audited entity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArchivalObjectRef {
    pub id: String,
    #[serde(rename = "type")]
    pub object_type: MetadataType,
}

impl ArchivalObjectRef {
    pub fn new(id: impl Into<String>, object_type: MetadataType) -> Self {
        Self {
            id: id.into(),
            object_type,
        }
    }

    pub fn unit(id: impl Into<String>) -> Self {
        Self::new(id, MetadataType::Unit)
    }

    pub fn object_group(id: impl Into<String>) -> Self {
        Self::new(id, MetadataType::ObjectGroup)
    }
}

impl fmt::Display for ArchivalObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object_type, self.id)
    }
}

/// Where the current copies of a stored file live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoragePointer {
    pub strategy_id: String,
    pub offer_ids: Vec<String>,
}

impl StoragePointer {
    pub fn new(strategy_id: impl Into<String>, offer_ids: Vec<String>) -> Self {
        Self {
            strategy_id: strategy_id.into(),
            offer_ids,
        }
    }

    /// Read the `_storage` block of a raw metadata document.
    pub fn from_document(document: &Value) -> Result<Self, String> {
        let storage = document
            .get(fields::STORAGE)
            .ok_or_else(|| format!("Missing '{}' in document", fields::STORAGE))?;
        serde_json::from_value(storage.clone())
            .map_err(|e| format!("Invalid '{}' block: {e}", fields::STORAGE))
    }
}

/// One binary content version of an object group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectVersion {
    pub id: String,
    pub storage: StoragePointer,
}

/// Binary content versions listed in an object group's `_qualifiers`.
///
/// Physical versions (carrying a `PhysicalId`) have no stored binary and are
/// skipped.
pub fn object_versions(document: &Value) -> Result<Vec<ObjectVersion>, String> {
    let Some(qualifiers) = document.get(fields::QUALIFIERS).and_then(Value::as_array) else {
        return Ok(Vec::new());
    };

    let mut versions = Vec::new();
    for qualifier in qualifiers {
        let Some(entries) = qualifier.get(fields::VERSIONS).and_then(Value::as_array) else {
            continue;
        };
        for version in entries {
            if version.get(fields::PHYSICAL_ID).is_some() {
                continue;
            }
            let id = version
                .get(fields::ID)
                .and_then(Value::as_str)
                .ok_or_else(|| "Object version without identifier".to_string())?;
            let storage = StoragePointer::from_document(version)
                .map_err(|e| format!("Object version '{id}': {e}"))?;
            versions.push(ObjectVersion {
                id: id.to_string(),
                storage,
            });
        }
    }
    Ok(versions)
}

/// Remove top-level fields from a document in place.
pub fn strip_fields(document: &mut Value, names: &[String]) {
    if let Some(map) = document.as_object_mut() {
        for name in names {
            map.remove(name);
        }
    }
}

//! Ground-truth records of a lifecycle traceability secure export.
//!
//! A secure export is a zip holding one entry of newline-delimited JSON, one
//! record per object captured when the traceability operation ran. Records
//! are immutable once exported; this workspace only reads them.

use super::object::MetadataType;
use serde::{Deserialize, Serialize};

/// Expected digests of one object at secure time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceabilitySecureRecord {
    pub lfc_id: String,
    pub metadata_type: MetadataType,
    /// Lifecycle version secured by the export.
    pub version: i64,
    pub hash_metadata: String,
    #[serde(rename = "hashLFC")]
    pub hash_lfc: String,
    pub hash_global_from_storage: String,
    /// Content versions of an object group; empty for units.
    #[serde(rename = "objectGroupDocumentHashList", default)]
    pub sub_object_hashes: Vec<SubObjectHash>,
}

impl TraceabilitySecureRecord {
    pub fn matches(&self, object_type: MetadataType, id: &str) -> bool {
        self.metadata_type == object_type && self.lfc_id == id
    }
}

/// Secured digest of one content version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubObjectHash {
    pub id: String,
    #[serde(rename = "hObject")]
    pub hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_format() {
        let line = r#"{"lfcId":"og1","metadataType":"OBJECTGROUP","version":3,
            "hashMetadata":"m","hashLFC":"l","hashGlobalFromStorage":"g",
            "objectGroupDocumentHashList":[{"id":"o1","hObject":"h1"}]}"#;
        let record: TraceabilitySecureRecord = serde_json::from_str(line).unwrap();
        assert!(record.matches(MetadataType::ObjectGroup, "og1"));
        assert!(!record.matches(MetadataType::Unit, "og1"));
        assert_eq!(record.sub_object_hashes[0].hash, "h1");
    }

    #[test]
    fn unit_records_have_no_sub_objects() {
        let line = r#"{"lfcId":"u1","metadataType":"UNIT","version":1,
            "hashMetadata":"m","hashLFC":"l","hashGlobalFromStorage":"g"}"#;
        let record: TraceabilitySecureRecord = serde_json::from_str(line).unwrap();
        assert!(record.sub_object_hashes.is_empty());
    }
}

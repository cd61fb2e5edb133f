//! Layer 8: Archive fixtures
//!
//! [`ArchiveFixture`] seeds memory handlers with a consistent archive:
//! metadata documents with storage pointers, lifecycles, replicas on every
//! offer, and lifecycle traceability operations whose secure exports hold the
//! digests of the current state. Tests then alter one side (database,
//! replicas, exports) and check what the audit makes of it.

use crate::handlers::{
    FixedClock, MemoryLifecycleHandler, MemoryLogbookHandler, MemoryMetadataHandler,
    MemoryStorageHandler, MemoryWorkspaceHandler,
};
use archiva_core::effects::StorageEffects;
use archiva_core::types::{object_versions, strip_fields};
use archiva_core::{
    digest, ArchivalObjectRef, Collaborators, DataCategory, DigestAlgorithm, EvidenceConfig,
    LogbookEvent, LogbookOperation, MetadataType, StatusCode, StoragePointer, SubObjectHash,
    TraceabilitySecureRecord,
};
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

pub const DEFAULT_STRATEGY: &str = "default";
pub const DEFAULT_OFFERS: [&str; 2] = ["offer-1", "offer-2"];

/// Coverage window used when a test does not care about dates.
pub const WINDOW_START: &str = "2024-01-01T00:00:00.000";
pub const WINDOW_END: &str = "2024-01-31T23:59:59.999";
/// Last-persisted date inside the default window.
pub const PERSISTED_IN_WINDOW: &str = "2024-01-15T10:00:00.000";

/// A seeded archive and the handlers serving it.
#[derive(Clone)]
pub struct ArchiveFixture {
    pub metadata: MemoryMetadataHandler,
    pub lifecycle: MemoryLifecycleHandler,
    pub logbook: MemoryLogbookHandler,
    pub storage: MemoryStorageHandler,
    pub workspace: MemoryWorkspaceHandler,
    pub clock: FixedClock,
    pub config: EvidenceConfig,
    algorithm: DigestAlgorithm,
    offers: Vec<String>,
    operations: Arc<AtomicI64>,
}

impl ArchiveFixture {
    /// Archive on the default strategy with two offers, secured with SHA-512.
    pub async fn new() -> Self {
        Self::with_offers(&DEFAULT_OFFERS).await
    }

    pub async fn with_offers(offers: &[&str]) -> Self {
        let offers: Vec<String> = offers.iter().map(|o| (*o).to_string()).collect();
        let storage = MemoryStorageHandler::default();
        storage.add_strategy(DEFAULT_STRATEGY, &offers).await;
        Self {
            metadata: MemoryMetadataHandler::new(),
            lifecycle: MemoryLifecycleHandler::new(),
            logbook: MemoryLogbookHandler::new(),
            storage,
            workspace: MemoryWorkspaceHandler::new(),
            clock: FixedClock::default(),
            config: EvidenceConfig {
                worker_concurrency: 4,
                availability_retry_delay_ms: 1,
                ..EvidenceConfig::default()
            },
            algorithm: DigestAlgorithm::Sha512,
            offers,
            operations: Arc::new(AtomicI64::new(0)),
        }
    }

    /// Algorithm recorded by subsequent traceability operations.
    pub fn with_algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn offers(&self) -> &[String] {
        &self.offers
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            metadata: Arc::new(self.metadata.clone()),
            lifecycle: Arc::new(self.lifecycle.clone()),
            logbook: Arc::new(self.logbook.clone()),
            storage: Arc::new(self.storage.clone()),
            workspace: Arc::new(self.workspace.clone()),
            clock: Arc::new(self.clock.clone()),
        }
    }

    pub fn config(&self) -> Arc<EvidenceConfig> {
        Arc::new(self.config.clone())
    }

    fn storage_block(&self) -> Value {
        json!({"strategyId": DEFAULT_STRATEGY, "offerIds": self.offers})
    }

    fn lifecycle_document(id: &str, version: i64, last_persisted: &str) -> Value {
        json!({
            "_id": id,
            "_v": version,
            "_lastPersistedDate": last_persisted,
            "events": [{"evType": "LFC.CHECK_MANIFEST", "outcome": "OK"}]
        })
    }

    /// Add a unit, optionally linked to an object group, stored on every offer.
    pub async fn add_unit(
        &self,
        id: &str,
        object_group: Option<&str>,
        lfc_version: i64,
        last_persisted: &str,
    ) {
        let mut document = json!({
            "_id": id,
            "Title": format!("Unit {id}"),
            "DescriptionLevel": "Item",
            "_storage": self.storage_block(),
            "_us": ["root"],
            "_uds": {"root": 1},
            "_graph": [format!("{id}/root")],
            "_glpd": last_persisted,
            "_max": 2,
            "_min": 1
        });
        if let Some(og) = object_group {
            document["_og"] = json!(og);
        }
        self.storage
            .put_everywhere(
                DEFAULT_STRATEGY,
                DataCategory::Unit,
                &DataCategory::Unit.object_name(id),
                serde_json::to_vec(&document).expect("unit serializes"),
            )
            .await;
        self.metadata.insert_unit(document).await;
        self.lifecycle
            .insert_unit_lifecycle(id, Self::lifecycle_document(id, lfc_version, last_persisted))
            .await;
    }

    /// Add an object group with one binary version per entry of `versions`.
    pub async fn add_object_group(
        &self,
        id: &str,
        versions: &[&str],
        lfc_version: i64,
        last_persisted: &str,
    ) {
        let version_documents: Vec<Value> = versions
            .iter()
            .enumerate()
            .map(|(index, version)| {
                json!({
                    "_id": version,
                    "DataObjectVersion": format!("BinaryMaster_{}", index + 1),
                    "_storage": self.storage_block()
                })
            })
            .collect();
        let document = json!({
            "_id": id,
            "FileInfo": {"Filename": format!("{id}.pdf")},
            "_qualifiers": [
                {"qualifier": "BinaryMaster", "versions": version_documents},
                {"qualifier": "PhysicalMaster", "versions": [
                    {"_id": format!("{id}-physical"), "PhysicalId": format!("shelf-{id}")}
                ]}
            ],
            "_storage": self.storage_block(),
            "_us": ["root"],
            "_graph": [format!("{id}/root")],
            "_glpd": last_persisted
        });
        for version in versions {
            self.storage
                .put_everywhere(
                    DEFAULT_STRATEGY,
                    DataCategory::Object,
                    version,
                    format!("binary content of {version}").into_bytes(),
                )
                .await;
        }
        self.storage
            .put_everywhere(
                DEFAULT_STRATEGY,
                DataCategory::ObjectGroup,
                &DataCategory::ObjectGroup.object_name(id),
                serde_json::to_vec(&document).expect("object group serializes"),
            )
            .await;
        self.metadata.insert_object_group(document).await;
        self.lifecycle
            .insert_object_group_lifecycle(
                id,
                Self::lifecycle_document(id, lfc_version, last_persisted),
            )
            .await;
    }

    async fn raw(&self, object: &ArchivalObjectRef) -> Option<(Value, Value)> {
        match object.object_type {
            MetadataType::Unit => Some((
                self.metadata.unit(&object.id).await?,
                self.lifecycle.unit_lifecycle(&object.id).await?,
            )),
            MetadataType::ObjectGroup => Some((
                self.metadata.object_group(&object.id).await?,
                self.lifecycle.object_group_lifecycle(&object.id).await?,
            )),
        }
    }

    async fn first_replica_digest(&self, category: DataCategory, name: &str) -> String {
        for offer in &self.offers {
            if let Some(bytes) = self
                .storage
                .replica(DEFAULT_STRATEGY, category, name, offer)
                .await
            {
                return self.storage.digest_of(&bytes);
            }
        }
        String::new()
    }

    /// Secure record matching the object's current state.
    pub async fn record_for(&self, object: &ArchivalObjectRef) -> TraceabilitySecureRecord {
        let (raw, lifecycle) = self
            .raw(object)
            .await
            .unwrap_or_else(|| panic!("{object} is not in the fixture"));
        let mut metadata = raw.clone();
        let computed = match object.object_type {
            MetadataType::Unit => &self.config.unit_computed_fields,
            MetadataType::ObjectGroup => &self.config.object_group_computed_fields,
        };
        strip_fields(&mut metadata, computed);

        let category = object.object_type.data_category();
        let mut sub_object_hashes = Vec::new();
        if object.object_type == MetadataType::ObjectGroup {
            for version in object_versions(&raw).expect("fixture versions are valid") {
                sub_object_hashes.push(SubObjectHash {
                    hash: self
                        .first_replica_digest(DataCategory::Object, &version.id)
                        .await,
                    id: version.id,
                });
            }
        }

        TraceabilitySecureRecord {
            lfc_id: object.id.clone(),
            metadata_type: object.object_type,
            version: lifecycle["_v"].as_i64().unwrap_or_default(),
            hash_metadata: digest(&metadata, self.algorithm),
            hash_lfc: digest(&lifecycle, self.algorithm),
            hash_global_from_storage: self
                .first_replica_digest(category, &category.object_name(&object.id))
                .await,
            sub_object_hashes,
        }
    }

    /// Run a lifecycle traceability operation over `ids` with the given
    /// coverage window. Returns the operation id.
    pub async fn secure(
        &self,
        object_type: MetadataType,
        ids: &[&str],
        start: &str,
        end: &str,
    ) -> String {
        let mut records = Vec::new();
        for id in ids {
            records.push(
                self.record_for(&ArchivalObjectRef::new(*id, object_type))
                    .await,
            );
        }
        self.secure_records(object_type, &records, start, end).await
    }

    /// Publish an export holding exactly `records`.
    pub async fn secure_records(
        &self,
        object_type: MetadataType,
        records: &[TraceabilitySecureRecord],
        start: &str,
        end: &str,
    ) -> String {
        let sequence = self.operations.fetch_add(1, Ordering::SeqCst) + 1;
        let operation_id = format!("traceability-{}-{sequence}", object_type.as_str().to_lowercase());
        let file_name = format!("{operation_id}.zip");
        let lines: Vec<String> = records
            .iter()
            .map(|r| serde_json::to_string(r).expect("record serializes"))
            .collect();
        let zip = build_export(&self.config.secure_export_entry, &lines);

        self.storage
            .store_container(DEFAULT_STRATEGY, DataCategory::Logbook, &file_name, zip)
            .await
            .expect("default strategy exists");

        let at = base_time() + Duration::minutes(sequence);
        let event = LogbookEvent::new(
            &operation_id,
            object_type.traceability_event_type(),
            at,
            StatusCode::Ok,
        )
        .with_detail(json!({
            "FileName": file_name,
            "DigestAlgorithm": self.algorithm.name(),
            "Hash": root_hash(&lines, self.algorithm),
            "StartDate": start,
            "EndDate": end
        }));
        self.logbook.insert(LogbookOperation::from_event(event)).await;
        operation_id
    }

    /// Overwrite one replica with foreign content.
    pub async fn corrupt_replica(&self, category: DataCategory, id: &str, offer: &str) {
        self.storage
            .put_replica(
                DEFAULT_STRATEGY,
                category,
                &category.object_name(id),
                offer,
                format!("corrupted {id} on {offer}").into_bytes(),
            )
            .await;
    }

    pub async fn set_lifecycle_version(&self, object: &ArchivalObjectRef, version: i64) {
        let change = |doc: &mut Value| doc["_v"] = json!(version);
        match object.object_type {
            MetadataType::Unit => self.lifecycle.update_unit_lifecycle(&object.id, change).await,
            MetadataType::ObjectGroup => {
                self.lifecycle
                    .update_object_group_lifecycle(&object.id, change)
                    .await
            }
        };
    }

    pub async fn set_last_persisted(&self, object: &ArchivalObjectRef, date: &str) {
        let change = |doc: &mut Value| doc["_lastPersistedDate"] = json!(date);
        match object.object_type {
            MetadataType::Unit => self.lifecycle.update_unit_lifecycle(&object.id, change).await,
            MetadataType::ObjectGroup => {
                self.lifecycle
                    .update_object_group_lifecycle(&object.id, change)
                    .await
            }
        };
    }

    /// Storage pointer every fixture object uses.
    pub fn storage_pointer(&self) -> StoragePointer {
        StoragePointer::new(DEFAULT_STRATEGY, self.offers.clone())
    }
}

fn base_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_706_745_600, 0).unwrap_or_default()
}

/// Merkle root over the digests of the secured record lines.
pub fn root_hash(lines: &[String], algorithm: DigestAlgorithm) -> String {
    let mut level: Vec<Vec<u8>> = lines.iter().map(|l| algorithm.hash(l.as_bytes())).collect();
    if level.is_empty() {
        return algorithm.hash_base64(b"");
    }
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| algorithm.hash(&pair.concat()))
            .collect();
    }
    base64::engine::general_purpose::STANDARD.encode(&level[0])
}

/// Zip holding `lines` as newline-delimited JSON under `entry`.
pub fn build_export(entry: &str, lines: &[String]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    writer.start_file(entry, options).expect("zip entry starts");
    for line in lines {
        writer.write_all(line.as_bytes()).expect("zip entry written");
        writer.write_all(b"\n").expect("zip entry written");
    }
    writer.finish().expect("zip finishes").into_inner()
}

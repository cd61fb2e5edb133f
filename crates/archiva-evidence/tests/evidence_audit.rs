//! Evidence Audit Tests
//!
//! End-to-end audits of single objects against memory collaborators seeded by
//! `ArchiveFixture`: healthy objects, version drift, tampered metadata and
//! replicas, missing records and uncovered dates.

use archiva_core::effects::LookupError;
use archiva_core::{
    ArchivalObjectRef, DataCategory, DigestAlgorithm, EvidenceStatus, LogbookEvent,
    LogbookOperation, MetadataType, StatusCode,
};
use archiva_evidence::locator::RECORD_NOT_FOUND;
use archiva_evidence::verifier::LINKED_OBJECT_ERROR;
use archiva_evidence::{classify, EvidenceAuditor};
use archiva_testkit::{
    init_test_tracing, ArchiveFixture, DEFAULT_STRATEGY, PERSISTED_IN_WINDOW, WINDOW_END,
    WINDOW_START,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;

async fn secured_unit_fixture() -> ArchiveFixture {
    init_test_tracing();
    let fixture = ArchiveFixture::new().await;
    fixture.add_unit("u1", None, 3, PERSISTED_IN_WINDOW).await;
    fixture
        .secure(MetadataType::Unit, &["u1"], WINDOW_START, WINDOW_END)
        .await;
    fixture
}

fn auditor(fixture: &ArchiveFixture) -> EvidenceAuditor {
    EvidenceAuditor::new(fixture.collaborators(), fixture.config())
}

// ============================================================================
// Healthy objects
// ============================================================================

#[tokio::test]
async fn consistent_unit_is_ok() {
    let fixture = secured_unit_fixture().await;
    let (parameters, line) = auditor(&fixture).audit(&ArchivalObjectRef::unit("u1")).await;

    assert_eq!(line.evidence_status, EvidenceStatus::Ok, "{:?}", line.message);
    assert!(parameters.is_last_securisation);
    assert_eq!(parameters.lfc_version, Some(3));
    assert_eq!(parameters.secured_version, Some(3));
    assert_eq!(line.offers_hashes.len(), 2);
    assert!(line
        .offers_hashes
        .values()
        .all(|h| Some(h) == line.secured_hash.as_ref()));
    assert!(line.sub_object_reports.is_none());
}

#[tokio::test]
async fn operation_root_hash_is_kept_as_export_metadata() {
    let fixture = secured_unit_fixture().await;
    let operation = fixture.logbook.operation("traceability-unit-1").await.unwrap();
    let detail = operation.traceability_detail().unwrap();
    let zip = fixture
        .storage
        .replica(DEFAULT_STRATEGY, DataCategory::Logbook, &detail.file_name, "offer-1")
        .await
        .unwrap();
    assert_ne!(detail.hash, fixture.storage.digest_of(&zip));

    let (parameters, line) = auditor(&fixture).audit(&ArchivalObjectRef::unit("u1")).await;
    assert_eq!(line.evidence_status, EvidenceStatus::Ok, "{:?}", line.message);
    assert_eq!(parameters.secure_export.unwrap().hash, detail.hash);
}

#[tokio::test]
async fn consistent_object_group_is_ok_with_sub_object_reports() {
    init_test_tracing();
    let fixture = ArchiveFixture::new().await;
    fixture
        .add_object_group("og1", &["o1", "o2"], 1, PERSISTED_IN_WINDOW)
        .await;
    fixture
        .secure(MetadataType::ObjectGroup, &["og1"], WINDOW_START, WINDOW_END)
        .await;

    let (_, line) = auditor(&fixture)
        .audit(&ArchivalObjectRef::object_group("og1"))
        .await;

    assert_eq!(line.evidence_status, EvidenceStatus::Ok, "{:?}", line.message);
    let reports = line.sub_object_reports.expect("object group line");
    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|r| r.evidence_status == EvidenceStatus::Ok));
}

#[tokio::test]
async fn computed_fields_do_not_affect_the_digest() {
    let fixture = secured_unit_fixture().await;
    fixture
        .metadata
        .update_unit("u1", |doc| {
            doc["_us"] = json!(["root", "other-parent"]);
            doc["_max"] = json!(7);
        })
        .await;

    let (_, line) = auditor(&fixture).audit(&ArchivalObjectRef::unit("u1")).await;
    assert_eq!(line.evidence_status, EvidenceStatus::Ok, "{:?}", line.message);
}

#[tokio::test]
async fn algorithm_comes_from_the_traceability_operation() {
    init_test_tracing();
    let fixture = ArchiveFixture::new()
        .await
        .with_algorithm(DigestAlgorithm::Sha256);
    fixture.add_unit("u1", None, 1, PERSISTED_IN_WINDOW).await;
    fixture
        .secure(MetadataType::Unit, &["u1"], WINDOW_START, WINDOW_END)
        .await;

    let (parameters, line) = auditor(&fixture).audit(&ArchivalObjectRef::unit("u1")).await;
    assert_eq!(line.evidence_status, EvidenceStatus::Ok, "{:?}", line.message);
    assert_eq!(
        parameters.secure_export.map(|e| e.digest_algorithm),
        Some(DigestAlgorithm::Sha256)
    );
}

// ============================================================================
// Version consistency
// ============================================================================

#[tokio::test]
async fn version_regression_is_ko_even_when_digests_match() {
    let fixture = secured_unit_fixture().await;
    fixture
        .set_lifecycle_version(&ArchivalObjectRef::unit("u1"), 2)
        .await;

    let (_, line) = auditor(&fixture).audit(&ArchivalObjectRef::unit("u1")).await;
    assert_eq!(line.evidence_status, EvidenceStatus::Ko);
    assert_eq!(
        line.message.as_deref(),
        Some("Invalid version. Database version (2) cannot be lower than secured one (3)")
    );
}

#[tokio::test]
async fn newer_version_under_latest_securisation_warns() {
    let fixture = secured_unit_fixture().await;
    fixture
        .set_lifecycle_version(&ArchivalObjectRef::unit("u1"), 4)
        .await;

    let (_, line) = auditor(&fixture).audit(&ArchivalObjectRef::unit("u1")).await;
    assert_eq!(line.evidence_status, EvidenceStatus::Warn);
    assert!(line
        .message
        .as_deref()
        .unwrap_or_default()
        .contains("not yet secured"));
}

#[tokio::test]
async fn newer_version_under_older_securisation_is_ko() {
    let fixture = secured_unit_fixture().await;
    fixture
        .add_unit("u2", None, 1, "2024-02-10T00:00:00.000")
        .await;
    fixture
        .secure(
            MetadataType::Unit,
            &["u2"],
            "2024-02-01T00:00:00.000",
            "2024-02-28T00:00:00.000",
        )
        .await;
    fixture
        .set_lifecycle_version(&ArchivalObjectRef::unit("u1"), 4)
        .await;

    let (parameters, line) = auditor(&fixture).audit(&ArchivalObjectRef::unit("u1")).await;
    assert!(!parameters.is_last_securisation);
    assert_eq!(line.evidence_status, EvidenceStatus::Ko);
    assert!(line
        .message
        .as_deref()
        .unwrap_or_default()
        .contains("has not been secured"));
}

// ============================================================================
// Tampering
// ============================================================================

#[tokio::test]
async fn modified_metadata_is_ko() {
    let fixture = secured_unit_fixture().await;
    fixture
        .metadata
        .update_unit("u1", |doc| doc["Title"] = json!("Rewritten"))
        .await;

    let (_, line) = auditor(&fixture).audit(&ArchivalObjectRef::unit("u1")).await;
    assert_eq!(line.evidence_status, EvidenceStatus::Ko);
    let message = line.message.unwrap_or_default();
    assert!(message.starts_with("Traceability audit KO Database check failure Errors are : ["));
    assert!(message.contains("Metadata hash"));
}

#[tokio::test]
async fn corrupted_sub_object_flags_the_parent() {
    init_test_tracing();
    let fixture = ArchiveFixture::new().await;
    fixture
        .add_object_group("og1", &["o1", "o2"], 1, PERSISTED_IN_WINDOW)
        .await;
    fixture
        .secure(MetadataType::ObjectGroup, &["og1"], WINDOW_START, WINDOW_END)
        .await;
    fixture
        .corrupt_replica(DataCategory::Object, "o2", "offer-1")
        .await;

    let (_, line) = auditor(&fixture)
        .audit(&ArchivalObjectRef::object_group("og1"))
        .await;

    assert_eq!(line.evidence_status, EvidenceStatus::Ko);
    assert!(line.message.unwrap_or_default().contains(LINKED_OBJECT_ERROR));
    let reports = line.sub_object_reports.unwrap_or_default();
    let o2 = reports.iter().find(|r| r.identifier == "o2").unwrap();
    assert_eq!(o2.evidence_status, EvidenceStatus::Ko);
    let o1 = reports.iter().find(|r| r.identifier == "o1").unwrap();
    assert_eq!(o1.evidence_status, EvidenceStatus::Ok);
}

#[tokio::test]
async fn scenario_a_single_divergent_replica_is_correctable() {
    let fixture = secured_unit_fixture().await;
    fixture
        .corrupt_replica(DataCategory::Unit, "u1", "offer-2")
        .await;

    let (_, line) = auditor(&fixture).audit(&ArchivalObjectRef::unit("u1")).await;
    assert_eq!(line.evidence_status, EvidenceStatus::Ko);
    assert!(line.message.as_deref().unwrap_or_default().contains("OfferId offer-2"));

    let secured = line.secured_hash.clone().unwrap();
    let decision = classify(&line.offer_ids, &line.offers_hashes, &secured);
    assert_eq!(decision.good_offers, vec!["offer-1".to_string()]);
    assert_eq!(decision.bad_offers, vec!["offer-2".to_string()]);
    assert!(decision.correctable);
}

#[tokio::test]
async fn scenario_b_two_divergent_replicas_are_not_correctable() {
    init_test_tracing();
    let fixture = ArchiveFixture::with_offers(&["A", "B", "C"]).await;
    fixture.add_unit("u1", None, 1, PERSISTED_IN_WINDOW).await;
    fixture
        .secure(MetadataType::Unit, &["u1"], WINDOW_START, WINDOW_END)
        .await;
    fixture.corrupt_replica(DataCategory::Unit, "u1", "B").await;
    fixture.corrupt_replica(DataCategory::Unit, "u1", "C").await;

    let (_, line) = auditor(&fixture).audit(&ArchivalObjectRef::unit("u1")).await;
    assert_eq!(line.evidence_status, EvidenceStatus::Ko);

    let decision = classify(
        &line.offer_ids,
        &line.offers_hashes,
        line.secured_hash.as_deref().unwrap(),
    );
    assert_eq!(decision.good_offers, vec!["A".to_string()]);
    assert_eq!(decision.bad_offers, vec!["B".to_string(), "C".to_string()]);
    assert!(!decision.correctable);
}

#[tokio::test]
async fn missing_replica_is_reported() {
    let fixture = secured_unit_fixture().await;
    fixture
        .storage
        .remove_replica("default", DataCategory::Unit, "u1.json", "offer-1")
        .await;

    let (_, line) = auditor(&fixture).audit(&ArchivalObjectRef::unit("u1")).await;
    assert_eq!(line.evidence_status, EvidenceStatus::Ko);
    assert!(line
        .message
        .unwrap_or_default()
        .contains("No storage metadata found for file in offer offer-1"));
}

// ============================================================================
// Missing ground truth
// ============================================================================

#[tokio::test]
async fn scenario_c_record_missing_from_export_is_ko() {
    init_test_tracing();
    let fixture = ArchiveFixture::new().await;
    fixture.add_unit("other", None, 1, PERSISTED_IN_WINDOW).await;
    fixture.add_unit("X", None, 1, PERSISTED_IN_WINDOW).await;
    let other = fixture.record_for(&ArchivalObjectRef::unit("other")).await;
    fixture
        .secure_records(MetadataType::Unit, &[other], WINDOW_START, WINDOW_END)
        .await;

    let (_, line) = auditor(&fixture).audit(&ArchivalObjectRef::unit("X")).await;
    assert_eq!(line.evidence_status, EvidenceStatus::Ko);
    assert_eq!(line.message.as_deref(), Some(RECORD_NOT_FOUND));
}

#[tokio::test]
async fn scenario_d_uncovered_date_warns() {
    let fixture = secured_unit_fixture().await;
    fixture
        .set_last_persisted(&ArchivalObjectRef::unit("u1"), "2024-03-01T08:30:00.000")
        .await;

    let (_, line) = auditor(&fixture).audit(&ArchivalObjectRef::unit("u1")).await;
    assert_eq!(line.evidence_status, EvidenceStatus::Warn);
    assert_eq!(
        line.message.as_deref(),
        Some("No traceability operation found matching date 2024-03-01T08:30:00.000")
    );
}

// ============================================================================
// Collaborator failures
// ============================================================================

#[tokio::test]
async fn missing_metadata_is_ko_and_unreachable_metadata_is_fatal() {
    let fixture = secured_unit_fixture().await;
    let auditor = auditor(&fixture);

    let (_, line) = auditor.audit(&ArchivalObjectRef::unit("ghost")).await;
    assert_eq!(line.evidence_status, EvidenceStatus::Ko);

    fixture
        .metadata
        .fail_lookup("u1", LookupError::unavailable("connection reset"))
        .await;
    let (_, line) = auditor.audit(&ArchivalObjectRef::unit("u1")).await;
    assert_eq!(line.evidence_status, EvidenceStatus::Fatal);
}

#[tokio::test]
async fn unreachable_logbook_is_fatal() {
    let fixture = secured_unit_fixture().await;
    fixture.logbook.set_unavailable(true).await;

    let (_, line) = auditor(&fixture).audit(&ArchivalObjectRef::unit("u1")).await;
    assert_eq!(line.evidence_status, EvidenceStatus::Fatal);
}

#[tokio::test]
async fn covering_operation_is_reloaded_by_id() {
    let fixture = secured_unit_fixture().await;
    fixture
        .logbook
        .fail_operation_lookup(
            "traceability-unit-1",
            LookupError::unavailable("replica lagging"),
        )
        .await;

    let (parameters, line) = auditor(&fixture).audit(&ArchivalObjectRef::unit("u1")).await;
    assert_eq!(line.evidence_status, EvidenceStatus::Fatal);
    assert!(line.message.unwrap().contains("traceability-unit-1"));
    assert!(parameters.secure_export.is_none());
}

#[tokio::test]
async fn unknown_digest_algorithm_is_fatal() {
    let fixture = secured_unit_fixture().await;
    let event = LogbookEvent::new(
        "op-md4",
        MetadataType::Unit.traceability_event_type(),
        DateTime::<Utc>::from_timestamp(1_800_000_000, 0).unwrap(),
        StatusCode::Ok,
    )
    .with_detail(json!({
        "FileName": "op-md4.zip",
        "DigestAlgorithm": "MD4",
        "Hash": "irrelevant",
        "StartDate": WINDOW_START,
        "EndDate": WINDOW_END
    }));
    fixture
        .logbook
        .insert(LogbookOperation::from_event(event))
        .await;

    let (_, line) = auditor(&fixture).audit(&ArchivalObjectRef::unit("u1")).await;
    assert_eq!(line.evidence_status, EvidenceStatus::Fatal);
    assert!(line.message.unwrap_or_default().contains("MD4"));
}

#[tokio::test]
async fn missing_export_is_fatal() {
    let fixture = secured_unit_fixture().await;
    fixture
        .storage
        .remove_replica("default", DataCategory::Logbook, "traceability-unit-1.zip", "offer-1")
        .await;
    fixture
        .storage
        .remove_replica("default", DataCategory::Logbook, "traceability-unit-1.zip", "offer-2")
        .await;

    let (_, line) = auditor(&fixture).audit(&ArchivalObjectRef::unit("u1")).await;
    assert_eq!(line.evidence_status, EvidenceStatus::Fatal);
}

// ============================================================================
// Scoped export files
// ============================================================================

#[tokio::test]
async fn extracted_exports_are_removed_after_the_audit() {
    let tmp = tempfile::tempdir().unwrap();
    let mut fixture = secured_unit_fixture().await;
    fixture.config.tmp_dir = Some(tmp.path().to_path_buf());
    let auditor = EvidenceAuditor::new(fixture.collaborators(), Arc::new(fixture.config.clone()));

    let (_, line) = auditor.audit(&ArchivalObjectRef::unit("u1")).await;
    assert_eq!(line.evidence_status, EvidenceStatus::Ok);

    fixture
        .metadata
        .update_unit("u1", |doc| doc["Title"] = json!("Rewritten"))
        .await;
    let (_, line) = auditor.audit(&ArchivalObjectRef::unit("u1")).await;
    assert_eq!(line.evidence_status, EvidenceStatus::Ko);

    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
}

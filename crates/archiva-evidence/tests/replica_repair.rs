//! Replica Repair Tests
//!
//! Repair targets derived from audit lines, rectification against memory
//! storage and re-audits after correction.

use archiva_core::{ArchivalObjectRef, DataCategory, EvidenceStatus, MetadataType};
use archiva_evidence::{classify, EvidenceAuditor, RepairError, RepairExecutor, RepairTarget};
use archiva_testkit::{
    init_test_tracing, ArchiveFixture, PERSISTED_IN_WINDOW, WINDOW_END, WINDOW_START,
};
use assert_matches::assert_matches;
use std::sync::Arc;

async fn audited_unit(fixture: &ArchiveFixture, id: &str) -> archiva_evidence::EvidenceAuditReportLine {
    EvidenceAuditor::new(fixture.collaborators(), fixture.config())
        .audit(&ArchivalObjectRef::unit(id))
        .await
        .1
}

async fn fixture_with_unit(offers: &[&str]) -> ArchiveFixture {
    init_test_tracing();
    let fixture = ArchiveFixture::with_offers(offers).await;
    fixture.add_unit("u1", None, 1, PERSISTED_IN_WINDOW).await;
    fixture
        .secure(MetadataType::Unit, &["u1"], WINDOW_START, WINDOW_END)
        .await;
    fixture
}

fn executor(fixture: &ArchiveFixture) -> RepairExecutor {
    RepairExecutor::new(Arc::new(fixture.storage.clone()))
}

// ============================================================================
// Target derivation
// ============================================================================

#[tokio::test]
async fn unit_line_yields_its_own_file() {
    let fixture = fixture_with_unit(&["offer-1", "offer-2"]).await;
    fixture
        .corrupt_replica(DataCategory::Unit, "u1", "offer-2")
        .await;
    let line = audited_unit(&fixture, "u1").await;

    let targets = RepairTarget::from_report_line(&line);
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].name(), "u1.json");
    assert_eq!(targets[0].category, DataCategory::Unit);
    assert!(targets[0].planned_decision().correctable);
}

#[tokio::test]
async fn object_group_line_yields_failing_sub_objects() {
    init_test_tracing();
    let fixture = ArchiveFixture::new().await;
    fixture
        .add_object_group("og1", &["o1", "o2"], 1, PERSISTED_IN_WINDOW)
        .await;
    fixture
        .secure(MetadataType::ObjectGroup, &["og1"], WINDOW_START, WINDOW_END)
        .await;
    fixture
        .corrupt_replica(DataCategory::Object, "o1", "offer-2")
        .await;

    let (_, line) = EvidenceAuditor::new(fixture.collaborators(), fixture.config())
        .audit(&ArchivalObjectRef::object_group("og1"))
        .await;
    let targets = RepairTarget::from_report_line(&line);

    let names: Vec<String> = targets.iter().map(RepairTarget::name).collect();
    assert_eq!(names, vec!["og1.json".to_string(), "o1".to_string()]);
    assert_eq!(targets[1].category, DataCategory::Object);
}

// ============================================================================
// Rectification
// ============================================================================

#[tokio::test]
async fn scenario_a_repair_restores_a_clean_audit() {
    let fixture = fixture_with_unit(&["offer-1", "offer-2"]).await;
    fixture
        .corrupt_replica(DataCategory::Unit, "u1", "offer-2")
        .await;
    let line = audited_unit(&fixture, "u1").await;
    assert_eq!(line.evidence_status, EvidenceStatus::Ko);

    let target = RepairTarget::from_report_line(&line).remove(0);
    let entry = executor(&fixture).rectify(&target).await;

    assert_eq!(entry.status, EvidenceStatus::Ok);
    assert_eq!(entry.source_offer.as_deref(), Some("offer-1"));
    assert_eq!(entry.corrected_offer.as_deref(), Some("offer-2"));
    assert_eq!(entry.message, "Offer offer-2 corrected from offer offer-1");

    let copies = fixture.storage.copies().await;
    assert_eq!(copies.len(), 1);
    assert_eq!(copies[0].destination_offer, "offer-2");

    let line = audited_unit(&fixture, "u1").await;
    assert_eq!(line.evidence_status, EvidenceStatus::Ok, "{:?}", line.message);
}

#[tokio::test]
async fn second_rectification_is_a_no_op() {
    let fixture = fixture_with_unit(&["offer-1", "offer-2"]).await;
    fixture
        .corrupt_replica(DataCategory::Unit, "u1", "offer-2")
        .await;
    let line = audited_unit(&fixture, "u1").await;
    let target = RepairTarget::from_report_line(&line).remove(0);
    let executor = executor(&fixture);

    executor.rectify(&target).await;
    let again = executor.rectify(&target).await;

    assert_eq!(again.status, EvidenceStatus::Ok);
    assert!(again.corrected_offer.is_none());
    assert_eq!(fixture.storage.copies().await.len(), 1);
}

#[tokio::test]
async fn scenario_b_refuses_and_leaves_storage_alone() {
    let fixture = fixture_with_unit(&["A", "B", "C"]).await;
    fixture.corrupt_replica(DataCategory::Unit, "u1", "B").await;
    fixture.corrupt_replica(DataCategory::Unit, "u1", "C").await;
    let line = audited_unit(&fixture, "u1").await;
    let target = RepairTarget::from_report_line(&line).remove(0);

    let entry = executor(&fixture).rectify(&target).await;
    assert_eq!(entry.status, EvidenceStatus::Ko);
    assert!(entry.message.contains("2 offers diverge"));
    assert!(fixture.storage.copies().await.is_empty());
}

#[tokio::test]
async fn direct_repair_of_uncorrectable_set_is_rejected() {
    let fixture = fixture_with_unit(&["A", "B", "C"]).await;
    fixture.corrupt_replica(DataCategory::Unit, "u1", "B").await;
    fixture.corrupt_replica(DataCategory::Unit, "u1", "C").await;
    let line = audited_unit(&fixture, "u1").await;
    let target = RepairTarget::from_report_line(&line).remove(0);
    let decision = classify(&target.offer_ids, &target.audited_hashes, &target.secured_hash);

    let result = executor(&fixture).repair(&target, &decision).await;
    assert_matches!(result, Err(RepairError::NotCorrectable { .. }));
}

#[tokio::test]
async fn failed_copy_is_fatal_for_that_object() {
    let fixture = fixture_with_unit(&["offer-1", "offer-2"]).await;
    fixture
        .corrupt_replica(DataCategory::Unit, "u1", "offer-2")
        .await;
    fixture.storage.fail_copies_to("offer-2").await;
    let line = audited_unit(&fixture, "u1").await;
    let target = RepairTarget::from_report_line(&line).remove(0);

    let entry = executor(&fixture).rectify(&target).await;
    assert_eq!(entry.status, EvidenceStatus::Fatal);
    assert!(entry.message.contains("offer-2"));
}

#[tokio::test]
async fn unreadable_digests_are_fatal() {
    let fixture = fixture_with_unit(&["offer-1", "offer-2"]).await;
    fixture
        .corrupt_replica(DataCategory::Unit, "u1", "offer-2")
        .await;
    let line = audited_unit(&fixture, "u1").await;
    let target = RepairTarget::from_report_line(&line).remove(0);
    fixture.storage.set_unavailable(true).await;

    let entry = executor(&fixture).rectify(&target).await;
    assert_eq!(entry.status, EvidenceStatus::Fatal);
    assert!(fixture.storage.copies().await.is_empty());
}

//! Single Object Audit Tests
//!
//! On-demand audit of one object and the logbook operation it leaves behind.

use archiva_core::{ArchivalObjectRef, DataCategory, EvidenceStatus, MetadataType, StatusCode};
use archiva_pipeline::single::{DATABASE_EVENT, EVIDENCE_AUDIT_EVENT, STORAGE_EVENT};
use archiva_pipeline::{EvidenceAuditService, PipelineError};
use archiva_testkit::{
    init_test_tracing, ArchiveFixture, PERSISTED_IN_WINDOW, WINDOW_END, WINDOW_START,
};
use assert_matches::assert_matches;

async fn archive() -> ArchiveFixture {
    init_test_tracing();
    let fixture = ArchiveFixture::new().await;
    fixture.add_unit("u1", None, 1, PERSISTED_IN_WINDOW).await;
    fixture
        .secure(MetadataType::Unit, &["u1"], WINDOW_START, WINDOW_END)
        .await;
    fixture
}

fn service(fixture: &ArchiveFixture) -> EvidenceAuditService {
    EvidenceAuditService::new(fixture.collaborators(), fixture.config())
}

async fn event_types(fixture: &ArchiveFixture, operation_id: &str) -> Vec<String> {
    fixture
        .logbook
        .operation(operation_id)
        .await
        .expect("operation journaled")
        .events
        .into_iter()
        .map(|e| e.event_type)
        .collect()
}

// ============================================================================
// Journaling
// ============================================================================

#[tokio::test]
async fn consistent_object_journals_both_phases() {
    let fixture = archive().await;
    let (operation_id, line) = service(&fixture)
        .launch(&ArchivalObjectRef::unit("u1"))
        .await
        .unwrap();

    assert_eq!(line.evidence_status, EvidenceStatus::Ok);
    assert_eq!(
        event_types(&fixture, &operation_id).await,
        vec![DATABASE_EVENT, STORAGE_EVENT, EVIDENCE_AUDIT_EVENT]
    );
    let operation = fixture.logbook.operation(&operation_id).await.unwrap();
    assert_eq!(operation.event_type, EVIDENCE_AUDIT_EVENT);
    assert_eq!(operation.outcome, StatusCode::Ok);
}

#[tokio::test]
async fn divergent_replica_fails_the_storage_phase() {
    let fixture = archive().await;
    fixture
        .corrupt_replica(DataCategory::Unit, "u1", "offer-1")
        .await;
    let (operation_id, line) = service(&fixture)
        .launch(&ArchivalObjectRef::unit("u1"))
        .await
        .unwrap();

    assert_eq!(line.evidence_status, EvidenceStatus::Ko);
    let operation = fixture.logbook.operation(&operation_id).await.unwrap();
    assert_eq!(operation.outcome, StatusCode::Ko);
    assert_eq!(operation.events[0].outcome, StatusCode::Ok);
    assert_eq!(operation.events[1].outcome, StatusCode::Ko);
}

#[tokio::test]
async fn failed_database_phase_skips_storage() {
    let fixture = archive().await;
    let (operation_id, line) = service(&fixture)
        .launch(&ArchivalObjectRef::unit("missing"))
        .await
        .unwrap();

    assert_eq!(line.evidence_status, EvidenceStatus::Ko);
    assert_eq!(
        event_types(&fixture, &operation_id).await,
        vec![DATABASE_EVENT, EVIDENCE_AUDIT_EVENT]
    );
}

#[tokio::test]
async fn unreachable_logbook_is_an_error() {
    let fixture = archive().await;
    fixture.logbook.set_unavailable(true).await;
    let result = service(&fixture)
        .launch(&ArchivalObjectRef::unit("u1"))
        .await;
    assert_matches!(result, Err(PipelineError::Logbook(_)));
}

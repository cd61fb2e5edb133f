//! Storage replica verification against secured digests.

use crate::model::{EvidenceAuditReportObject, SubObjectParameters};
use archiva_core::{EvidenceStatus, SubObjectHash};
use std::collections::BTreeMap;

pub const LINKED_OBJECT_ERROR: &str = "There is an error on the audit of the linked object";

/// Errors for every offer whose digest is missing or differs from `secured`.
///
/// All offers are checked; nothing short-circuits.
pub fn compare_replicas(
    offer_ids: &[String],
    digests: &BTreeMap<String, String>,
    secured: &str,
) -> Vec<String> {
    offer_ids
        .iter()
        .filter_map(|offer| match digests.get(offer) {
            None => Some(format!("No storage metadata found for file in offer {offer}")),
            Some(actual) if actual != secured => Some(format!(
                "OfferId {offer} : Storage hash '{actual}' mismatch secured hash '{secured}'"
            )),
            Some(_) => None,
        })
        .collect()
}

/// Verify each secured content version of an object group.
///
/// Returns one report per secured entry. Versions present in the database but
/// absent from the secured list are not audited.
pub fn verify_sub_objects(
    secured: &[SubObjectHash],
    database: &[SubObjectParameters],
) -> Vec<EvidenceAuditReportObject> {
    secured
        .iter()
        .map(|expected| {
            let Some(current) = database.iter().find(|s| s.id == expected.id) else {
                return EvidenceAuditReportObject {
                    identifier: expected.id.clone(),
                    evidence_status: EvidenceStatus::Ko,
                    message: Some(format!(
                        "No storage information found in database for object {}",
                        expected.id
                    )),
                    strategy_id: None,
                    offer_ids: Vec::new(),
                    offers_hashes: BTreeMap::new(),
                    secured_hash: Some(expected.hash.clone()),
                };
            };
            let errors = compare_replicas(
                &current.storage.offer_ids,
                &current.offer_digests,
                &expected.hash,
            );
            let (status, message) = if errors.is_empty() {
                (EvidenceStatus::Ok, None)
            } else {
                (EvidenceStatus::Ko, Some(errors.join(", ")))
            };
            EvidenceAuditReportObject {
                identifier: expected.id.clone(),
                evidence_status: status,
                message,
                strategy_id: Some(current.storage.strategy_id.clone()),
                offer_ids: current.storage.offer_ids.clone(),
                offers_hashes: current.offer_digests.clone(),
                secured_hash: Some(expected.hash.clone()),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use archiva_core::StoragePointer;

    fn offers(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| (*s).to_string()).collect()
    }

    fn digests(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn every_divergence_is_reported() {
        let errors = compare_replicas(
            &offers(&["a", "b", "c"]),
            &digests(&[("a", "H1"), ("b", "H2")]),
            "H1",
        );
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("OfferId b"));
        assert!(errors[1].contains("offer c"));
    }

    #[test]
    fn matching_replicas_produce_no_errors() {
        let errors = compare_replicas(&offers(&["a", "b"]), &digests(&[("a", "H"), ("b", "H")]), "H");
        assert!(errors.is_empty());
    }

    #[test]
    fn sub_objects_are_checked_against_their_own_hash() {
        let secured = vec![
            SubObjectHash { id: "o1".into(), hash: "X".into() },
            SubObjectHash { id: "o2".into(), hash: "Y".into() },
            SubObjectHash { id: "o3".into(), hash: "Z".into() },
        ];
        let database = vec![
            SubObjectParameters {
                id: "o1".into(),
                storage: StoragePointer::new("default", offers(&["a", "b"])),
                offer_digests: digests(&[("a", "X"), ("b", "X")]),
            },
            SubObjectParameters {
                id: "o2".into(),
                storage: StoragePointer::new("default", offers(&["a", "b"])),
                offer_digests: digests(&[("a", "Y"), ("b", "bad")]),
            },
        ];
        let reports = verify_sub_objects(&secured, &database);
        assert_eq!(reports[0].evidence_status, EvidenceStatus::Ok);
        assert_eq!(reports[1].evidence_status, EvidenceStatus::Ko);
        assert_eq!(reports[2].evidence_status, EvidenceStatus::Ko);
        assert!(reports[2].strategy_id.is_none());
    }
}

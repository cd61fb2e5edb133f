//! Single-replica repair.
//!
//! A replica set is correctable when at least one offer still holds the
//! secured content and exactly one offer diverges from it. Any other shape is
//! reported and left alone: with no good offer there is nothing to copy from,
//! and with several bad offers the divergence is not a single-replica fault.

use crate::model::{CorrectionReportEntry, EvidenceAuditReportLine};
use archiva_core::effects::{StorageEffects, StorageError};
use archiva_core::{DataCategory, EvidenceStatus};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Partition of a replica set against its secured digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairDecision {
    /// Offers holding the secured digest, in offer-id order
    pub good_offers: Vec<String>,
    /// Offers with a different or missing digest, in offer-id order
    pub bad_offers: Vec<String>,
    pub correctable: bool,
}

impl RepairDecision {
    /// Offer to copy from.
    pub fn source_offer(&self) -> Option<&str> {
        self.good_offers.first().map(String::as_str)
    }

    /// Offer to overwrite, for a correctable set.
    pub fn target_offer(&self) -> Option<&str> {
        match self.bad_offers.as_slice() {
            [single] => Some(single.as_str()),
            _ => None,
        }
    }

    /// Every offer already matches.
    pub fn is_converged(&self) -> bool {
        self.bad_offers.is_empty()
    }

    fn refusal(&self) -> String {
        if self.good_offers.is_empty() {
            "No offer holds the secured hash, nothing to copy from".to_string()
        } else {
            format!(
                "{} offers diverge from the secured hash ({}), only a single divergent offer can be corrected",
                self.bad_offers.len(),
                self.bad_offers.join(", ")
            )
        }
    }
}

/// Classify each offer of a replica set. A missing digest counts as bad.
pub fn classify(
    offer_ids: &[String],
    digests: &BTreeMap<String, String>,
    secured_hash: &str,
) -> RepairDecision {
    let mut offers: Vec<&String> = offer_ids.iter().collect();
    offers.sort();
    offers.dedup();

    let (good, bad): (Vec<&String>, Vec<&String>) = offers
        .into_iter()
        .partition(|offer| digests.get(*offer).map(String::as_str) == Some(secured_hash));
    let good_offers: Vec<String> = good.into_iter().cloned().collect();
    let bad_offers: Vec<String> = bad.into_iter().cloned().collect();
    let correctable = !good_offers.is_empty() && bad_offers.len() == 1;
    RepairDecision {
        good_offers,
        bad_offers,
        correctable,
    }
}

/// Repair failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepairError {
    #[error("Replica set of {name} is not correctable: {reason}")]
    NotCorrectable { name: String, reason: String },
    #[error("Storage failure while repairing {name}: {source}")]
    Storage { name: String, source: StorageError },
}

/// One replica set to repair: a stored file, its offers and its secured digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairTarget {
    pub identifier: String,
    pub category: DataCategory,
    pub strategy_id: String,
    pub offer_ids: Vec<String>,
    pub secured_hash: String,
    /// Digests observed when the audit ran
    pub audited_hashes: BTreeMap<String, String>,
}

impl RepairTarget {
    /// Storage name of the file.
    pub fn name(&self) -> String {
        self.category.object_name(&self.identifier)
    }

    /// Decision based on the audit-time digests, used to plan availability.
    pub fn planned_decision(&self) -> RepairDecision {
        classify(&self.offer_ids, &self.audited_hashes, &self.secured_hash)
    }

    /// Repair targets of a KO audit line: the object's own file and every
    /// failing content version that has a secured digest and a known storage
    /// pointer.
    pub fn from_report_line(line: &EvidenceAuditReportLine) -> Vec<Self> {
        let mut targets = Vec::new();
        if let (Some(strategy), Some(secured)) = (&line.strategy_id, &line.secured_hash) {
            targets.push(Self {
                identifier: line.identifier.clone(),
                category: line.object_type.data_category(),
                strategy_id: strategy.clone(),
                offer_ids: line.offer_ids.clone(),
                secured_hash: secured.clone(),
                audited_hashes: line.offers_hashes.clone(),
            });
        }
        for sub in line.sub_object_reports.iter().flatten() {
            if sub.evidence_status.is_ok() {
                continue;
            }
            if let (Some(strategy), Some(secured)) = (&sub.strategy_id, &sub.secured_hash) {
                targets.push(Self {
                    identifier: sub.identifier.clone(),
                    category: DataCategory::Object,
                    strategy_id: strategy.clone(),
                    offer_ids: sub.offer_ids.clone(),
                    secured_hash: secured.clone(),
                    audited_hashes: sub.offers_hashes.clone(),
                });
            }
        }
        targets
    }
}

/// Applies repair decisions through server-side offer copies.
#[derive(Clone)]
pub struct RepairExecutor {
    storage: Arc<dyn StorageEffects>,
}

impl RepairExecutor {
    pub fn new(storage: Arc<dyn StorageEffects>) -> Self {
        Self { storage }
    }

    /// Copy the first good offer over the single bad one.
    pub async fn repair(
        &self,
        target: &RepairTarget,
        decision: &RepairDecision,
    ) -> Result<(), RepairError> {
        let name = target.name();
        let (Some(source), Some(destination), true) = (
            decision.source_offer(),
            decision.target_offer(),
            decision.correctable,
        ) else {
            return Err(RepairError::NotCorrectable {
                name,
                reason: decision.refusal(),
            });
        };
        self.storage
            .copy_between_offers(&target.strategy_id, target.category, &name, source, destination)
            .await
            .map_err(|source| RepairError::Storage {
                name: name.clone(),
                source,
            })?;
        info!(file = %name, source, destination, "Replica corrected");
        Ok(())
    }

    /// Re-read the current digests, re-classify and repair when still
    /// correctable. Running it again on a repaired set is a no-op.
    pub async fn rectify(&self, target: &RepairTarget) -> CorrectionReportEntry {
        let mut entry = CorrectionReportEntry {
            identifier: target.identifier.clone(),
            object_type: target.category,
            status: EvidenceStatus::Ok,
            message: String::new(),
            source_offer: None,
            corrected_offer: None,
            secured_hash: Some(target.secured_hash.clone()),
            offers_hashes: BTreeMap::new(),
        };

        let name = target.name();
        let digests = match self
            .storage
            .replica_digests(&target.strategy_id, target.category, &name, &target.offer_ids)
            .await
        {
            Ok(digests) => digests,
            Err(e) => {
                warn!(file = %name, error = %e, "Could not read replica digests");
                entry.status = EvidenceStatus::Fatal;
                entry.message = format!("Could not read replica digests: {e}");
                return entry;
            }
        };
        entry.offers_hashes = digests.clone();

        let decision = classify(&target.offer_ids, &digests, &target.secured_hash);
        if decision.is_converged() {
            debug!(file = %name, "Replicas already consistent");
            entry.message = "All offers hold the secured hash, nothing to correct".to_string();
            return entry;
        }
        if !decision.correctable {
            warn!(file = %name, bad = ?decision.bad_offers, "Replica set not correctable");
            entry.status = EvidenceStatus::Ko;
            entry.message = decision.refusal();
            return entry;
        }

        entry.source_offer = decision.source_offer().map(str::to_string);
        entry.corrected_offer = decision.target_offer().map(str::to_string);
        match self.repair(target, &decision).await {
            Ok(()) => {
                entry.message = format!(
                    "Offer {} corrected from offer {}",
                    entry.corrected_offer.as_deref().unwrap_or_default(),
                    entry.source_offer.as_deref().unwrap_or_default()
                );
                if let (Some(bad), Some(good)) = (&entry.corrected_offer, &entry.source_offer) {
                    if let Some(secured) = digests.get(good) {
                        entry.offers_hashes.insert(bad.clone(), secured.clone());
                    }
                }
            }
            Err(e) => {
                warn!(file = %name, error = %e, "Replica correction failed");
                entry.status = EvidenceStatus::Fatal;
                entry.message = e.to_string();
            }
        }
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

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
    fn single_divergent_offer_is_correctable() {
        let decision = classify(&offers(&["B", "A"]), &digests(&[("A", "H1"), ("B", "H2")]), "H1");
        assert_eq!(decision.good_offers, offers(&["A"]));
        assert_eq!(decision.bad_offers, offers(&["B"]));
        assert!(decision.correctable);
        assert_eq!(decision.source_offer(), Some("A"));
        assert_eq!(decision.target_offer(), Some("B"));
    }

    #[test]
    fn two_divergent_offers_are_not_correctable() {
        let decision = classify(
            &offers(&["A", "B", "C"]),
            &digests(&[("A", "H1"), ("B", "H2"), ("C", "H3")]),
            "H1",
        );
        assert_eq!(decision.bad_offers, offers(&["B", "C"]));
        assert!(!decision.correctable);
        assert!(decision.refusal().contains("2 offers diverge"));
    }

    #[test]
    fn missing_digest_counts_as_bad() {
        let decision = classify(&offers(&["A", "B"]), &digests(&[("A", "H1")]), "H1");
        assert_eq!(decision.bad_offers, offers(&["B"]));
        assert!(decision.correctable);
    }

    #[test]
    fn single_offer_set_is_never_correctable() {
        let decision = classify(&offers(&["A"]), &digests(&[("A", "H2")]), "H1");
        assert!(!decision.correctable);
        assert_eq!(decision.source_offer(), None);
    }

    proptest! {
        #[test]
        fn correctable_iff_one_bad_and_some_good(
            flags in prop::collection::vec(any::<bool>(), 1..6)
        ) {
            let ids: Vec<String> = (0..flags.len()).map(|i| format!("offer-{i}")).collect();
            let map: BTreeMap<String, String> = ids
                .iter()
                .zip(&flags)
                .map(|(id, good)| (id.clone(), if *good { "S".to_string() } else { format!("X-{id}") }))
                .collect();
            let decision = classify(&ids, &map, "S");
            let good = flags.iter().filter(|g| **g).count();
            let bad = flags.len() - good;

            prop_assert_eq!(decision.correctable, good >= 1 && bad == 1);
            // A good offer is never scheduled for overwrite
            for offer in &decision.bad_offers {
                prop_assert_ne!(map.get(offer).map(String::as_str), Some("S"));
            }
            prop_assert_eq!(decision.good_offers.len() + decision.bad_offers.len(), ids.len());
        }
    }
}

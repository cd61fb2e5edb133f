use archiva_core::effects::{ByteStream, StorageEffects, StorageError};
use archiva_core::{DataCategory, DigestAlgorithm};
use async_lock::RwLock;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Cursor;
use std::sync::Arc;

type FileKey = (String, DataCategory, String);

/// A server-side copy performed through [`StorageEffects::copy_between_offers`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCopy {
    pub name: String,
    pub source_offer: String,
    pub destination_offer: String,
}

/// An access request issued to a cold offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedAccessRequest {
    pub id: String,
    pub offer_id: String,
    pub names: Vec<String>,
}

/// Memory storage engine with per-offer replicas.
///
/// Replica digests are computed from the stored bytes with the handler's
/// algorithm, so corrupting a replica changes its digest.
#[derive(Debug, Clone)]
pub struct MemoryStorageHandler {
    algorithm: DigestAlgorithm,
    strategies: Arc<RwLock<BTreeMap<String, Vec<String>>>>,
    replicas: Arc<RwLock<HashMap<FileKey, BTreeMap<String, Vec<u8>>>>>,
    /// Offer -> availability checks still answered `false`
    cold_offers: Arc<RwLock<HashMap<String, usize>>>,
    failing_destinations: Arc<RwLock<HashSet<String>>>,
    unavailable: Arc<RwLock<bool>>,
    copies: Arc<RwLock<Vec<RecordedCopy>>>,
    access_requests: Arc<RwLock<Vec<RecordedAccessRequest>>>,
}

impl Default for MemoryStorageHandler {
    fn default() -> Self {
        Self::new(DigestAlgorithm::Sha512)
    }
}

impl MemoryStorageHandler {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        Self {
            algorithm,
            strategies: Arc::new(RwLock::new(BTreeMap::new())),
            replicas: Arc::new(RwLock::new(HashMap::new())),
            cold_offers: Arc::new(RwLock::new(HashMap::new())),
            failing_destinations: Arc::new(RwLock::new(HashSet::new())),
            unavailable: Arc::new(RwLock::new(false)),
            copies: Arc::new(RwLock::new(Vec::new())),
            access_requests: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Digest the handler reports for `bytes`.
    pub fn digest_of(&self, bytes: &[u8]) -> String {
        self.algorithm.hash_base64(bytes)
    }

    pub async fn add_strategy(&self, strategy: &str, offer_ids: &[String]) {
        self.strategies
            .write()
            .await
            .insert(strategy.to_string(), offer_ids.to_vec());
    }

    pub async fn put_replica(
        &self,
        strategy: &str,
        category: DataCategory,
        name: &str,
        offer_id: &str,
        bytes: Vec<u8>,
    ) {
        self.replicas
            .write()
            .await
            .entry(key(strategy, category, name))
            .or_default()
            .insert(offer_id.to_string(), bytes);
    }

    /// Store `bytes` on every offer of `strategy`.
    pub async fn put_everywhere(
        &self,
        strategy: &str,
        category: DataCategory,
        name: &str,
        bytes: Vec<u8>,
    ) {
        let offers = self
            .strategies
            .read()
            .await
            .get(strategy)
            .cloned()
            .unwrap_or_default();
        for offer in offers {
            self.put_replica(strategy, category, name, &offer, bytes.clone())
                .await;
        }
    }

    pub async fn remove_replica(
        &self,
        strategy: &str,
        category: DataCategory,
        name: &str,
        offer_id: &str,
    ) {
        if let Some(offers) = self
            .replicas
            .write()
            .await
            .get_mut(&key(strategy, category, name))
        {
            offers.remove(offer_id);
        }
    }

    pub async fn replica(
        &self,
        strategy: &str,
        category: DataCategory,
        name: &str,
        offer_id: &str,
    ) -> Option<Vec<u8>> {
        self.replicas
            .read()
            .await
            .get(&key(strategy, category, name))
            .and_then(|offers| offers.get(offer_id))
            .cloned()
    }

    /// Answer `false` to the next `checks` availability checks on `offer_id`.
    pub async fn set_cold(&self, offer_id: &str, checks: usize) {
        self.cold_offers
            .write()
            .await
            .insert(offer_id.to_string(), checks);
    }

    pub async fn fail_copies_to(&self, offer_id: &str) {
        self.failing_destinations
            .write()
            .await
            .insert(offer_id.to_string());
    }

    /// Make digest reads fail as if storage were unreachable.
    pub async fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write().await = unavailable;
    }

    pub async fn copies(&self) -> Vec<RecordedCopy> {
        self.copies.read().await.clone()
    }

    pub async fn access_requests(&self) -> Vec<RecordedAccessRequest> {
        self.access_requests.read().await.clone()
    }
}

fn key(strategy: &str, category: DataCategory, name: &str) -> FileKey {
    (strategy.to_string(), category, name.to_string())
}

#[async_trait]
impl StorageEffects for MemoryStorageHandler {
    async fn replica_digests(
        &self,
        strategy: &str,
        category: DataCategory,
        name: &str,
        offer_ids: &[String],
    ) -> Result<BTreeMap<String, String>, StorageError> {
        if *self.unavailable.read().await {
            return Err(StorageError::unavailable("storage engine is unreachable"));
        }
        let replicas = self.replicas.read().await;
        let Some(offers) = replicas.get(&key(strategy, category, name)) else {
            return Ok(BTreeMap::new());
        };
        Ok(offer_ids
            .iter()
            .filter_map(|offer| {
                offers
                    .get(offer)
                    .map(|bytes| (offer.clone(), self.digest_of(bytes)))
            })
            .collect())
    }

    async fn copy_between_offers(
        &self,
        strategy: &str,
        category: DataCategory,
        name: &str,
        source_offer: &str,
        destination_offer: &str,
    ) -> Result<(), StorageError> {
        if self
            .failing_destinations
            .read()
            .await
            .contains(destination_offer)
        {
            return Err(StorageError::offer_failure(
                destination_offer,
                "write rejected",
            ));
        }
        let bytes = self
            .replica(strategy, category, name, source_offer)
            .await
            .ok_or_else(|| StorageError::not_found(format!("{name} on {source_offer}")))?;
        self.put_replica(strategy, category, name, destination_offer, bytes)
            .await;
        self.copies.write().await.push(RecordedCopy {
            name: name.to_string(),
            source_offer: source_offer.to_string(),
            destination_offer: destination_offer.to_string(),
        });
        Ok(())
    }

    async fn fetch_container(
        &self,
        strategy: &str,
        category: DataCategory,
        name: &str,
    ) -> Result<ByteStream, StorageError> {
        let replicas = self.replicas.read().await;
        let bytes = replicas
            .get(&key(strategy, category, name))
            .and_then(|offers| offers.values().next())
            .cloned()
            .ok_or_else(|| StorageError::not_found(name))?;
        Ok(Box::new(Cursor::new(bytes)))
    }

    async fn store_container(
        &self,
        strategy: &str,
        category: DataCategory,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<(), StorageError> {
        if !self.strategies.read().await.contains_key(strategy) {
            return Err(StorageError::unavailable(format!(
                "Unknown strategy {strategy}"
            )));
        }
        self.put_everywhere(strategy, category, name, bytes).await;
        Ok(())
    }

    async fn check_availability(
        &self,
        _strategy: &str,
        offer_id: &str,
        _category: DataCategory,
        _names: &[String],
    ) -> Result<bool, StorageError> {
        let mut cold = self.cold_offers.write().await;
        match cold.get_mut(offer_id) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Ok(false)
            }
            _ => Ok(true),
        }
    }

    async fn create_access_request(
        &self,
        _strategy: &str,
        offer_id: &str,
        _category: DataCategory,
        names: &[String],
    ) -> Result<Option<String>, StorageError> {
        if !self.cold_offers.read().await.contains_key(offer_id) {
            return Ok(None);
        }
        let mut requests = self.access_requests.write().await;
        let id = format!("access-request-{}", requests.len() + 1);
        requests.push(RecordedAccessRequest {
            id: id.clone(),
            offer_id: offer_id.to_string(),
            names: names.to_vec(),
        });
        Ok(Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offers() -> Vec<String> {
        vec!["a".to_string(), "b".to_string()]
    }

    #[tokio::test]
    async fn copies_overwrite_the_destination() {
        let storage = MemoryStorageHandler::default();
        storage.add_strategy("default", &offers()).await;
        storage
            .put_everywhere("default", DataCategory::Unit, "u1.json", b"good".to_vec())
            .await;
        storage
            .put_replica("default", DataCategory::Unit, "u1.json", "b", b"bad".to_vec())
            .await;

        storage
            .copy_between_offers("default", DataCategory::Unit, "u1.json", "a", "b")
            .await
            .unwrap();
        let digests = storage
            .replica_digests("default", DataCategory::Unit, "u1.json", &offers())
            .await
            .unwrap();
        assert_eq!(digests["a"], digests["b"]);
        assert_eq!(storage.copies().await.len(), 1);
    }

    #[tokio::test]
    async fn cold_offers_warm_up_after_checks() {
        let storage = MemoryStorageHandler::default();
        storage.set_cold("b", 1).await;
        let names = vec!["o1".to_string()];
        assert!(!storage
            .check_availability("default", "b", DataCategory::Object, &names)
            .await
            .unwrap());
        assert!(storage
            .create_access_request("default", "b", DataCategory::Object, &names)
            .await
            .unwrap()
            .is_some());
        assert!(storage
            .check_availability("default", "b", DataCategory::Object, &names)
            .await
            .unwrap());
        assert!(storage
            .create_access_request("default", "a", DataCategory::Object, &names)
            .await
            .unwrap()
            .is_none());
    }
}

//! Replicated storage.
//!
//! A strategy spans one or more offers; each stored file has one replica per
//! offer. Names are storage names (see `DataCategory::object_name`).

use crate::types::DataCategory;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::io::AsyncRead;

/// Byte stream of a fetched container.
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// Storage errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("Not found: {name}")]
    NotFound { name: String },
    #[error("Offer {offer} failed: {reason}")]
    OfferFailure { offer: String, reason: String },
    #[error("Storage unavailable: {reason}")]
    Unavailable { reason: String },
}

impl StorageError {
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    pub fn offer_failure(offer: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::OfferFailure {
            offer: offer.into(),
            reason: reason.into(),
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}

/// Storage engine access.
#[async_trait]
pub trait StorageEffects: Send + Sync {
    /// Digest of `name` on each requested offer.
    ///
    /// Offers without the file, or without a stored digest, are absent from
    /// the map.
    async fn replica_digests(
        &self,
        strategy: &str,
        category: DataCategory,
        name: &str,
        offer_ids: &[String],
    ) -> Result<BTreeMap<String, String>, StorageError>;

    /// Server-side copy of one replica over another.
    async fn copy_between_offers(
        &self,
        strategy: &str,
        category: DataCategory,
        name: &str,
        source_offer: &str,
        destination_offer: &str,
    ) -> Result<(), StorageError>;

    async fn fetch_container(
        &self,
        strategy: &str,
        category: DataCategory,
        name: &str,
    ) -> Result<ByteStream, StorageError>;

    /// Store a file on every offer of the strategy.
    async fn store_container(
        &self,
        strategy: &str,
        category: DataCategory,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<(), StorageError>;

    /// Whether every named file is immediately readable from `offer_id`.
    async fn check_availability(
        &self,
        strategy: &str,
        offer_id: &str,
        category: DataCategory,
        names: &[String],
    ) -> Result<bool, StorageError>;

    /// Ask a cold offer to stage files. Returns the request id when the offer
    /// needed one.
    async fn create_access_request(
        &self,
        strategy: &str,
        offer_id: &str,
        category: DataCategory,
        names: &[String],
    ) -> Result<Option<String>, StorageError>;
}

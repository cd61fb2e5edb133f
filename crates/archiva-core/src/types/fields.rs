//! Field names of raw metadata and lifecycle documents.

pub const ID: &str = "_id";
pub const STORAGE: &str = "_storage";
pub const OBJECT_GROUP: &str = "_og";
pub const QUALIFIERS: &str = "_qualifiers";
pub const VERSIONS: &str = "versions";
pub const PHYSICAL_ID: &str = "PhysicalId";

/// Lifecycle version counter.
pub const LFC_VERSION: &str = "_v";
pub const LAST_PERSISTED_DATE: &str = "_lastPersistedDate";

pub const STRATEGY_ID: &str = "strategyId";
pub const OFFER_IDS: &str = "offerIds";

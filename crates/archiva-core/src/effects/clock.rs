//! Wall-clock time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Source of report and logbook timestamps.
#[async_trait]
pub trait ClockEffects: Send + Sync {
    async fn now(&self) -> DateTime<Utc>;
}

use archiva_core::effects::ClockEffects;
use async_lock::RwLock;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Clock returning a settable instant.
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Arc<RwLock<DateTime<Utc>>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(RwLock::new(now)),
        }
    }

    pub async fn advance(&self, by: Duration) {
        let mut now = self.now.write().await;
        *now += by;
    }
}

impl Default for FixedClock {
    fn default() -> Self {
        Self::new(DateTime::from_timestamp(1_706_745_600, 0).unwrap_or_default())
    }
}

#[async_trait]
impl ClockEffects for FixedClock {
    async fn now(&self) -> DateTime<Utc> {
        *self.now.read().await
    }
}

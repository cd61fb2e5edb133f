//! Layer 3: Clock Effect Handler - Production Only

use archiva_core::effects::ClockEffects;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Wall clock of the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ClockEffects for SystemClock {
    async fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

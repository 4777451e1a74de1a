use crate::config::{ConfigError, ConfigResult};
use std::time::Duration;
use tokio::time::Instant;

/// Per-client admission state
#[derive(Debug, Clone, Default)]
pub struct ClientSlot {
    pub active_count: u32,
    pub last_admitted_at: Option<Instant>,
}

impl ClientSlot {
    pub fn is_idle(&self) -> bool {
        self.active_count == 0
    }
}

/// Limits fixed at startup for the lifetime of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionLimits {
    max_concurrent_per_client: u32,
    min_interval: Duration,
}

impl AdmissionLimits {
    pub fn new(max_concurrent_per_client: u32, min_interval: Duration) -> ConfigResult<Self> {
        if max_concurrent_per_client < 1 {
            return Err(ConfigError::Invalid(
                "admission.max_concurrent_per_client must be >= 1".into(),
            ));
        }
        Ok(Self {
            max_concurrent_per_client,
            min_interval,
        })
    }

    pub fn max_concurrent_per_client(&self) -> u32 {
        self.max_concurrent_per_client
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

impl Default for AdmissionLimits {
    fn default() -> Self {
        Self {
            max_concurrent_per_client: 3,
            min_interval: Duration::from_secs(5),
        }
    }
}

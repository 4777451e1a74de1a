use crate::admission::error::{AdmissionRejected, AdmissionResult};
use crate::admission::types::{AdmissionLimits, ClientSlot};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Registry of [`ClientSlot`]s keyed by client identifier.
///
/// Each admission decision runs under the map entry's shard lock, so two
/// simultaneous attempts for the same client observe each other's updates.
#[derive(Clone)]
pub struct AdmissionController {
    slots: Arc<DashMap<String, ClientSlot>>,
    limits: AdmissionLimits,
}

impl AdmissionController {
    pub fn new(limits: AdmissionLimits) -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
            limits,
        }
    }

    pub fn limits(&self) -> AdmissionLimits {
        self.limits
    }

    /// Admit a new test for `client_id`, returning a guard that holds the slot
    pub fn try_admit(&self, client_id: &str) -> AdmissionResult<AdmissionGuard> {
        let now = Instant::now();
        let mut slot = self.slots.entry(client_id.to_string()).or_default();

        self.evaluate(&slot, now).inspect_err(|rejection| {
            tracing::warn!(client = client_id, %rejection, "Admission rejected");
        })?;

        slot.active_count += 1;
        slot.last_admitted_at = Some(now);
        tracing::debug!(
            client = client_id,
            active = slot.active_count,
            "Admitted test"
        );

        Ok(AdmissionGuard {
            slots: self.slots.clone(),
            client_id: client_id.to_string(),
            released: false,
        })
    }

    /// Report whether `client_id` would be admitted now, without taking a slot
    pub fn check(&self, client_id: &str) -> AdmissionResult<()> {
        match self.slots.get(client_id) {
            Some(slot) => self.evaluate(&slot, Instant::now()),
            None => Ok(()),
        }
    }

    /// Give back one slot for `client_id`. Prefer dropping the [`AdmissionGuard`].
    pub fn release(&self, client_id: &str) {
        release_slot(&self.slots, client_id);
    }

    /// Current number of admitted tests for `client_id`
    pub fn active_count(&self, client_id: &str) -> u32 {
        self.slots
            .get(client_id)
            .map(|slot| slot.active_count)
            .unwrap_or(0)
    }

    /// Total admitted tests across all clients
    pub fn total_active(&self) -> u32 {
        self.slots.iter().map(|slot| slot.active_count).sum()
    }

    pub fn tracked_clients(&self) -> usize {
        self.slots.len()
    }

    /// Drop idle slots whose interval window has fully elapsed
    pub fn prune_idle(&self) -> usize {
        let now = Instant::now();
        let min_interval = self.limits.min_interval();
        let before = self.slots.len();

        self.slots.retain(|_, slot| {
            let interval_open = slot
                .last_admitted_at
                .map(|at| now.duration_since(at) < min_interval)
                .unwrap_or(false);
            !slot.is_idle() || interval_open
        });

        let pruned = before.saturating_sub(self.slots.len());
        if pruned > 0 {
            tracing::debug!(pruned, "Pruned idle admission slots");
        }
        pruned
    }

    fn evaluate(&self, slot: &ClientSlot, now: Instant) -> AdmissionResult<()> {
        let limit = self.limits.max_concurrent_per_client();
        if slot.active_count >= limit {
            return Err(AdmissionRejected::TooManyConcurrent {
                active: slot.active_count,
                limit,
                retry_after: self.limits.min_interval().max(Duration::from_secs(1)),
            });
        }

        if let Some(last) = slot.last_admitted_at {
            let elapsed = now.duration_since(last);
            let min_interval = self.limits.min_interval();
            if elapsed < min_interval {
                return Err(AdmissionRejected::IntervalTooShort {
                    retry_after: min_interval - elapsed,
                });
            }
        }

        Ok(())
    }
}

fn release_slot(slots: &DashMap<String, ClientSlot>, client_id: &str) {
    if let Some(mut slot) = slots.get_mut(client_id) {
        slot.active_count = slot.active_count.saturating_sub(1);
        tracing::debug!(client = client_id, active = slot.active_count, "Released test slot");
    }
}

/// Holds one admitted slot; dropping it releases the slot
#[must_use = "dropping the guard releases the admission slot immediately"]
pub struct AdmissionGuard {
    slots: Arc<DashMap<String, ClientSlot>>,
    client_id: String,
    released: bool,
}

impl AdmissionGuard {
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Release the slot now instead of at drop
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if !self.released {
            self.released = true;
            release_slot(&self.slots, &self.client_id);
        }
    }
}

impl Drop for AdmissionGuard {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl std::fmt::Debug for AdmissionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionGuard")
            .field("client_id", &self.client_id)
            .field("released", &self.released)
            .finish()
    }
}

use crate::latency::error::{ProbeError, ProbeResult};
use crate::latency::types::{LatencyStats, ProbeSettings};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

/// A transport able to echo a probe and report the round trip
#[async_trait]
pub trait RoundTrip: Send + Sync {
    async fn round_trip(&self, seq: u32) -> std::io::Result<Duration>;
}

/// In-process round trip with a fixed delay, measured against the clock
#[derive(Debug, Clone)]
pub struct LoopbackRoundTrip {
    delay: Duration,
}

impl LoopbackRoundTrip {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for LoopbackRoundTrip {
    fn default() -> Self {
        Self::new(Duration::from_millis(1))
    }
}

#[async_trait]
impl RoundTrip for LoopbackRoundTrip {
    async fn round_trip(&self, _seq: u32) -> std::io::Result<Duration> {
        let start = Instant::now();
        time::sleep(self.delay).await;
        Ok(start.elapsed())
    }
}

pub struct LatencyProber {
    transport: Arc<dyn RoundTrip>,
    settings: ProbeSettings,
}

impl LatencyProber {
    pub fn new(transport: Arc<dyn RoundTrip>, settings: ProbeSettings) -> ProbeResult<Self> {
        if settings.sample_count == 0 {
            return Err(ProbeError::InvalidSettings(
                "sample_count must be >= 1".into(),
            ));
        }
        if settings.timeout.is_zero() {
            return Err(ProbeError::InvalidSettings("timeout must be > 0".into()));
        }
        Ok(Self {
            transport,
            settings,
        })
    }

    pub fn settings(&self) -> ProbeSettings {
        self.settings
    }

    /// Take one sample; `None` if it failed or outlived its timeout
    pub async fn sample(&self, seq: u32) -> Option<f64> {
        match time::timeout(self.settings.timeout, self.transport.round_trip(seq)).await {
            Ok(Ok(rtt)) => Some(rtt.as_secs_f64() * 1000.0),
            Ok(Err(e)) => {
                tracing::debug!(seq, error = %e, "Latency sample failed");
                None
            }
            Err(_) => {
                tracing::debug!(seq, "Latency sample timed out");
                None
            }
        }
    }

    /// Run all samples sequentially with fixed spacing between them
    pub async fn probe(&self, cancel: &CancellationToken) -> ProbeResult<LatencyStats> {
        let count = self.settings.sample_count;
        let mut samples = Vec::with_capacity(count as usize);

        for seq in 0..count {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => return Err(ProbeError::Cancelled { completed: seq }),
                outcome = self.sample(seq) => outcome,
            };
            samples.push(outcome);

            if seq + 1 < count && !self.settings.spacing.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        return Err(ProbeError::Cancelled { completed: seq + 1 });
                    }
                    _ = time::sleep(self.settings.spacing) => {}
                }
            }
        }

        let stats = LatencyStats::from_samples(&samples);
        if stats.is_total_loss() {
            tracing::warn!(samples = count, "No latency samples succeeded");
        }
        Ok(stats)
    }
}

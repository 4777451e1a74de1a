use crate::progress::{ProgressSink, ProgressUpdate, SinkResult};
use crate::transfer::types::{average_mbps, ByteCounter, Direction};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Periodic throughput reporter for one transfer phase.
///
/// Each tick reports `elapsed / duration` as progress and the cumulative
/// average rate (total bytes over total elapsed time), not a windowed
/// instantaneous rate. Ticks stop at the phase deadline; the final 1.0
/// update belongs to the phase runner.
pub struct Sampler {
    pub direction: Direction,
    pub start: Instant,
    pub duration: Duration,
    pub interval: Duration,
    pub counter: Arc<ByteCounter>,
    pub sink: Arc<dyn ProgressSink>,
    pub cancel: CancellationToken,
}

impl Sampler {
    /// Run until the deadline or cancellation. A sink failure cancels the
    /// phase so its workers stop, and is returned to the caller.
    pub async fn run(self) -> SinkResult<()> {
        let mut ticker = time::interval_at(self.start + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_progress = 0.0f64;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                _ = ticker.tick() => {}
            }

            let elapsed = self.start.elapsed();
            if elapsed >= self.duration {
                return Ok(());
            }

            let progress = (elapsed.as_secs_f64() / self.duration.as_secs_f64())
                .min(1.0)
                .max(last_progress);
            last_progress = progress;

            let rate = average_mbps(self.counter.get(), elapsed);
            tracing::debug!(
                direction = %self.direction,
                progress,
                mbps = rate,
                "Phase sample"
            );

            let update = ProgressUpdate::new(
                self.direction.stage(),
                progress,
                rate,
                format!("{rate:.1} Mbps"),
            );

            let sent = tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                sent = self.sink.emit(update) => sent,
            };

            if let Err(e) = sent {
                tracing::warn!(direction = %self.direction, error = %e, "Progress sink failed, cancelling phase");
                self.cancel.cancel();
                return Err(e);
            }
        }
    }
}

use crate::transfer::channel::ChunkChannel;
use crate::transfer::types::{ByteCounter, Direction};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

/// Summary of one worker's run
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerReport {
    pub worker_id: usize,
    pub chunks: u64,
    pub error: Option<String>,
}

impl WorkerReport {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// One unit of a phase's worker pool.
///
/// Everything it shares with its siblings is passed in explicitly: the
/// channel, the byte counter, the deadline and the cancellation token.
pub struct TransferWorker {
    pub id: usize,
    pub direction: Direction,
    pub chunk_size: usize,
    pub pacing: Duration,
    pub deadline: Instant,
    pub channel: Arc<dyn ChunkChannel>,
    pub counter: Arc<ByteCounter>,
    pub cancel: CancellationToken,
}

impl TransferWorker {
    pub async fn run(self) -> WorkerReport {
        let mut buf = vec![0u8; self.chunk_size];
        let mut chunks = 0u64;

        loop {
            if self.cancel.is_cancelled() || Instant::now() >= self.deadline {
                break;
            }

            // Only whole chunks are counted; a cancelled transfer adds nothing.
            let result = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = self.channel.transfer(self.id, self.direction, &mut buf) => result,
            };

            if let Err(e) = result {
                tracing::warn!(
                    worker = self.id,
                    direction = %self.direction,
                    chunks,
                    error = %e,
                    "Transfer worker failed"
                );
                return WorkerReport {
                    worker_id: self.id,
                    chunks,
                    error: Some(e.to_string()),
                };
            }

            self.counter.add(self.chunk_size as u64);
            chunks += 1;

            if self.pacing.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    _ = time::sleep(self.pacing) => {}
                }
            }
        }

        WorkerReport {
            worker_id: self.id,
            chunks,
            error: None,
        }
    }
}

use crate::transfer::types::Direction;
use async_trait::async_trait;
use std::collections::HashSet;
use std::io;

/// Moves one chunk for a worker: fills `buf` on download, drains it on upload.
#[async_trait]
pub trait ChunkChannel: Send + Sync {
    async fn transfer(&self, worker: usize, direction: Direction, buf: &mut [u8]) -> io::Result<()>;
}

/// Deterministic in-process channel.
///
/// Throughput is bounded only by worker pacing, which keeps phase results
/// reproducible. Selected workers can be made to fail to exercise degraded
/// phases.
#[derive(Debug, Clone, Default)]
pub struct SimulatedChannel {
    failing_workers: HashSet<usize>,
}

impl SimulatedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Workers whose every transfer fails as if the peer disconnected
    pub fn with_failing_workers(mut self, workers: impl IntoIterator<Item = usize>) -> Self {
        self.failing_workers.extend(workers);
        self
    }
}

#[async_trait]
impl ChunkChannel for SimulatedChannel {
    async fn transfer(&self, worker: usize, direction: Direction, buf: &mut [u8]) -> io::Result<()> {
        if self.failing_workers.contains(&worker) {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                format!("simulated peer reset on worker {worker}"),
            ));
        }

        match direction {
            Direction::Download => buf.fill(worker as u8),
            Direction::Upload => {
                std::hint::black_box(buf.first());
            }
        }
        Ok(())
    }
}

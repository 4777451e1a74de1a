use crate::config::{ConfigError, ConfigResult};
use crate::progress::Stage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Upper bound on workers per phase
pub const MAX_WORKERS: usize = 16;
/// Smallest chunk a worker may move per iteration (64 KiB)
pub const MIN_CHUNK_SIZE: usize = 64 * 1024;
/// Largest chunk a worker may move per iteration (10 MiB)
pub const MAX_CHUNK_SIZE: usize = 10 * 1024 * 1024;
/// Longest a single transfer phase may run
pub const MAX_PHASE_DURATION: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Download,
    Upload,
}

impl Direction {
    pub fn stage(&self) -> Stage {
        match self {
            Direction::Download => Stage::Download,
            Direction::Upload => Stage::Upload,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Download => f.write_str("download"),
            Direction::Upload => f.write_str("upload"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseParams {
    pub duration: Duration,
    pub worker_count: usize,
    pub chunk_size: usize,
    /// Delay after each chunk; zero runs workers unthrottled
    pub pacing: Duration,
    pub sample_interval: Duration,
}

impl PhaseParams {
    /// Reject out-of-range values rather than clamping them
    pub fn validate(&self) -> ConfigResult<()> {
        if self.duration.is_zero() || self.duration > MAX_PHASE_DURATION {
            return Err(ConfigError::Invalid(format!(
                "phase duration {:?} outside (0, {MAX_PHASE_DURATION:?}]",
                self.duration
            )));
        }
        if self.worker_count < 1 || self.worker_count > MAX_WORKERS {
            return Err(ConfigError::Invalid(format!(
                "worker count {} outside 1..={MAX_WORKERS}",
                self.worker_count
            )));
        }
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&self.chunk_size) {
            return Err(ConfigError::Invalid(format!(
                "chunk size {} outside {MIN_CHUNK_SIZE}..={MAX_CHUNK_SIZE} bytes",
                self.chunk_size
            )));
        }
        if self.sample_interval.is_zero() || self.sample_interval > self.duration {
            return Err(ConfigError::Invalid(format!(
                "sample interval {:?} outside (0, phase duration]",
                self.sample_interval
            )));
        }
        Ok(())
    }
}

impl Default for PhaseParams {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(10),
            worker_count: 4,
            chunk_size: 1024 * 1024,
            pacing: Duration::from_millis(10),
            sample_interval: Duration::from_millis(200),
        }
    }
}

/// Byte total shared by the workers of the active phase
#[derive(Debug, Default)]
pub struct ByteCounter {
    bytes: AtomicU64,
}

impl ByteCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, bytes: u64) {
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    /// Only called between phases, once every worker has been joined
    pub(crate) fn reset(&self) {
        self.bytes.store(0, Ordering::Relaxed);
    }
}

/// Cumulative average in megabits per second
pub fn average_mbps(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    (bytes as f64 * 8.0) / secs / 1_000_000.0
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhaseOutcome {
    pub direction: Direction,
    pub total_bytes: u64,
    pub elapsed: Duration,
    pub average_mbps: f64,
    pub workers: usize,
    pub failed_workers: usize,
}

impl PhaseOutcome {
    pub fn all_workers_failed(&self) -> bool {
        self.workers > 0 && self.failed_workers == self.workers
    }
}

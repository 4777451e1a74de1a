//! Timed multi-worker transfer phases
//!
//! A phase runs a fixed pool of cancellable workers against a
//! [`ChunkChannel`] until its wall-clock deadline, while a sampler reports
//! cumulative-average throughput to a progress sink.

mod channel;
mod error;
mod phase;
mod sampler;
mod types;
mod worker;

pub use channel::{ChunkChannel, SimulatedChannel};
pub use error::{TransferError, TransferResult};
pub use phase::run_phase;
pub use sampler::Sampler;
pub use types::{
    average_mbps, ByteCounter, Direction, PhaseOutcome, PhaseParams, MAX_CHUNK_SIZE,
    MAX_PHASE_DURATION, MAX_WORKERS, MIN_CHUNK_SIZE,
};
pub use worker::{TransferWorker, WorkerReport};

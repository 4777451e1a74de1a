//! Round-trip latency probing
//!
//! Sequential samples over a [`RoundTrip`] transport, reduced to mean
//! latency, jitter (population standard deviation) and loss percentage.

mod error;
mod prober;
mod types;

pub use error::{ProbeError, ProbeResult};
pub use prober::{LatencyProber, LoopbackRoundTrip, RoundTrip};
pub use types::{LatencyStats, ProbeSettings};

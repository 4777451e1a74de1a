//! speedcore: a self-hosted network speed test engine
//!
//! A test is one session run by the [`orchestrator`]: a latency probe, then a
//! timed download phase and a timed upload phase, each driven by a pool of
//! [`transfer`] workers while a sampler streams [`progress`] events to the
//! client. [`admission`] bounds how many sessions one client may run and how
//! often. Finished results land in a [`store`] and may be shared by code.

pub mod admission;
pub mod api;
pub mod config;
pub mod latency;
pub mod metrics;
pub mod orchestrator;
pub mod progress;
pub mod store;
pub mod transfer;

pub use admission::{AdmissionController, AdmissionGuard, AdmissionRejected};
pub use config::{ConfigError, SpeedcoreConfig};
pub use orchestrator::{CompletedTest, OrchestratorError, TestOrchestrator, TestRequest, TestResult};
pub use progress::{ProgressSink, ProgressUpdate, Stage};

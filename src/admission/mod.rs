//! Per-client admission control
//!
//! Bounds how many tests a single client may run at once and how closely
//! spaced their starts may be. Admission hands out an [`AdmissionGuard`]; the
//! client's slot is released when the guard drops, on every exit path.

mod controller;
mod error;
mod types;

pub use controller::{AdmissionController, AdmissionGuard};
pub use error::{AdmissionRejected, AdmissionResult};
pub use types::{AdmissionLimits, ClientSlot};

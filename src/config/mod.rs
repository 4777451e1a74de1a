//! Server and test configuration
//!
//! Settings are loaded from an optional TOML file and merged over defaults.
//! Every numeric bound is checked by [`SpeedcoreConfig::validate`] before the
//! server accepts its first test.

mod error;
mod types;

pub use error::{ConfigError, ConfigResult};
pub use types::{AdmissionConfig, MetricsSettings, ServerConfig, SpeedcoreConfig, TestConfig};

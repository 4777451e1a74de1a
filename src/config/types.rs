use crate::admission::AdmissionLimits;
use crate::config::error::{ConfigError, ConfigResult};
use crate::latency::ProbeSettings;
use crate::transfer::{PhaseParams, MAX_WORKERS};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "SPEEDCORE_CONFIG";

/// Environment variable overriding `server.listen_addr`
pub const LISTEN_ADDR_ENV: &str = "SPEEDCORE_LISTEN";

const DEFAULT_CONFIG_PATH: &str = "speedcore.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpeedcoreConfig {
    pub server: ServerConfig,
    pub test: TestConfig,
    pub admission: AdmissionConfig,
    pub metrics: MetricsSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// sqlx connection string for the result store
    pub database_url: String,
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            database_url: "sqlite://speedcore.db?mode=rwc".to_string(),
            cors_origin: "*".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TestConfig {
    /// Wall-clock length of each transfer phase
    pub duration_secs: u64,
    pub worker_count: usize,
    pub chunk_size: usize,
    pub latency_samples: u32,
    pub probe_timeout_ms: u64,
    pub probe_spacing_ms: u64,
    pub sample_interval_ms: u64,
    /// Per-iteration worker delay; 0 lets workers run unthrottled
    pub pacing_delay_ms: u64,
    /// Bounded wait for a single progress event to be accepted by the sink
    pub emit_timeout_ms: u64,
    /// Hard cap on a whole session, independent of phase durations
    pub session_timeout_secs: u64,
    pub share_by_default: bool,
}

impl Default for TestConfig {
    fn default() -> Self {
        let worker_count = default_worker_count(num_cpus::get());
        Self {
            duration_secs: 10,
            worker_count,
            chunk_size: default_chunk_size(worker_count),
            latency_samples: 10,
            probe_timeout_ms: 1000,
            probe_spacing_ms: 50,
            sample_interval_ms: 200,
            pacing_delay_ms: 10,
            emit_timeout_ms: 2000,
            session_timeout_secs: 60,
            share_by_default: true,
        }
    }
}

/// Worker count derived from the CPU count, floored at 4 and capped at [`MAX_WORKERS`].
fn default_worker_count(cpus: usize) -> usize {
    cpus.clamp(4, MAX_WORKERS)
}

/// Called once a loaded config is known to run on the derived worker count
fn warn_if_worker_count_clamped() {
    let cpus = num_cpus::get();
    let workers = default_worker_count(cpus);
    if workers != cpus {
        tracing::warn!(cpus, workers, "Clamped default worker count");
    }
}

fn sets_worker_count(table: &toml::Table) -> bool {
    table
        .get("test")
        .and_then(|test| test.get("worker_count"))
        .is_some()
}

/// Fewer workers move larger chunks, many workers move smaller ones.
fn default_chunk_size(worker_count: usize) -> usize {
    if worker_count <= 4 {
        2 * 1024 * 1024
    } else if worker_count >= 12 {
        512 * 1024
    } else {
        1024 * 1024
    }
}

impl TestConfig {
    pub fn phase_params(&self) -> PhaseParams {
        PhaseParams {
            duration: Duration::from_secs(self.duration_secs),
            worker_count: self.worker_count,
            chunk_size: self.chunk_size,
            pacing: Duration::from_millis(self.pacing_delay_ms),
            sample_interval: Duration::from_millis(self.sample_interval_ms),
        }
    }

    pub fn probe_settings(&self) -> ProbeSettings {
        ProbeSettings {
            sample_count: self.latency_samples,
            timeout: Duration::from_millis(self.probe_timeout_ms),
            spacing: Duration::from_millis(self.probe_spacing_ms),
        }
    }

    pub fn emit_timeout(&self) -> Duration {
        Duration::from_millis(self.emit_timeout_ms)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    fn validate(&self) -> ConfigResult<()> {
        self.phase_params().validate()?;
        if self.latency_samples < 1 {
            return Err(ConfigError::Invalid(
                "test.latency_samples must be >= 1".into(),
            ));
        }
        if self.probe_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "test.probe_timeout_ms must be > 0".into(),
            ));
        }
        if self.emit_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "test.emit_timeout_ms must be > 0".into(),
            ));
        }
        if self.session_timeout_secs < 10 {
            return Err(ConfigError::Invalid(
                "test.session_timeout_secs must be >= 10".into(),
            ));
        }
        if self.session_timeout_secs <= 2 * self.duration_secs {
            return Err(ConfigError::Invalid(format!(
                "test.session_timeout_secs ({}) must exceed both transfer phases ({}s)",
                self.session_timeout_secs,
                2 * self.duration_secs
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AdmissionConfig {
    pub max_concurrent_per_client: u32,
    pub min_interval_secs: u64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            max_concurrent_per_client: 3,
            min_interval_secs: 5,
        }
    }
}

impl AdmissionConfig {
    pub fn limits(&self) -> ConfigResult<AdmissionLimits> {
        AdmissionLimits::new(
            self.max_concurrent_per_client,
            Duration::from_secs(self.min_interval_secs),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsSettings {
    pub enabled: bool,
    pub listen_addr: SocketAddr,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 9090)),
        }
    }
}

impl SpeedcoreConfig {
    /// Load configuration from a TOML file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            warn_if_worker_count_clamped();
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> ConfigResult<Self> {
        let table: toml::Table = raw.parse()?;
        if !sets_worker_count(&table) {
            warn_if_worker_count_clamped();
        }
        Ok(table.try_into()?)
    }

    /// Load from `SPEEDCORE_CONFIG` (or `speedcore.toml`) and apply the
    /// `SPEEDCORE_LISTEN` override, then validate.
    pub fn from_env() -> ConfigResult<Self> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::load(&path)?;

        if let Ok(addr) = std::env::var(LISTEN_ADDR_ENV) {
            config.server.listen_addr = addr.parse().map_err(|e| {
                ConfigError::Invalid(format!("{LISTEN_ADDR_ENV}={addr} is not an address: {e}"))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.test.validate()?;
        self.admission.limits()?;
        Ok(())
    }
}

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSettings {
    pub sample_count: u32,
    /// Per-sample deadline; a sample with no reply by then is lost
    pub timeout: Duration,
    /// Gap between consecutive samples
    pub spacing: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            sample_count: 10,
            timeout: Duration::from_secs(1),
            spacing: Duration::from_millis(50),
        }
    }
}

/// Reduced latency measurement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub mean_ms: f64,
    pub jitter_ms: f64,
    pub loss_pct: f64,
    pub samples: u32,
    pub successes: u32,
}

impl LatencyStats {
    /// Reduce raw samples, `None` marking a lost sample.
    ///
    /// Mean and jitter cover successful samples only. Jitter is the
    /// population standard deviation. With no successes the result is
    /// `(0, 0, 100)`.
    pub fn from_samples(samples: &[Option<f64>]) -> Self {
        let total = samples.len() as u32;
        let ok: Vec<f64> = samples.iter().flatten().copied().collect();
        let successes = ok.len() as u32;

        if ok.is_empty() {
            return Self {
                mean_ms: 0.0,
                jitter_ms: 0.0,
                loss_pct: 100.0,
                samples: total,
                successes: 0,
            };
        }

        let n = ok.len() as f64;
        let mean = ok.iter().sum::<f64>() / n;
        let variance = ok.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let loss_pct = f64::from(total - successes) / f64::from(total) * 100.0;

        Self {
            mean_ms: mean,
            jitter_ms: variance.sqrt(),
            loss_pct,
            samples: total,
            successes,
        }
    }

    /// True when every sample timed out
    pub fn is_total_loss(&self) -> bool {
        self.successes == 0
    }
}

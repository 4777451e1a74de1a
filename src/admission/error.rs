use std::time::Duration;
use thiserror::Error;

/// Reasons a test initiation is refused before any session work begins
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdmissionRejected {
    #[error("Too many concurrent tests ({active} active, limit {limit})")]
    TooManyConcurrent {
        active: u32,
        limit: u32,
        retry_after: Duration,
    },

    #[error("Test interval too short, retry in {retry_after:?}")]
    IntervalTooShort { retry_after: Duration },
}

impl AdmissionRejected {
    /// Suggested delay before the client tries again
    pub fn retry_after(&self) -> Duration {
        match self {
            AdmissionRejected::TooManyConcurrent { retry_after, .. }
            | AdmissionRejected::IntervalTooShort { retry_after } => *retry_after,
        }
    }

    /// Whole seconds for a `Retry-After` header, never zero
    pub fn retry_after_secs(&self) -> u64 {
        let retry = self.retry_after();
        let secs = retry.as_secs() + u64::from(retry.subsec_nanos() > 0);
        secs.max(1)
    }

    /// Short label used for metrics and error codes
    pub fn reason(&self) -> &'static str {
        match self {
            AdmissionRejected::TooManyConcurrent { .. } => "too_many_concurrent",
            AdmissionRejected::IntervalTooShort { .. } => "interval_too_short",
        }
    }
}

pub type AdmissionResult<T> = Result<T, AdmissionRejected>;

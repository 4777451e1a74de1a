use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("Progress receiver closed")]
    Closed,

    #[error("Progress receiver stalled for {0:?}")]
    Timeout(Duration),
}

pub type SinkResult<T> = Result<T, SinkError>;

use crate::config::ConfigError;
use crate::progress::SinkError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Invalid phase parameters: {0}")]
    InvalidParams(#[from] ConfigError),

    #[error("Progress sink failed: {0}")]
    Sink(#[from] SinkError),

    #[error("Transfer phase cancelled")]
    Cancelled,
}

pub type TransferResult<T> = Result<T, TransferError>;

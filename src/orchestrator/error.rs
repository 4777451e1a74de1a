use crate::config::ConfigError;
use crate::progress::Stage;
use crate::store::StoreError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("{phase} phase failed: {reason}")]
    TransferFailure { phase: Stage, reason: String },

    #[error("Client disconnected during {phase} phase")]
    ClientDisconnected { phase: Stage },

    #[error("Session exceeded {limit:?} during {phase} phase")]
    SessionTimeout { phase: Stage, limit: Duration },

    #[error("Session cancelled during {phase} phase")]
    Cancelled { phase: Stage },

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Result store error: {0}")]
    Store(#[from] StoreError),
}

impl OrchestratorError {
    /// Short label used for metrics and error codes
    pub fn reason(&self) -> &'static str {
        match self {
            OrchestratorError::Configuration(_) => "configuration",
            OrchestratorError::TransferFailure { .. } => "transfer_failure",
            OrchestratorError::ClientDisconnected { .. } => "client_disconnected",
            OrchestratorError::SessionTimeout { .. } => "session_timeout",
            OrchestratorError::Cancelled { .. } => "cancelled",
            OrchestratorError::InvalidStateTransition(_) => "invalid_state",
            OrchestratorError::Store(_) => "store",
        }
    }
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

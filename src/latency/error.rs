use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Latency probe cancelled after {completed} samples")]
    Cancelled { completed: u32 },

    #[error("Invalid probe settings: {0}")]
    InvalidSettings(String),
}

pub type ProbeResult<T> = Result<T, ProbeError>;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Result not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Could not allocate a unique share code after {0} attempts")]
    ShareCodeExhausted(u32),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::DatabaseError(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

use crate::admission::AdmissionRejected;
use crate::api::types::ErrorResponse;
use crate::orchestrator::OrchestratorError;
use crate::store::StoreError;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Admission(#[from] AdmissionRejected),

    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Share card rendering failed: {0}")]
    Render(#[from] image::ImageError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Admission(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Orchestrator(e) => match e {
                OrchestratorError::Configuration(_) => StatusCode::BAD_REQUEST,
                OrchestratorError::SessionTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                OrchestratorError::Cancelled { .. } => StatusCode::SERVICE_UNAVAILABLE,
                OrchestratorError::ClientDisconnected { .. } => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Store(StoreError::NotFound(_)) | ApiError::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            ApiError::Store(_) | ApiError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Admission(AdmissionRejected::TooManyConcurrent { .. }) => {
                "TOO_MANY_CONCURRENT"
            }
            ApiError::Admission(AdmissionRejected::IntervalTooShort { .. }) => {
                "INTERVAL_TOO_SHORT"
            }
            ApiError::Orchestrator(e) => match e {
                OrchestratorError::Configuration(_) => "INVALID_CONFIGURATION",
                OrchestratorError::TransferFailure { .. } => "TRANSFER_FAILED",
                OrchestratorError::ClientDisconnected { .. } => "CLIENT_DISCONNECTED",
                OrchestratorError::SessionTimeout { .. } => "SESSION_TIMEOUT",
                OrchestratorError::Cancelled { .. } => "CANCELLED",
                OrchestratorError::InvalidStateTransition(_) => "INTERNAL_ERROR",
                OrchestratorError::Store(_) => "STORE_ERROR",
            },
            ApiError::Store(StoreError::NotFound(_)) | ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Store(_) => "STORE_ERROR",
            ApiError::InvalidRequest(_) => "INVALID_REQUEST",
            ApiError::Render(_) => "RENDER_FAILED",
        }
    }

    pub fn body(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.to_string(),
            code: self.code().to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status(), Json(self.body())).into_response();

        if let ApiError::Admission(rejected) = &self {
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from(rejected.retry_after_secs()),
            );
        }
        response
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

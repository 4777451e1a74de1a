use crate::orchestrator::SessionInfo;
use serde::{Deserialize, Serialize};

/// Default payload of `GET /speedtest/download`
pub const DEFAULT_DOWNLOAD_SIZE: usize = 10 * 1024 * 1024;
pub const MAX_DOWNLOAD_SIZE: usize = 100 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartTestResponse {
    pub test_id: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DownloadQuery {
    pub size: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub bytes: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestStreamQuery {
    /// Any value but `false` asks for a share code; absent falls back to the
    /// server default
    pub share: Option<String>,
}

impl TestStreamQuery {
    pub fn wants_share(&self, default: bool) -> bool {
        match self.share.as_deref() {
            Some(value) => value != "false",
            None => default,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveTestsResponse {
    pub tests: Vec<SessionInfo>,
    pub count: usize,
}

/// Error body, shared by HTTP responses and the WebSocket error frame
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

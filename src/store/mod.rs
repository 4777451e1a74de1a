//! Hand-off point for finished results
//!
//! The engine only ever saves one record per completed session and, when
//! asked, issues a share code for it. Lookups exist for the HTTP surface.

mod error;
mod memory;
mod share;
mod sqlite;
mod types;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryResultStore;
pub use share::{generate_result_id, generate_share_code, hash_client_ip, SHARE_CODE_LEN};
pub use sqlite::SqliteResultStore;
pub use types::{ResultMeta, StoredResult};

use crate::orchestrator::TestResult;
use async_trait::async_trait;

#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Persist a finished result and return its id
    async fn save_result(&self, result: TestResult, meta: &ResultMeta) -> StoreResult<String>;

    /// Attach a fresh share code to a stored result
    async fn issue_share_code(&self, result_id: &str) -> StoreResult<String>;

    async fn increment_share_views(&self, code: &str) -> StoreResult<()>;

    async fn get_result(&self, result_id: &str) -> StoreResult<Option<StoredResult>>;

    async fn get_by_share_code(&self, code: &str) -> StoreResult<Option<StoredResult>>;
}

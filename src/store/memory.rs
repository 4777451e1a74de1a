use crate::orchestrator::TestResult;
use crate::store::error::{StoreError, StoreResult};
use crate::store::share::{generate_result_id, generate_share_code, SHARE_CODE_ATTEMPTS};
use crate::store::types::{ResultMeta, StoredResult};
use crate::store::ResultStore;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// Process-local result store, used by tests and as the server default
#[derive(Clone, Default)]
pub struct MemoryResultStore {
    results: Arc<DashMap<String, StoredResult>>,
    share_codes: Arc<DashMap<String, String>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn save_result(&self, result: TestResult, meta: &ResultMeta) -> StoreResult<String> {
        let id = generate_result_id();
        self.results
            .insert(id.clone(), StoredResult::new(id.clone(), result, meta));
        Ok(id)
    }

    async fn issue_share_code(&self, result_id: &str) -> StoreResult<String> {
        if !self.results.contains_key(result_id) {
            return Err(StoreError::NotFound(result_id.to_string()));
        }

        for _ in 0..SHARE_CODE_ATTEMPTS {
            let code = generate_share_code();
            if let Entry::Vacant(slot) = self.share_codes.entry(code.clone()) {
                slot.insert(result_id.to_string());
                if let Some(mut stored) = self.results.get_mut(result_id) {
                    stored.share_code = Some(code.clone());
                }
                return Ok(code);
            }
        }
        Err(StoreError::ShareCodeExhausted(SHARE_CODE_ATTEMPTS))
    }

    async fn increment_share_views(&self, code: &str) -> StoreResult<()> {
        let id = self
            .share_codes
            .get(code)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::NotFound(code.to_string()))?;

        match self.results.get_mut(&id) {
            Some(mut stored) => {
                stored.share_views += 1;
                Ok(())
            }
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn get_result(&self, result_id: &str) -> StoreResult<Option<StoredResult>> {
        Ok(self.results.get(result_id).map(|r| r.value().clone()))
    }

    async fn get_by_share_code(&self, code: &str) -> StoreResult<Option<StoredResult>> {
        let id = match self.share_codes.get(code) {
            Some(entry) => entry.value().clone(),
            None => return Ok(None),
        };
        self.get_result(&id).await
    }
}

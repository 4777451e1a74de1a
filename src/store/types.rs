use crate::orchestrator::TestResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request context stored alongside a result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultMeta {
    pub client_ip_hash: String,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResult {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub result: TestResult,
    #[serde(skip)]
    pub client_ip_hash: String,
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_code: Option<String>,
    pub share_views: u64,
}

impl StoredResult {
    pub fn new(id: String, result: TestResult, meta: &ResultMeta) -> Self {
        Self {
            id,
            timestamp: Utc::now(),
            result,
            client_ip_hash: meta.client_ip_hash.clone(),
            user_agent: meta.user_agent.clone(),
            share_code: None,
            share_views: 0,
        }
    }
}

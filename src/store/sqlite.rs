use crate::orchestrator::TestResult;
use crate::store::error::{StoreError, StoreResult};
use crate::store::share::{generate_result_id, generate_share_code, SHARE_CODE_ATTEMPTS};
use crate::store::types::{ResultMeta, StoredResult};
use crate::store::ResultStore;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::time::Duration;

pub struct SqliteResultStore {
    pool: SqlitePool,
}

impl SqliteResultStore {
    /// Open (or create) the result database and initialize its schema.
    ///
    /// An in-memory database lives only as long as one of its connections,
    /// so for those URLs the pool pins a connection that is never reaped.
    pub async fn new(db_url: &str) -> StoreResult<Self> {
        let pool = if is_in_memory(db_url) {
            SqlitePoolOptions::new()
                .min_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
                .connect(db_url)
                .await?
        } else {
            SqlitePool::connect(db_url).await?
        };

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS speed_tests (
                id TEXT PRIMARY KEY,
                timestamp INTEGER NOT NULL,
                download_mbps REAL NOT NULL,
                upload_mbps REAL NOT NULL,
                ping_ms REAL NOT NULL,
                jitter_ms REAL NOT NULL,
                packet_loss_pct REAL NOT NULL,
                client_ip_hash TEXT NOT NULL,
                user_agent TEXT,
                share_code TEXT UNIQUE,
                share_views INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_speed_tests_timestamp ON speed_tests(timestamp)")
            .execute(&pool)
            .await?;

        Ok(Self { pool })
    }

    /// In-memory database (for testing)
    pub async fn new_in_memory() -> StoreResult<Self> {
        Self::new("sqlite::memory:").await
    }

    fn from_row(row: &SqliteRow) -> StoreResult<StoredResult> {
        let ts: i64 = row.try_get("timestamp")?;
        let timestamp = Utc
            .timestamp_millis_opt(ts)
            .single()
            .ok_or_else(|| StoreError::DatabaseError(format!("invalid timestamp {ts}")))?;
        let views: i64 = row.try_get("share_views")?;

        Ok(StoredResult {
            id: row.try_get("id")?,
            timestamp,
            result: TestResult {
                download_mbps: row.try_get("download_mbps")?,
                upload_mbps: row.try_get("upload_mbps")?,
                ping_ms: row.try_get("ping_ms")?,
                jitter_ms: row.try_get("jitter_ms")?,
                packet_loss_pct: row.try_get("packet_loss_pct")?,
            },
            client_ip_hash: row.try_get("client_ip_hash")?,
            user_agent: row.try_get("user_agent")?,
            share_code: row.try_get("share_code")?,
            share_views: views.max(0) as u64,
        })
    }
}

fn is_in_memory(db_url: &str) -> bool {
    db_url.contains(":memory:") || db_url.contains("mode=memory")
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl ResultStore for SqliteResultStore {
    async fn save_result(&self, result: TestResult, meta: &ResultMeta) -> StoreResult<String> {
        let id = generate_result_id();

        sqlx::query(
            r#"
            INSERT INTO speed_tests
            (id, timestamp, download_mbps, upload_mbps, ping_ms, jitter_ms, packet_loss_pct, client_ip_hash, user_agent)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(Utc::now().timestamp_millis())
        .bind(result.download_mbps)
        .bind(result.upload_mbps)
        .bind(result.ping_ms)
        .bind(result.jitter_ms)
        .bind(result.packet_loss_pct)
        .bind(&meta.client_ip_hash)
        .bind(&meta.user_agent)
        .execute(&self.pool)
        .await?;

        tracing::debug!(result_id = %id, "Stored speed test result");
        Ok(id)
    }

    async fn issue_share_code(&self, result_id: &str) -> StoreResult<String> {
        for _ in 0..SHARE_CODE_ATTEMPTS {
            let code = generate_share_code();
            let updated = sqlx::query("UPDATE speed_tests SET share_code = ? WHERE id = ?")
                .bind(&code)
                .bind(result_id)
                .execute(&self.pool)
                .await;

            match updated {
                Ok(done) if done.rows_affected() == 0 => {
                    return Err(StoreError::NotFound(result_id.to_string()));
                }
                Ok(_) => return Ok(code),
                Err(e) if is_unique_violation(&e) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(StoreError::ShareCodeExhausted(SHARE_CODE_ATTEMPTS))
    }

    async fn increment_share_views(&self, code: &str) -> StoreResult<()> {
        let done = sqlx::query("UPDATE speed_tests SET share_views = share_views + 1 WHERE share_code = ?")
            .bind(code)
            .execute(&self.pool)
            .await?;

        if done.rows_affected() == 0 {
            return Err(StoreError::NotFound(code.to_string()));
        }
        Ok(())
    }

    async fn get_result(&self, result_id: &str) -> StoreResult<Option<StoredResult>> {
        let row = sqlx::query("SELECT * FROM speed_tests WHERE id = ?")
            .bind(result_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::from_row).transpose()
    }

    async fn get_by_share_code(&self, code: &str) -> StoreResult<Option<StoredResult>> {
        let row = sqlx::query("SELECT * FROM speed_tests WHERE share_code = ?")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::from_row).transpose()
    }
}

use crate::orchestrator::error::OrchestratorResult;
use crate::orchestrator::state_machine::SessionStateMachine;
use crate::progress::Stage;
use crate::store::ResultMeta;
use crate::transfer::{ByteCounter, PhaseParams};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum SessionPhase {
    Pending,
    Latency,
    Download,
    Upload,
    Complete,
    Failed { reason: String },
}

impl SessionPhase {
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SessionPhase::Latency | SessionPhase::Download | SessionPhase::Upload
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::Complete | SessionPhase::Failed { .. })
    }

    /// Client-visible stage for this phase, if it has one
    pub fn stage(&self) -> Option<Stage> {
        match self {
            SessionPhase::Latency => Some(Stage::Latency),
            SessionPhase::Download => Some(Stage::Download),
            SessionPhase::Upload => Some(Stage::Upload),
            SessionPhase::Complete => Some(Stage::Complete),
            SessionPhase::Pending | SessionPhase::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    Start,
    LatencyMeasured,
    DownloadFinished,
    UploadFinished,
    Fail { reason: String },
}

/// Final measurement of a completed session. Never mutated once built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub download_mbps: f64,
    pub upload_mbps: f64,
    pub ping_ms: f64,
    pub jitter_ms: f64,
    pub packet_loss_pct: f64,
}

/// Everything a caller supplies to start a session
#[derive(Debug, Clone)]
pub struct TestRequest {
    pub params: PhaseParams,
    /// Issue a share code for the stored result
    pub share: bool,
    pub meta: ResultMeta,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletedTest {
    pub session_id: Uuid,
    pub result_id: String,
    pub share_code: Option<String>,
    pub result: TestResult,
}

/// State of one running test, owned by the orchestrator for its lifetime
pub struct TestSession {
    pub id: Uuid,
    pub started_at: Instant,
    pub created_at: DateTime<Utc>,
    phase_deadline: RwLock<Option<Instant>>,
    counter: Arc<ByteCounter>,
    machine: SessionStateMachine,
}

impl TestSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Instant::now(),
            created_at: Utc::now(),
            phase_deadline: RwLock::new(None),
            counter: Arc::new(ByteCounter::new()),
            machine: SessionStateMachine::new(),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.machine.current_state()
    }

    /// Stage to blame for a failure at this point of the session
    pub fn current_stage(&self) -> Stage {
        self.phase().stage().unwrap_or(Stage::Latency)
    }

    pub fn transition(&self, event: SessionEvent) -> OrchestratorResult<SessionPhase> {
        self.machine.transition(event)
    }

    pub fn counter(&self) -> Arc<ByteCounter> {
        self.counter.clone()
    }

    pub fn phase_deadline(&self) -> Option<Instant> {
        *self.phase_deadline.read()
    }

    pub(crate) fn set_phase_deadline(&self, deadline: Instant) {
        *self.phase_deadline.write() = Some(deadline);
    }

    pub fn info(&self) -> SessionInfo {
        let phase = self.phase();
        SessionInfo {
            session_id: self.id.to_string(),
            phase: phase.stage().map(|s| s.to_string()).unwrap_or_else(|| match phase {
                SessionPhase::Pending => "pending".to_string(),
                _ => "failed".to_string(),
            }),
            started_at: self.created_at,
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
            phase_bytes: self.counter.get(),
        }
    }
}

impl Default for TestSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of an active session for status listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub phase: String,
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: f64,
    pub phase_bytes: u64,
}

use crate::config::{ConfigError, TestConfig};
use crate::latency::{LatencyProber, LatencyStats, ProbeError, ProbeSettings, RoundTrip};
use crate::metrics;
use crate::orchestrator::error::{OrchestratorError, OrchestratorResult};
use crate::orchestrator::types::{
    CompletedTest, SessionEvent, SessionInfo, TestRequest, TestResult, TestSession,
};
use crate::progress::{ProgressSink, ProgressUpdate, Stage};
use crate::store::ResultStore;
use crate::transfer::{
    run_phase, ChunkChannel, Direction, PhaseOutcome, PhaseParams, TransferError,
};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrchestratorSettings {
    pub probe: ProbeSettings,
    /// Hard ceiling on a whole session, latency through result hand-off
    pub session_timeout: Duration,
}

impl OrchestratorSettings {
    pub fn from_config(config: &TestConfig) -> Self {
        Self {
            probe: config.probe_settings(),
            session_timeout: config.session_timeout(),
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from_config(&TestConfig::default())
    }
}

/// Sequences latency, download and upload for each session and hands the
/// finished result to the store.
///
/// Every session gets its own byte counter and cancellation token, so any
/// number of sessions can run side by side on one orchestrator.
#[derive(Clone)]
pub struct TestOrchestrator {
    channel: Arc<dyn ChunkChannel>,
    prober: Arc<LatencyProber>,
    store: Arc<dyn ResultStore>,
    session_timeout: Duration,
    active: Arc<DashMap<Uuid, Arc<TestSession>>>,
}

impl TestOrchestrator {
    pub fn new(
        channel: Arc<dyn ChunkChannel>,
        transport: Arc<dyn RoundTrip>,
        store: Arc<dyn ResultStore>,
        settings: OrchestratorSettings,
    ) -> OrchestratorResult<Self> {
        if settings.session_timeout.is_zero() {
            return Err(ConfigError::Invalid("session timeout must be > 0".into()).into());
        }
        let prober = LatencyProber::new(transport, settings.probe).map_err(|e| match e {
            ProbeError::InvalidSettings(msg) => ConfigError::Invalid(msg),
            other => ConfigError::Invalid(other.to_string()),
        })?;

        Ok(Self {
            channel,
            prober: Arc::new(prober),
            store,
            session_timeout: settings.session_timeout,
            active: Arc::new(DashMap::new()),
        })
    }

    /// Run one complete test.
    ///
    /// Parameters are validated before anything starts. Cancelling `cancel`
    /// stops the session at its next suspension point; it is reported as
    /// `ClientDisconnected` if the sink was closed first, `Cancelled`
    /// otherwise. A failed session stores nothing.
    pub async fn run(
        &self,
        request: TestRequest,
        sink: Arc<dyn ProgressSink>,
        cancel: CancellationToken,
    ) -> OrchestratorResult<CompletedTest> {
        request.params.validate()?;

        let session = Arc::new(TestSession::new());
        self.active.insert(session.id, session.clone());
        metrics::record_test_started();

        let session_token = cancel.child_token();
        let outcome = match time::timeout(
            self.session_timeout,
            self.run_session(&session, &request, sink.clone(), &session_token),
        )
        .await
        {
            // A cancellation whose receiver is already gone means the client left
            Ok(Err(OrchestratorError::Cancelled { phase })) if sink.is_closed() => {
                Err(OrchestratorError::ClientDisconnected { phase })
            }
            Ok(outcome) => outcome,
            Err(_) => {
                // Dropping the session future aborts its workers; the token
                // stops any sampler still in flight.
                session_token.cancel();
                Err(OrchestratorError::SessionTimeout {
                    phase: session.current_stage(),
                    limit: self.session_timeout,
                })
            }
        };

        self.active.remove(&session.id);

        match &outcome {
            Ok(done) => {
                metrics::record_test_completed(
                    session.started_at.elapsed(),
                    done.result.download_mbps,
                    done.result.upload_mbps,
                    done.result.ping_ms,
                );
            }
            Err(e) => {
                let _ = session.transition(SessionEvent::Fail {
                    reason: e.to_string(),
                });
                metrics::record_test_failed(e.reason());
                tracing::warn!(session_id = %session.id, error = %e, "Speed test failed");
            }
        }

        outcome
    }

    async fn run_session(
        &self,
        session: &TestSession,
        request: &TestRequest,
        sink: Arc<dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<CompletedTest> {
        session.transition(SessionEvent::Start)?;
        tracing::info!(session_id = %session.id, "Speed test started");

        let latency = self.measure_latency(sink.as_ref(), cancel).await?;
        session.transition(SessionEvent::LatencyMeasured)?;

        let download = self
            .transfer(session, Direction::Download, &request.params, sink.clone(), cancel)
            .await?;
        session.transition(SessionEvent::DownloadFinished)?;

        let upload = self
            .transfer(session, Direction::Upload, &request.params, sink.clone(), cancel)
            .await?;
        if cancel.is_cancelled() {
            return Err(OrchestratorError::Cancelled {
                phase: Stage::Upload,
            });
        }

        let result = TestResult {
            download_mbps: download.average_mbps,
            upload_mbps: upload.average_mbps,
            ping_ms: latency.mean_ms,
            jitter_ms: latency.jitter_ms,
            packet_loss_pct: latency.loss_pct,
        };

        let result_id = self.store.save_result(result, &request.meta).await?;
        let share_code = if request.share {
            match self.store.issue_share_code(&result_id).await {
                Ok(code) => Some(code),
                Err(e) => {
                    tracing::warn!(result_id = %result_id, error = %e, "Failed to issue share code");
                    None
                }
            }
        } else {
            None
        };
        session.transition(SessionEvent::UploadFinished)?;

        tracing::info!(
            session_id = %session.id,
            result_id = %result_id,
            download_mbps = result.download_mbps,
            upload_mbps = result.upload_mbps,
            ping_ms = result.ping_ms,
            "Speed test complete"
        );

        let message = match &share_code {
            Some(code) => format!("Test complete (result {result_id}, share {code})"),
            None => format!("Test complete (result {result_id})"),
        };
        // The result is already stored; a client that left just misses the summary.
        if let Err(e) = sink.emit(ProgressUpdate::complete(message)).await {
            tracing::warn!(session_id = %session.id, error = %e, "Could not deliver completion event");
        }

        Ok(CompletedTest {
            session_id: session.id,
            result_id,
            share_code,
            result,
        })
    }

    async fn measure_latency(
        &self,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<LatencyStats> {
        let disconnected = |_| OrchestratorError::ClientDisconnected {
            phase: Stage::Latency,
        };

        sink.emit(ProgressUpdate::new(
            Stage::Latency,
            0.0,
            0.0,
            "Measuring latency",
        ))
        .await
        .map_err(disconnected)?;

        let stats = self.prober.probe(cancel).await.map_err(|e| match e {
            ProbeError::Cancelled { .. } => OrchestratorError::Cancelled {
                phase: Stage::Latency,
            },
            ProbeError::InvalidSettings(msg) => ConfigError::Invalid(msg).into(),
        })?;

        sink.emit(ProgressUpdate::new(
            Stage::Latency,
            1.0,
            stats.mean_ms,
            format!(
                "Latency: {:.1} ms (jitter {:.1} ms, loss {:.0}%)",
                stats.mean_ms, stats.jitter_ms, stats.loss_pct
            ),
        ))
        .await
        .map_err(disconnected)?;

        Ok(stats)
    }

    async fn transfer(
        &self,
        session: &TestSession,
        direction: Direction,
        params: &PhaseParams,
        sink: Arc<dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<PhaseOutcome> {
        let phase = direction.stage();
        session.set_phase_deadline(Instant::now() + params.duration);

        let outcome = run_phase(
            direction,
            params,
            self.channel.clone(),
            session.counter(),
            sink,
            cancel,
        )
        .await
        .map_err(|e| match e {
            TransferError::InvalidParams(err) => OrchestratorError::Configuration(err),
            TransferError::Sink(err) => {
                tracing::info!(session_id = %session.id, %phase, error = %err, "Progress receiver gone");
                OrchestratorError::ClientDisconnected { phase }
            }
            TransferError::Cancelled => OrchestratorError::Cancelled { phase },
        })?;

        if outcome.all_workers_failed() {
            return Err(OrchestratorError::TransferFailure {
                phase,
                reason: format!("all {} workers failed", outcome.workers),
            });
        }
        Ok(outcome)
    }

    /// Snapshot of every running session
    pub fn list_active(&self) -> Vec<SessionInfo> {
        self.active.iter().map(|entry| entry.value().info()).collect()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

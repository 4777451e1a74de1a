use crate::progress::{ProgressSink, ProgressUpdate};
use crate::transfer::channel::ChunkChannel;
use crate::transfer::error::{TransferError, TransferResult};
use crate::transfer::sampler::Sampler;
use crate::transfer::types::{average_mbps, ByteCounter, Direction, PhaseOutcome, PhaseParams};
use crate::transfer::worker::{TransferWorker, WorkerReport};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Run one timed transfer phase and report its average throughput.
///
/// The counter is reset before any worker starts and every worker is joined
/// before this returns, so only this phase's workers ever write to it. The
/// sampler is stopped before the final update is emitted, keeping the
/// phase's events in order.
///
/// A failing worker retires on its own. If every worker fails the outcome
/// reports zero throughput and the caller decides the session's fate.
pub async fn run_phase(
    direction: Direction,
    params: &PhaseParams,
    channel: Arc<dyn ChunkChannel>,
    counter: Arc<ByteCounter>,
    sink: Arc<dyn ProgressSink>,
    cancel: &CancellationToken,
) -> TransferResult<PhaseOutcome> {
    params.validate()?;
    if cancel.is_cancelled() {
        return Err(TransferError::Cancelled);
    }

    counter.reset();
    let phase_token = cancel.child_token();
    let start = Instant::now();
    let deadline = start + params.duration;

    tracing::info!(
        %direction,
        workers = params.worker_count,
        chunk_size = params.chunk_size,
        duration_secs = params.duration.as_secs_f64(),
        "Starting transfer phase"
    );

    sink.emit(ProgressUpdate::new(
        direction.stage(),
        0.0,
        0.0,
        format!("Starting {direction} test"),
    ))
    .await?;

    let mut workers = JoinSet::new();
    for id in 0..params.worker_count {
        let worker = TransferWorker {
            id,
            direction,
            chunk_size: params.chunk_size,
            pacing: params.pacing,
            deadline,
            channel: channel.clone(),
            counter: counter.clone(),
            cancel: phase_token.clone(),
        };
        workers.spawn(worker.run());
    }

    let sampler = tokio::spawn(
        Sampler {
            direction,
            start,
            duration: params.duration,
            interval: params.sample_interval,
            counter: counter.clone(),
            sink: sink.clone(),
            cancel: phase_token.clone(),
        }
        .run(),
    );

    let mut reports = Vec::with_capacity(params.worker_count);
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok(report) => reports.push(report),
            Err(e) => {
                tracing::error!(%direction, error = %e, "Transfer worker panicked");
                reports.push(WorkerReport {
                    worker_id: usize::MAX,
                    chunks: 0,
                    error: Some(e.to_string()),
                });
            }
        }
    }
    let elapsed = start.elapsed();

    phase_token.cancel();
    match sampler.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(TransferError::Sink(e)),
        Err(e) => tracing::error!(%direction, error = %e, "Phase sampler panicked"),
    }

    if cancel.is_cancelled() {
        tracing::info!(%direction, "Transfer phase cancelled");
        return Err(TransferError::Cancelled);
    }

    let total_bytes = counter.get();
    let failed_workers = reports.iter().filter(|r| r.failed()).count();
    let all_failed = failed_workers == params.worker_count;
    let average = if all_failed {
        0.0
    } else {
        average_mbps(total_bytes, elapsed)
    };

    let outcome = PhaseOutcome {
        direction,
        total_bytes,
        elapsed,
        average_mbps: average,
        workers: params.worker_count,
        failed_workers,
    };

    if all_failed {
        tracing::warn!(%direction, workers = params.worker_count, "All transfer workers failed");
        return Ok(outcome);
    }
    if failed_workers > 0 {
        tracing::warn!(%direction, failed_workers, "Transfer phase degraded");
    }

    tracing::info!(
        %direction,
        mbps = outcome.average_mbps,
        bytes = total_bytes,
        elapsed_secs = elapsed.as_secs_f64(),
        "Transfer phase finished"
    );

    sink.emit(ProgressUpdate::new(
        direction.stage(),
        1.0,
        outcome.average_mbps,
        format!("{direction} test complete: {:.1} Mbps", outcome.average_mbps),
    ))
    .await?;

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{ChannelSink, Stage};
    use crate::transfer::channel::SimulatedChannel;
    use std::time::Duration;

    const MIB: usize = 1024 * 1024;

    fn params(workers: usize) -> PhaseParams {
        PhaseParams {
            duration: Duration::from_secs(10),
            worker_count: workers,
            chunk_size: MIB,
            pacing: Duration::from_millis(10),
            sample_interval: Duration::from_millis(200),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_phase_throughput_matches_counter() {
        let (sink, mut rx) = ChannelSink::channel(256, Duration::from_secs(1));
        let counter = Arc::new(ByteCounter::new());

        let outcome = run_phase(
            Direction::Download,
            &params(4),
            Arc::new(SimulatedChannel::new()),
            counter.clone(),
            Arc::new(sink),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        // 4 workers, one chunk per 10ms pacing step for 10s
        let chunks = outcome.total_bytes / MIB as u64;
        assert_eq!(outcome.total_bytes % MIB as u64, 0);
        assert!((4 * 999..=4 * 1001).contains(&chunks), "chunks = {chunks}");
        assert!(outcome.elapsed >= Duration::from_secs(10));
        assert!(outcome.elapsed < Duration::from_millis(10_050));
        let expected =
            (chunks * MIB as u64 * 8) as f64 / outcome.elapsed.as_secs_f64() / 1e6;
        assert!((outcome.average_mbps - expected).abs() < 1e-6);
        assert_eq!(outcome.failed_workers, 0);

        let mut updates = Vec::new();
        while let Ok(update) = rx.try_recv() {
            updates.push(update);
        }
        assert!(updates.iter().all(|u| u.stage == Stage::Download));
        assert!(updates.windows(2).all(|w| w[0].progress <= w[1].progress));
        assert_eq!(updates.first().unwrap().progress, 0.0);
        let last = updates.last().unwrap();
        assert_eq!(last.progress, 1.0);
        assert!((last.rate_or_latency - expected).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_counter_reset_between_phases() {
        let (sink, _rx) = ChannelSink::channel(1024, Duration::from_secs(1));
        let sink: Arc<dyn ProgressSink> = Arc::new(sink);
        let counter = Arc::new(ByteCounter::new());
        counter.add(123);

        let short = PhaseParams {
            duration: Duration::from_secs(1),
            ..params(2)
        };
        let outcome = run_phase(
            Direction::Upload,
            &short,
            Arc::new(SimulatedChannel::new()),
            counter,
            sink,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.total_bytes % MIB as u64, 0);
        assert!(outcome.total_bytes >= 2 * 99 * MIB as u64);
    }

    #[tokio::test(start_paused = true)]
    async fn test_phase_degrades_when_some_workers_fail() {
        let (sink, _rx) = ChannelSink::channel(256, Duration::from_secs(1));
        let outcome = run_phase(
            Direction::Upload,
            &params(4),
            Arc::new(SimulatedChannel::new().with_failing_workers([0, 1])),
            Arc::new(ByteCounter::new()),
            Arc::new(sink),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.failed_workers, 2);
        assert!(!outcome.all_workers_failed());
        assert!(outcome.total_bytes <= 2 * 1001 * MIB as u64);
        assert!(outcome.average_mbps > 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_phase_all_workers_failed() {
        let (sink, _rx) = ChannelSink::channel(256, Duration::from_secs(1));
        let outcome = run_phase(
            Direction::Download,
            &params(3),
            Arc::new(SimulatedChannel::new().with_failing_workers(0..3)),
            Arc::new(ByteCounter::new()),
            Arc::new(sink),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(outcome.all_workers_failed());
        assert_eq!(outcome.average_mbps, 0.0);
        assert!(outcome.elapsed < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_phase_rejects_invalid_params() {
        let (sink, _rx) = ChannelSink::channel(8, Duration::from_secs(1));
        let result = run_phase(
            Direction::Download,
            &params(17),
            Arc::new(SimulatedChannel::new()),
            Arc::new(ByteCounter::new()),
            Arc::new(sink),
            &CancellationToken::new(),
        )
        .await;
        assert!(matches!(result, Err(TransferError::InvalidParams(_))));

        let (sink, _rx) = ChannelSink::channel(8, Duration::from_secs(1));
        let unbounded = PhaseParams {
            duration: Duration::from_secs(u64::MAX),
            ..params(4)
        };
        let result = run_phase(
            Direction::Upload,
            &unbounded,
            Arc::new(SimulatedChannel::new()),
            Arc::new(ByteCounter::new()),
            Arc::new(sink),
            &CancellationToken::new(),
        )
        .await;
        assert!(matches!(result, Err(TransferError::InvalidParams(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_phase_cancelled_mid_run() {
        let (sink, _rx) = ChannelSink::channel(256, Duration::from_secs(1));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let result = run_phase(
            Direction::Download,
            &params(4),
            Arc::new(SimulatedChannel::new()),
            Arc::new(ByteCounter::new()),
            Arc::new(sink),
            &cancel,
        )
        .await;

        assert!(matches!(result, Err(TransferError::Cancelled)));
        assert!(start.elapsed() < Duration::from_millis(2200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_receiver_dropped_mid_phase() {
        let (sink, rx) = ChannelSink::channel(256, Duration::from_secs(1));
        let receiver = tokio::spawn(async move {
            let mut rx = rx;
            // take the start event and one sample, then hang up
            rx.recv().await;
            rx.recv().await;
        });

        let start = Instant::now();
        let result = run_phase(
            Direction::Download,
            &params(4),
            Arc::new(SimulatedChannel::new()),
            Arc::new(ByteCounter::new()),
            Arc::new(sink),
            &CancellationToken::new(),
        )
        .await;
        receiver.await.unwrap();

        assert!(matches!(result, Err(TransferError::Sink(_))));
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}

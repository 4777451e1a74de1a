use crate::progress::error::{SinkError, SinkResult};
use crate::progress::types::ProgressUpdate;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::SendTimeoutError};

/// Destination for a session's progress events.
///
/// `emit` must not block indefinitely: a receiver that stops consuming is
/// reported as an error once the sink's wait bound expires.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn emit(&self, update: ProgressUpdate) -> SinkResult<()>;

    /// True once the receiving side has gone away for good
    fn is_closed(&self) -> bool {
        false
    }
}

/// Bounded mpsc sink with a per-event send deadline
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<ProgressUpdate>,
    timeout: Duration,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<ProgressUpdate>, timeout: Duration) -> Self {
        Self { tx, timeout }
    }

    /// Create a sink and the receiver a transport adapter drains
    pub fn channel(capacity: usize, timeout: Duration) -> (Self, mpsc::Receiver<ProgressUpdate>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx, timeout), rx)
    }
}

#[async_trait]
impl ProgressSink for ChannelSink {
    async fn emit(&self, update: ProgressUpdate) -> SinkResult<()> {
        self.tx
            .send_timeout(update, self.timeout)
            .await
            .map_err(|e| match e {
                SendTimeoutError::Closed(_) => SinkError::Closed,
                SendTimeoutError::Timeout(_) => SinkError::Timeout(self.timeout),
            })
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

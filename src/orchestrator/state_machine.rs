use crate::orchestrator::error::{OrchestratorError, OrchestratorResult};
use crate::orchestrator::types::{SessionEvent, SessionPhase};
use parking_lot::RwLock;

/// Phase sequencing for one session:
/// `Pending -> Latency -> Download -> Upload -> Complete`, with `Failed`
/// reachable from every active phase.
pub struct SessionStateMachine {
    state: RwLock<SessionPhase>,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStateMachine {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(SessionPhase::Pending),
        }
    }

    /// Get current state
    pub fn current_state(&self) -> SessionPhase {
        self.state.read().clone()
    }

    /// Transition state based on event
    pub fn transition(&self, event: SessionEvent) -> OrchestratorResult<SessionPhase> {
        let mut state = self.state.write();

        let new_state = match (&*state, &event) {
            (SessionPhase::Pending, SessionEvent::Start) => SessionPhase::Latency,
            (SessionPhase::Latency, SessionEvent::LatencyMeasured) => SessionPhase::Download,
            (SessionPhase::Download, SessionEvent::DownloadFinished) => SessionPhase::Upload,
            (SessionPhase::Upload, SessionEvent::UploadFinished) => SessionPhase::Complete,

            (current, SessionEvent::Fail { reason }) if current.is_active() => {
                SessionPhase::Failed {
                    reason: reason.clone(),
                }
            }

            _ => {
                return Err(OrchestratorError::InvalidStateTransition(format!(
                    "Cannot handle {:?} in state {:?}",
                    event, *state
                )));
            }
        };

        *state = new_state.clone();
        Ok(new_state)
    }
}

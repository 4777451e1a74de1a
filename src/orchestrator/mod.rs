mod error;
mod orchestrator;
mod state_machine;
mod types;

pub use error::{OrchestratorError, OrchestratorResult};
pub use orchestrator::{OrchestratorSettings, TestOrchestrator};
pub use state_machine::SessionStateMachine;
pub use types::{
    CompletedTest, SessionEvent, SessionInfo, SessionPhase, TestRequest, TestResult, TestSession,
};

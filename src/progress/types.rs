use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage of a test as seen by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Latency,
    Download,
    Upload,
    Complete,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Latency => "latency",
            Stage::Download => "download",
            Stage::Upload => "upload",
            Stage::Complete => "complete",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One progress event. `rate_or_latency` is Mbps for transfer stages and
/// milliseconds for the latency stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub stage: Stage,
    pub progress: f64,
    pub rate_or_latency: f64,
    pub message: String,
}

impl ProgressUpdate {
    pub fn new(stage: Stage, progress: f64, rate_or_latency: f64, message: impl Into<String>) -> Self {
        Self {
            stage,
            progress: progress.clamp(0.0, 1.0),
            rate_or_latency,
            message: message.into(),
        }
    }

    /// Terminal event closing a successful stream
    pub fn complete(message: impl Into<String>) -> Self {
        Self::new(Stage::Complete, 1.0, 0.0, message)
    }

    pub fn is_terminal(&self) -> bool {
        self.stage == Stage::Complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_fields() {
        let update = ProgressUpdate::new(Stage::Download, 0.5, 94.2, "94.2 Mbps");
        let value = serde_json::to_value(&update).unwrap();
        let object = value.as_object().unwrap();

        assert_eq!(object.len(), 4);
        assert_eq!(object["stage"], "download");
        assert_eq!(object["progress"], 0.5);
        assert_eq!(object["rateOrLatency"], 94.2);
        assert_eq!(object["message"], "94.2 Mbps");
    }

    #[test]
    fn test_complete_event() {
        let update = ProgressUpdate::complete("Test complete");
        let json = serde_json::to_string(&update).unwrap();
        assert!(json.contains(r#""stage":"complete""#));
        assert!(json.contains(r#""progress":1.0"#));
        assert!(update.is_terminal());
    }

    #[test]
    fn test_progress_clamped() {
        assert_eq!(ProgressUpdate::new(Stage::Upload, 1.3, 0.0, "").progress, 1.0);
        assert_eq!(ProgressUpdate::new(Stage::Upload, -0.1, 0.0, "").progress, 0.0);
    }

    #[test]
    fn test_stage_order() {
        assert!(Stage::Latency < Stage::Download);
        assert!(Stage::Download < Stage::Upload);
        assert!(Stage::Upload < Stage::Complete);
    }
}

//! Metrics and observability module
//!
//! Prometheus-compatible metrics for speed test sessions:
//! - Session lifecycle (started, completed, failed by reason)
//! - Admission rejections by reason
//! - Distribution of measured download, upload and ping

pub mod exporter;
pub mod recorder;

pub use exporter::{metrics_route, render_metrics, start_metrics_server, MetricsError};
pub use recorder::{
    init_metrics, record_admission_rejected, record_test_completed, record_test_failed,
    record_test_started,
};

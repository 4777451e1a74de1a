//! Metrics recorder for speed test sessions
//!
//! Records session lifecycle, admission decisions and measured results.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize metric descriptions (call once at startup)
pub fn init_metrics() {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        return; // Already initialized
    }

    describe_counter!(
        "speedcore_tests_started_total",
        "Total number of speed test sessions started"
    );
    describe_counter!(
        "speedcore_tests_completed_total",
        "Total number of sessions that produced a result"
    );
    describe_counter!(
        "speedcore_tests_failed_total",
        "Total number of sessions that ended without a result"
    );
    describe_counter!(
        "speedcore_admission_rejected_total",
        "Test requests refused by admission control"
    );

    describe_gauge!("speedcore_active_tests", "Number of sessions currently running");

    describe_histogram!("speedcore_download_mbps", "Measured download throughput");
    describe_histogram!("speedcore_upload_mbps", "Measured upload throughput");
    describe_histogram!("speedcore_ping_ms", "Measured mean round-trip latency");
    describe_histogram!(
        "speedcore_test_duration_seconds",
        "Wall-clock duration of completed sessions"
    );
}

/// Record a session starting
pub fn record_test_started() {
    counter!("speedcore_tests_started_total").increment(1);
    gauge!("speedcore_active_tests").increment(1.0);
}

/// Record a session producing a result
pub fn record_test_completed(
    duration: Duration,
    download_mbps: f64,
    upload_mbps: f64,
    ping_ms: f64,
) {
    counter!("speedcore_tests_completed_total").increment(1);
    gauge!("speedcore_active_tests").decrement(1.0);

    histogram!("speedcore_test_duration_seconds").record(duration.as_secs_f64());
    histogram!("speedcore_download_mbps").record(download_mbps);
    histogram!("speedcore_upload_mbps").record(upload_mbps);
    histogram!("speedcore_ping_ms").record(ping_ms);
}

/// Record a session ending without a result
pub fn record_test_failed(reason: &'static str) {
    counter!("speedcore_tests_failed_total", "reason" => reason).increment(1);
    gauge!("speedcore_active_tests").decrement(1.0);
}

pub fn record_admission_rejected(reason: &'static str) {
    counter!("speedcore_admission_rejected_total", "reason" => reason).increment(1);
}

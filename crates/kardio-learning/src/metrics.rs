//! Counters for progress, streak and study-session activity.
//!
//! Nothing is exported from here; the counters are no-ops until the host
//! process installs a `metrics` recorder.

use metrics::counter;

/// Record the outcome of a progress write (`record_attempt`, `update_next_review_time`, ...).
pub fn record_progress_update(operation: &'static str, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        "progress_updates_total",
        "operation" => operation,
        "status" => status
    )
    .increment(1);
}

/// Record what a streak update did (`started`, `extended`, `error`, ...).
pub fn record_streak_update(outcome: &'static str) {
    counter!("streak_updates_total", "outcome" => outcome).increment(1);
}

/// Record a study-session lifecycle event
pub fn record_session_event(event: &'static str) {
    counter!("study_session_events_total", "event" => event).increment(1);
}

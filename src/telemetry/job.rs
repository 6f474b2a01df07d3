//! Job execution span helpers.
//!
//! One span per guarded job run; state transitions of the run are recorded
//! as events inside it.

use tracing::Span;

/// Start a span for a guarded job run.
///
/// `job.state` is declared empty and updated by [`record_state_transition`].
pub fn start_job_span(class: &str, queue: &str) -> Span {
    tracing::info_span!(
        "job.execute",
        "job.class" = class,
        "job.queue" = queue,
        "job.state" = tracing::field::Empty,
    )
}

/// Record a state transition on `span` and update its `job.state` field.
pub fn record_state_transition(span: &Span, from: &str, to: &str) {
    span.record("job.state", to);
    span.in_scope(|| {
        tracing::debug!(from = from, to = to, "state_transition");
    });
}

//! Metric instrument factories for restrictq.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! Without one registered, every instrument is a no-op.

use opentelemetry::metrics::{Counter, Histogram, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("restrictq")
}

/// Counter: lock claim attempts.
/// Labels: `queue`, `result` ("acquired" | "contended").
pub fn lock_attempts() -> Counter<u64> {
    meter()
        .u64_counter("restrictq.lock.attempts")
        .with_description("Number of lock claim attempts")
        .build()
}

/// Counter: reservation scans.
/// Labels: `queue`, `result` ("reserved" | "empty").
pub fn reservations() -> Counter<u64> {
    meter()
        .u64_counter("restrictq.reservations")
        .with_description("Number of reservation scans")
        .build()
}

/// Counter: post-execution releases.
/// Labels: `queue`, `result` ("ok" | "error").
pub fn releases() -> Counter<u64> {
    meter()
        .u64_counter("restrictq.releases")
        .with_description("Number of job releases")
        .build()
}

/// Counter: executed jobs.
/// Labels: `class`, `outcome` ("success" | "failure" | "panic").
pub fn jobs_executed() -> Counter<u64> {
    meter()
        .u64_counter("restrictq.jobs.executed")
        .with_description("Number of executed jobs")
        .build()
}

/// Histogram: job body duration in milliseconds.
/// Labels: `class`.
pub fn job_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("restrictq.job.duration_ms")
        .with_description("Job execution duration in milliseconds")
        .with_unit("ms")
        .build()
}

/// Counter: producer-side queue operations.
/// Labels: `queue`, `operation`.
pub fn queue_operations() -> Counter<u64> {
    meter()
        .u64_counter("restrictq.queue.operations")
        .with_description("Number of queue operations")
        .build()
}

//! Reservation: find the first job near the head of a queue whose lock is
//! free, and claim it.

use opentelemetry::KeyValue;
use tracing::debug;

use crate::error::Result;
use crate::handler::HandlerRegistry;
use crate::lock::try_acquire;
use crate::model::Job;
use crate::store::Store;
use crate::telemetry::metrics;

/// How many entries from the head of a queue one scan looks at.
///
/// A free job further back is not found by this scan; it is picked up once
/// the queue ahead of it drains. Each poll costs at most this many lock
/// attempts.
pub const LOOKAHEAD: u64 = 10;

/// Claim the first unlocked job in the first [`LOOKAHEAD`] entries of `queue`.
///
/// Nothing is removed from the queue; the entry stays in place until the
/// job has run and its lock is cleared. Returns `None` when the window is
/// empty or every candidate is locked.
pub async fn next_unlocked<S: Store>(
    store: &S,
    registry: &HandlerRegistry,
    queue: &str,
) -> Result<Option<Job>> {
    let window = store.peek(queue, 0, LOOKAHEAD).await?;
    let scanned = window.len();

    for payload in window {
        let job = Job::new(queue, payload)?;
        if try_acquire(store, registry, &job.descriptor, queue).await? {
            metrics::reservations().add(
                1,
                &[
                    KeyValue::new("queue", queue.to_string()),
                    KeyValue::new("result", "reserved"),
                ],
            );
            debug!(%queue, class = job.class(), "job reserved");
            return Ok(Some(job));
        }
    }

    metrics::reservations().add(
        1,
        &[
            KeyValue::new("queue", queue.to_string()),
            KeyValue::new("result", "empty"),
        ],
    );
    debug!(%queue, scanned, "no unlocked job in window");
    Ok(None)
}

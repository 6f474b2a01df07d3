//! Guarded execution of a reserved job.
//!
//! A reserved job moves `reserved -> executing -> succeeded | failed -> released`.
//! Release always runs, and always in this order:
//!
//! 1. read the lock record to learn which queue the job was reserved from,
//! 2. remove one occurrence of the job's payload from that queue,
//! 3. delete the lock record.
//!
//! The entry must leave the queue before the lock goes away. With the lock
//! gone and the entry still queued, another worker's scan would claim it and
//! run the same job a second time.

use std::any::Any;
use std::future::Future;
use std::panic::{AssertUnwindSafe, resume_unwind};
use std::sync::Arc;

use chrono::Utc;
use futures_util::FutureExt as _;
use opentelemetry::KeyValue;
use tracing::{Instrument, Span, error, info, warn};

use crate::error::{Error, Result};
use crate::handler::HandlerRegistry;
use crate::keys::{lock_key, queue_key};
use crate::lock::lock_name;
use crate::model::Job;
use crate::store::Store;
use crate::telemetry::job::{record_state_transition, start_job_span};
use crate::telemetry::metrics;

/// Where a reserved job is in its guarded run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Reserved,
    Executing,
    Succeeded,
    Failed,
    Released,
}

impl ExecutionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionState::Reserved => "reserved",
            ExecutionState::Executing => "executing",
            ExecutionState::Succeeded => "succeeded",
            ExecutionState::Failed => "failed",
            ExecutionState::Released => "released",
        }
    }
}

impl std::fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remove a finished job from its queue, then release its lock.
///
/// The queue is the one recorded in the lock record, since the payload
/// itself carries no queue. If the record is already gone the job's own
/// queue is used. A failure at any step leaves the lock record in place.
pub async fn clear_performed_lock<S: Store>(
    store: &S,
    registry: &HandlerRegistry,
    job: &Job,
) -> Result<()> {
    let key = lock_key(&lock_name(registry, &job.descriptor)?);
    release(store, &key, job).await.map_err(|e| Error::Release {
        lock_key: key.clone(),
        source: Box::new(e),
    })
}

async fn release<S: Store>(store: &S, key: &str, job: &Job) -> Result<()> {
    let queue = match store.get(key).await? {
        Some(queue) => queue,
        None => {
            warn!(lock_key = %key, queue = %job.queue, "lock record missing at release");
            job.queue.clone()
        }
    };

    let removed = store.lrem(&queue_key(&queue), 1, &job.payload).await?;
    if removed == 0 {
        warn!(lock_key = %key, %queue, "reserved entry was no longer queued");
    }

    store.del(key).await?;
    Ok(())
}

/// Holds the pieces needed to release a job until release has started.
///
/// Dropped while still armed (the guarded future was cancelled mid-job),
/// it spawns the release on the current runtime.
struct ReleaseGuard<S: Store> {
    armed: Option<(Arc<S>, Arc<HandlerRegistry>, Job)>,
}

impl<S: Store> ReleaseGuard<S> {
    fn arm(store: Arc<S>, registry: Arc<HandlerRegistry>, job: Job) -> Self {
        Self {
            armed: Some((store, registry, job)),
        }
    }

    fn disarm(&mut self) -> Option<(Arc<S>, Arc<HandlerRegistry>, Job)> {
        self.armed.take()
    }
}

impl<S: Store> Drop for ReleaseGuard<S> {
    fn drop(&mut self) {
        let Some((store, registry, job)) = self.armed.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(class = job.class(), queue = %job.queue, "job cancelled, releasing lock");
                handle.spawn(async move {
                    if let Err(e) = clear_performed_lock(&*store, &registry, &job).await {
                        error!(error = %e, "release after cancellation failed; lock leaked");
                    }
                });
            }
            Err(_) => {
                error!(
                    class = job.class(),
                    queue = %job.queue,
                    "job dropped outside a runtime; lock leaked"
                );
            }
        }
    }
}

/// Run `body` for a reserved job, then release the job whatever happened.
///
/// The body's error is returned, and a panic resumed, only after the entry
/// has been removed from its queue and the lock deleted. Release runs as its
/// own task, so it completes even if this future is dropped while waiting on
/// it. A release failure after a successful body is returned as
/// [`Error::Release`]. After a failed or panicked body it is returned as
/// [`Error::ReleaseAfterFailure`], which carries both failures; the panic is
/// not resumed in that case.
pub async fn run_locked<S, F, T>(
    store: Arc<S>,
    registry: Arc<HandlerRegistry>,
    job: Job,
    body: F,
) -> Result<T>
where
    S: Store,
    F: Future<Output = Result<T>>,
{
    let span = start_job_span(job.class(), &job.queue);
    let class = job.class().to_string();
    let queue = job.queue.clone();
    let reserved_at = job.reserved_at;
    let started = Utc::now();

    let mut guard = ReleaseGuard::arm(store, registry, job);

    record_state_transition(
        &span,
        ExecutionState::Reserved.as_str(),
        ExecutionState::Executing.as_str(),
    );
    let outcome = AssertUnwindSafe(body)
        .catch_unwind()
        .instrument(span.clone())
        .await;

    let duration_ms = (Utc::now() - started).num_milliseconds().max(0) as u64;
    let (finished, label) = match &outcome {
        Ok(Ok(_)) => (ExecutionState::Succeeded, "success"),
        Ok(Err(_)) => (ExecutionState::Failed, "failure"),
        Err(_) => (ExecutionState::Failed, "panic"),
    };
    record_state_transition(&span, ExecutionState::Executing.as_str(), finished.as_str());
    metrics::jobs_executed().add(
        1,
        &[
            KeyValue::new("class", class.clone()),
            KeyValue::new("outcome", label),
        ],
    );
    metrics::job_duration_ms().record(duration_ms as f64, &[KeyValue::new("class", class.clone())]);

    let released = match guard.disarm() {
        Some(parts) => spawn_release(parts, span.clone()).await,
        None => Ok(()),
    };

    metrics::releases().add(
        1,
        &[
            KeyValue::new("queue", queue.clone()),
            KeyValue::new("result", if released.is_ok() { "ok" } else { "error" }),
        ],
    );

    match (outcome, released) {
        (Ok(result), Ok(())) => {
            record_state_transition(&span, finished.as_str(), ExecutionState::Released.as_str());
            let held_ms = (Utc::now() - reserved_at).num_milliseconds().max(0);
            span.in_scope(|| {
                info!(%class, %queue, duration_ms, held_ms, outcome = label, "job released");
            });
            result
        }
        (Err(panic), Ok(())) => {
            record_state_transition(&span, finished.as_str(), ExecutionState::Released.as_str());
            resume_unwind(panic)
        }
        (Ok(Ok(_)), Err(release_err)) => {
            span.in_scope(|| {
                error!(%class, %queue, error = %release_err, "release failed; lock still held");
            });
            Err(release_err)
        }
        (Ok(Err(execution)), Err(release_err)) => {
            span.in_scope(|| {
                error!(%class, %queue, error = %release_err, "job failed and its release failed; lock still held");
            });
            Err(Error::ReleaseAfterFailure {
                release: Box::new(release_err),
                execution: Box::new(execution),
            })
        }
        (Err(panic), Err(release_err)) => {
            let message = panic_message(panic.as_ref());
            span.in_scope(|| {
                error!(%class, %queue, error = %release_err, panic = %message, "job panicked and its release failed; lock still held");
            });
            Err(Error::ReleaseAfterFailure {
                release: Box::new(release_err),
                execution: Box::new(Error::Panicked { class, message }),
            })
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

async fn spawn_release<S: Store>(
    (store, registry, job): (Arc<S>, Arc<HandlerRegistry>, Job),
    span: Span,
) -> Result<()> {
    let lock = lock_name(&registry, &job.descriptor).map(|name| lock_key(&name));
    let handle = tokio::spawn(
        async move { clear_performed_lock(&*store, &registry, &job).await }.instrument(span),
    );
    match handle.await {
        Ok(result) => result,
        Err(join_err) => Err(Error::Release {
            lock_key: lock.unwrap_or_default(),
            source: Box::new(Error::Other(format!("release task failed: {join_err}"))),
        }),
    }
}

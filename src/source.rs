//! Job sources: where a worker gets its next job and how it runs it.
//!
//! [`BasicSource`] is a plain queue: pop the head, run it. [`RestrictedSource`]
//! wraps any base source and adds the locking protocol: reservation scans the
//! head of the queue for a job whose lock is free, and execution runs the
//! base's execution inside [`run_locked`].

use std::future::Future;
use std::sync::Arc;

use opentelemetry::KeyValue;
use tracing::debug;

use crate::error::{Error, Result};
use crate::guard::run_locked;
use crate::handler::HandlerRegistry;
use crate::model::{Job, JobDescriptor};
use crate::reserve::next_unlocked;
use crate::store::Store;
use crate::telemetry::metrics;

/// Something a worker can reserve jobs from and execute them with.
pub trait JobSource: Send + Sync {
    /// Reserve the next job on `queue`, if any.
    fn reserve(&self, queue: &str) -> impl Future<Output = Result<Option<Job>>> + Send;

    /// Run a reserved job to completion.
    fn execute(&self, job: Job) -> impl Future<Output = Result<()>> + Send;
}

/// Unlocked source: destructive pop, then dispatch to the handler.
pub struct BasicSource<S: Store> {
    store: Arc<S>,
    registry: Arc<HandlerRegistry>,
}

impl<S: Store> Clone for BasicSource<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<S: Store> BasicSource<S> {
    pub fn new(store: Arc<S>, registry: Arc<HandlerRegistry>) -> Self {
        Self { store, registry }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }
}

impl<S: Store> JobSource for BasicSource<S> {
    async fn reserve(&self, queue: &str) -> Result<Option<Job>> {
        let Some(payload) = self.store.pop(queue).await? else {
            return Ok(None);
        };
        Ok(Some(Job::new(queue, payload)?))
    }

    async fn execute(&self, job: Job) -> Result<()> {
        let handler = self.registry.resolve(job.class())?;
        let class = job.descriptor.class;
        debug!(%class, queue = %job.queue, "performing job");
        handler
            .perform(job.descriptor.args)
            .await
            .map_err(|source| Error::Execution { class, source })
    }
}

/// Locking decorator: at most one in-flight job per lock name.
pub struct RestrictedSource<Src, S: Store> {
    inner: Src,
    store: Arc<S>,
    registry: Arc<HandlerRegistry>,
}

impl<Src: Clone, S: Store> Clone for RestrictedSource<Src, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<Src: JobSource, S: Store> RestrictedSource<Src, S> {
    pub fn new(inner: Src, store: Arc<S>, registry: Arc<HandlerRegistry>) -> Self {
        Self {
            inner,
            store,
            registry,
        }
    }
}

impl<S: Store> RestrictedSource<BasicSource<S>, S> {
    /// Restrict a basic source, sharing its store and registry.
    pub fn over(inner: BasicSource<S>) -> Self {
        let store = Arc::clone(inner.store());
        let registry = Arc::clone(inner.registry());
        Self::new(inner, store, registry)
    }
}

impl<Src: JobSource, S: Store> JobSource for RestrictedSource<Src, S> {
    async fn reserve(&self, queue: &str) -> Result<Option<Job>> {
        next_unlocked(&*self.store, &self.registry, queue).await
    }

    async fn execute(&self, job: Job) -> Result<()> {
        let body = self.inner.execute(job.clone());
        run_locked(Arc::clone(&self.store), Arc::clone(&self.registry), job, body).await
    }
}

/// Push a descriptor onto the tail of `queue`.
pub async fn enqueue<S: Store>(store: &S, queue: &str, descriptor: &JobDescriptor) -> Result<()> {
    let payload = descriptor.to_payload()?;
    store.push(queue, &payload).await?;
    metrics::queue_operations().add(
        1,
        &[
            KeyValue::new("queue", queue.to_string()),
            KeyValue::new("operation", "push"),
        ],
    );
    debug!(%queue, class = %descriptor.class, "job enqueued");
    Ok(())
}

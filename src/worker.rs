//! Worker loop: poll queues in priority order, execute one job at a time.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

use crate::error::Result;
use crate::model::Job;
use crate::source::JobSource;

/// Configuration for a worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Queues to poll, highest priority first.
    pub queues: Vec<String>,
    /// Sleep between polls that found nothing to do.
    pub poll_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queues: vec!["default".to_string()],
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// What one pass over the queues did.
#[derive(Debug)]
pub enum Processed {
    /// No queue had a reservable job.
    Idle,
    /// A job ran and was released; `result` is the job's own outcome.
    Ran { job: Job, result: Result<()> },
}

/// Polls a [`JobSource`] until shut down.
pub struct Worker<Src> {
    id: Uuid,
    source: Arc<Src>,
    config: WorkerConfig,
    shutdown: Arc<Notify>,
}

impl<Src> Clone for Worker<Src> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            source: Arc::clone(&self.source),
            config: self.config.clone(),
            shutdown: Arc::clone(&self.shutdown),
        }
    }
}

impl<Src: JobSource> Worker<Src> {
    pub fn new(source: Arc<Src>, config: WorkerConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            config,
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Signal the run loop to stop after the current job.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Reserve and execute at most one job, trying queues in order.
    ///
    /// Reservation errors are returned. Execution errors are reported in
    /// [`Processed::Ran`], since the job was still released.
    pub async fn work_once(&self) -> Result<Processed> {
        for queue in &self.config.queues {
            let Some(job) = self.source.reserve(queue).await? else {
                continue;
            };
            let span = info_span!("worker.job", worker.id = %self.id, queue = %queue);
            let result = self
                .source
                .execute(job.clone())
                .instrument(span)
                .await;
            return Ok(Processed::Ran { job, result });
        }
        Ok(Processed::Idle)
    }

    /// Run until [`shutdown`](Self::shutdown) is called.
    pub async fn run(&self) -> Result<()> {
        info!(worker.id = %self.id, queues = ?self.config.queues, "worker started");

        loop {
            let idle = match self.work_once().await {
                Ok(Processed::Idle) => true,
                Ok(Processed::Ran { job, result }) => {
                    if let Err(e) = result {
                        error!(class = job.class(), queue = %job.queue, "job failed: {e}");
                    }
                    false
                }
                Err(e) => {
                    error!("reserve error: {e}");
                    true
                }
            };

            if idle {
                tokio::select! {
                    _ = self.shutdown.notified() => break,
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                }
            } else if self.shutdown_requested() {
                break;
            }
        }

        info!(worker.id = %self.id, "worker shutting down");
        Ok(())
    }

    fn shutdown_requested(&self) -> bool {
        // notify_one stores a permit when nobody is waiting; consume it here.
        let notified = self.shutdown.notified();
        tokio::pin!(notified);
        notified.as_mut().enable()
    }
}

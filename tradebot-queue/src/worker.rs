//! Handler dispatch and a background worker loop.
//!
//! The worker is a thin consumer built on the public queue operations:
//! dequeue, run the handler registered for the job type, then `complete` on
//! success or `fail` with the handler's error.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{
    QueueResult, QueueError, Job, JobError,
    backend::QueueBackend,
    config::WorkerConfig,
    queue::{FailOutcome, Queue},
};

/// Handler for one job type
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job) -> Result<(), JobError>;
}

/// Adapter turning an async closure into a [`JobHandler`]
pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> JobHandler for FnHandler<F>
where
    F: Fn(Job) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), JobError>> + Send,
{
    async fn handle(&self, job: &Job) -> Result<(), JobError> {
        (self.0)(job.clone()).await
    }
}

/// Registry mapping job types to their handlers
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a job type
    pub fn register(&mut self, job_type: impl Into<String>, handler: impl JobHandler + 'static) -> QueueResult<()> {
        let job_type = job_type.into();
        if self.handlers.contains_key(&job_type) {
            return Err(QueueError::HandlerAlreadyRegistered(job_type));
        }

        self.handlers.insert(job_type, Arc::new(handler));
        Ok(())
    }

    /// Register an async closure for a job type
    pub fn register_fn<F, Fut>(&mut self, job_type: impl Into<String>, f: F) -> QueueResult<()>
    where
        F: Fn(Job) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), JobError>> + Send + 'static,
    {
        self.register(job_type, FnHandler(f))
    }

    /// Check if a job type is registered
    pub fn is_registered(&self, job_type: &str) -> bool {
        self.handlers.contains_key(job_type)
    }

    /// Get all registered job types, sorted
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }

    /// Run the handler registered for the job's type
    pub async fn dispatch(&self, job: &Job) -> Result<(), JobError> {
        let handler = self
            .handlers
            .get(&job.job_type)
            .ok_or_else(|| JobError::NoHandler(job.job_type.clone()))?;

        handler.handle(job).await
    }
}

/// Handle to a running worker
pub struct WorkerHandle {
    shutdown_tx: oneshot::Sender<()>,
    join_handle: JoinHandle<QueueResult<()>>,
}

impl WorkerHandle {
    /// Ask the worker to stop and wait for it.
    ///
    /// A job already being handled runs to completion first.
    pub async fn shutdown(self) -> QueueResult<()> {
        let _ = self.shutdown_tx.send(());
        self.join_handle
            .await
            .map_err(|e| QueueError::Internal(format!("Worker join error: {}", e)))?
    }
}

/// Background consumer for one queue
pub struct Worker<B: QueueBackend> {
    queue: Queue<B>,
    registry: Arc<HandlerRegistry>,
    config: WorkerConfig,
}

impl<B: QueueBackend + 'static> Worker<B> {
    pub fn new(queue: Queue<B>, registry: HandlerRegistry, config: WorkerConfig) -> Self {
        Self {
            queue,
            registry: Arc::new(registry),
            config,
        }
    }

    /// Start the worker loop on the tokio runtime.
    ///
    /// Dropping the returned handle also stops the loop, after the current job.
    pub fn spawn(self) -> WorkerHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let join_handle = tokio::spawn(self.run(shutdown_rx));

        WorkerHandle {
            shutdown_tx,
            join_handle,
        }
    }

    async fn run(self, mut shutdown_rx: oneshot::Receiver<()>) -> QueueResult<()> {
        info!(backend = self.queue.backend().name(), namespace = %self.queue.keys().namespace(), "Worker started");

        loop {
            // Shutdown is only observed between jobs so a popped job is always settled
            if !matches!(shutdown_rx.try_recv(), Err(oneshot::error::TryRecvError::Empty)) {
                break;
            }

            let pause = match self.process_next().await {
                Ok(true) => continue,
                Ok(false) => self.config.idle_backoff,
                Err(e) => {
                    error!(error = %e, "Error processing job");
                    self.config.error_backoff
                }
            };

            tokio::select! {
                _ = &mut shutdown_rx => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }

        info!("Worker stopped");
        Ok(())
    }

    /// Dequeue and settle one job, returning whether there was one
    pub async fn process_next(&self) -> QueueResult<bool> {
        let Some(job) = self.queue.dequeue().await? else {
            return Ok(false);
        };

        debug!(job_id = %job.id, job_type = %job.job_type, attempts = job.attempts, "Processing job");

        match self.registry.dispatch(&job).await {
            Ok(()) => {
                self.queue.complete(&job).await?;
                info!(job_id = %job.id, job_type = %job.job_type, "Job completed successfully");
            }
            Err(e) => {
                let job_id = job.id.clone();
                match self.queue.fail(job, &e).await? {
                    FailOutcome::Retried { attempts, max_attempts } => {
                        warn!(job_id = %job_id, attempts, max_attempts, error = %e, "Job failed, will retry");
                    }
                    FailOutcome::DeadLettered { record_id } => {
                        error!(job_id = %job_id, record_id = %record_id, error = %e, "Job failed permanently");
                    }
                }
            }
        }

        Ok(true)
    }

    pub fn queue(&self) -> &Queue<B> {
        &self.queue
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }
}

use std::sync::Arc;
use chrono::Utc;
use tokio::sync::broadcast;
use tokio_stream::{StreamExt, wrappers::BroadcastStream};
use tracing::debug;

use crate::{Job, JobEvent};
use super::{BoxStream, LiveMetrics};

/// Capacity of the event channel; slow subscribers skip what they missed
const EVENT_CHANNEL_CAPACITY: usize = 10_000;

/// Event broadcast plus live counters, shared by every clone of a queue
#[derive(Clone)]
pub struct ObservabilityLayer {
    event_broadcaster: broadcast::Sender<JobEvent>,
    metrics: Arc<LiveMetrics>,
}

impl ObservabilityLayer {
    pub fn new() -> Self {
        let (event_broadcaster, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            event_broadcaster,
            metrics: Arc::new(LiveMetrics::new()),
        }
    }

    /// Subscribe to raw events
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.event_broadcaster.subscribe()
    }

    /// Events as a stream; lagged gaps are skipped
    pub fn event_stream(&self) -> BoxStream<JobEvent> {
        let stream = BroadcastStream::new(self.event_broadcaster.subscribe())
            .filter_map(|result| result.ok());
        Box::pin(stream)
    }

    pub fn metrics(&self) -> &LiveMetrics {
        &self.metrics
    }

    fn emit(&self, event: JobEvent) {
        // No subscribers is fine
        let _ = self.event_broadcaster.send(event);
    }

    pub fn record_enqueued(&self, job: &Job) {
        self.emit(JobEvent::Enqueued {
            job_id: job.id.clone(),
            job_type: job.job_type.clone(),
            priority: job.priority,
            scheduled_for: job.scheduled_for,
            at: Utc::now(),
        });
        self.metrics.increment_jobs_enqueued(&job.job_type);
        debug!("Recorded job enqueued: {} ({})", job.id, job.job_type);
    }

    pub fn record_promoted(&self, job: &Job) {
        self.emit(JobEvent::Promoted {
            job_id: job.id.clone(),
            priority: job.priority,
            at: Utc::now(),
        });
        self.metrics.increment_jobs_promoted(1);
    }

    pub fn record_dequeued(&self, job: &Job) {
        self.emit(JobEvent::Dequeued {
            job_id: job.id.clone(),
            attempts: job.attempts,
            at: Utc::now(),
        });
        self.metrics.increment_jobs_dequeued(&job.job_type);
    }

    pub fn record_retrying(&self, job: &Job, error: &str) {
        self.emit(JobEvent::Retrying {
            job_id: job.id.clone(),
            attempts: job.attempts,
            error: error.to_string(),
            at: Utc::now(),
        });
        self.metrics.increment_jobs_retried(&job.job_type);
    }

    pub fn record_dead_lettered(&self, job: &Job, error: &str) {
        self.emit(JobEvent::DeadLettered {
            job_id: job.id.clone(),
            error: error.to_string(),
            at: Utc::now(),
        });
        self.metrics.increment_jobs_dead_lettered(&job.job_type);
    }

    pub fn record_completed(&self, job: &Job) {
        self.emit(JobEvent::Completed {
            job_id: job.id.clone(),
            at: Utc::now(),
        });
        self.metrics.increment_jobs_completed(&job.job_type);
        debug!("Recorded job completed: {} ({})", job.id, job.job_type);
    }

    pub fn record_replayed(&self, job: &Job) {
        self.emit(JobEvent::Replayed {
            job_id: job.id.clone(),
            at: Utc::now(),
        });
        self.metrics.increment_jobs_replayed(&job.job_type);
    }

    pub fn record_dead_letter_cleared(&self, removed: usize) {
        self.emit(JobEvent::DeadLetterCleared {
            removed,
            at: Utc::now(),
        });
    }
}

impl Default for ObservabilityLayer {
    fn default() -> Self {
        Self::new()
    }
}

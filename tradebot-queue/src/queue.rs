use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use chrono::Utc;
use rand::Rng;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    QueueResult, QueueError, Job, JobPriority, Payload, EnqueueOptions,
    DeadLetterRecord, DeadLetterId, QueueDepth, JobEvent,
    backend::{QueueBackend, ListEnd},
    codec::{JobCodec, JsonCodec},
    config::QueueConfig,
    keys::QueueKeys,
    observability::{BoxStream, ObservabilityLayer},
};

#[cfg(feature = "redis")]
use crate::backend::redis::RedisBackend;

/// What `fail` did with a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailOutcome {
    /// Job went back to the consumption end of its lane
    Retried { attempts: u32, max_attempts: u32 },

    /// Job exhausted its budget and now lives in the dead-letter store
    DeadLettered { record_id: DeadLetterId },
}

/// Priority job queue over a shared store.
///
/// The queue keeps no job state in process: every operation is a short
/// sequence of backend calls, so any number of clones, tasks or processes can
/// share one namespace.
pub struct Queue<B: QueueBackend> {
    backend: Arc<B>,
    codec: Arc<dyn JobCodec>,
    observability: ObservabilityLayer,
    keys: Arc<QueueKeys>,
    config: QueueConfig,
}

impl<B: QueueBackend + 'static> Queue<B> {
    /// Create a queue with the default configuration (namespace `jobs`)
    pub fn new(backend: B) -> Self {
        let config = QueueConfig::default();
        Self {
            backend: Arc::new(backend),
            codec: Arc::new(JsonCodec),
            observability: ObservabilityLayer::new(),
            keys: Arc::new(QueueKeys::new(config.namespace.clone())),
            config,
        }
    }

    /// Create a queue with custom configuration
    pub fn with_config(backend: B, config: QueueConfig) -> QueueResult<Self> {
        config.validate()?;
        Ok(Self {
            backend: Arc::new(backend),
            codec: Arc::new(JsonCodec),
            observability: ObservabilityLayer::new(),
            keys: Arc::new(QueueKeys::new(config.namespace.clone())),
            config,
        })
    }

    /// Replace the record codec
    pub fn with_codec(mut self, codec: impl JobCodec + 'static) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    /// Share an observability layer with other components
    pub fn with_observability(mut self, observability: ObservabilityLayer) -> Self {
        self.observability = observability;
        self
    }

    /// Enqueue an immediately eligible job with the default retry budget
    pub async fn enqueue(&self, job_type: &str, payload: Payload, priority: JobPriority) -> QueueResult<Job> {
        self.enqueue_with_options(job_type, payload, priority, EnqueueOptions::default()).await
    }

    /// Enqueue a job, optionally deferred and with its own retry budget
    #[instrument(skip(self, payload, options), fields(priority = %priority))]
    pub async fn enqueue_with_options(
        &self,
        job_type: &str,
        payload: Payload,
        priority: JobPriority,
        options: EnqueueOptions,
    ) -> QueueResult<Job> {
        let mut job = Job::new(job_type, payload, priority);
        job.max_attempts = options.effective_max_attempts(self.config.default_max_attempts);
        job.scheduled_for = options.schedule_for;

        let encoded = self.codec.encode_job(&job)?;
        match job.scheduled_for {
            Some(due) => self.backend.schedule(self.keys.scheduled(), encoded, due).await?,
            None => self.backend.push(self.keys.lane(priority), encoded, ListEnd::Head).await?,
        }

        self.observability.record_enqueued(&job);
        info!(job_id = %job.id, scheduled_for = ?job.scheduled_for, "Enqueued job");
        Ok(job)
    }

    /// Move every due scheduled job into its lane, returning how many moved.
    ///
    /// Each move is a single atomic claim on the backend, so concurrent
    /// callers never promote the same entry twice. Entries that cannot be
    /// decoded are removed from the scheduled set and logged with their raw
    /// value.
    #[instrument(skip(self), level = "debug")]
    pub async fn promote_due(&self) -> QueueResult<usize> {
        let scheduled = self.keys.scheduled();
        let now = Utc::now();
        let due = self.backend.due_members(scheduled, now).await?;

        let mut promoted = 0;
        for member in due {
            let job = match self.codec.decode_job(&member) {
                Ok(job) => job,
                Err(e) => {
                    if self.backend.remove_scheduled(scheduled, &member).await? {
                        error!(error = %e, raw = %member, "Dropped malformed scheduled entry");
                    }
                    continue;
                }
            };

            // Store scores are millisecond-granular; the record is exact
            if !job.is_due(now) {
                continue;
            }

            let lane = self.keys.lane(job.priority);
            if self.backend.claim_scheduled(scheduled, &member, lane).await? {
                self.observability.record_promoted(&job);
                promoted += 1;
            }
        }

        if promoted > 0 {
            debug!(promoted, "Promoted due scheduled jobs");
        }
        Ok(promoted)
    }

    /// Take the next job, highest priority first.
    ///
    /// Returns `Ok(None)` when every lane is empty. The returned job's
    /// `attempts` already counts this delivery.
    #[instrument(skip(self), level = "debug")]
    pub async fn dequeue(&self) -> QueueResult<Option<Job>> {
        self.promote_due().await?;

        for &priority in JobPriority::drain_order() {
            let lane = self.keys.lane(priority);
            let Some(raw) = self.backend.pop(lane).await? else {
                continue;
            };

            let mut job = self.codec.decode_job(&raw).map_err(|e| {
                error!(lane, error = %e, raw = %raw, "Popped lane entry could not be decoded");
                e
            })?;
            job.attempts = job.attempts.saturating_add(1);

            self.observability.record_dequeued(&job);
            debug!(job_id = %job.id, job_type = %job.job_type, attempts = job.attempts, "Dequeued job");
            return Ok(Some(job));
        }

        Ok(None)
    }

    /// Wait up to `timeout` for a job.
    ///
    /// Polls with a doubling, slightly jittered sleep capped by
    /// `max_poll_interval` and never sleeps past the deadline. A pass that
    /// has started always runs to completion, so a popped job is never lost
    /// to the deadline.
    pub async fn dequeue_with_timeout(&self, timeout: Duration) -> QueueResult<Option<Job>> {
        let start = Instant::now();
        let deadline = start.checked_add(timeout);
        let mut delay = self.config.poll_interval;

        loop {
            if let Some(job) = self.dequeue().await? {
                return Ok(Some(job));
            }

            let now = Instant::now();
            let pause = match deadline {
                Some(deadline) if now >= deadline => return Ok(None),
                Some(deadline) => jittered(delay).min(deadline - now),
                None => jittered(delay),
            };
            tokio::time::sleep(pause).await;
            delay = delay.saturating_mul(2).min(self.config.max_poll_interval);
        }
    }

    /// Report a failed delivery.
    ///
    /// With budget left the job is re-inserted at the consumption end of its
    /// lane (served before first-attempt jobs of the same priority) with the
    /// message under `_error`. Otherwise it moves to the dead-letter store.
    #[instrument(skip(self, job, error), fields(job_id = %job.id, job_type = %job.job_type, attempts = job.attempts))]
    pub async fn fail(&self, mut job: Job, error: impl fmt::Display) -> QueueResult<FailOutcome> {
        let error = error.to_string();

        if job.can_retry() {
            job.record_error(&error);
            let encoded = self.codec.encode_job(&job)?;
            self.backend.push(self.keys.lane(job.priority), encoded, ListEnd::Tail).await?;

            self.observability.record_retrying(&job, &error);
            debug!(max_attempts = job.max_attempts, error = %error, "Job failed, requeued for retry");
            return Ok(FailOutcome::Retried {
                attempts: job.attempts,
                max_attempts: job.max_attempts,
            });
        }

        let record = DeadLetterRecord::new(job, error);
        let encoded = self.codec.encode_dead_letter(&record)?;
        self.backend.push(self.keys.dead_letter(), encoded, ListEnd::Head).await?;

        self.observability.record_dead_lettered(&record.job, &record.error);
        warn!(record_id = %record.id, error = %record.error, "Job exhausted its retry budget, dead-lettered");
        Ok(FailOutcome::DeadLettered { record_id: record.id })
    }

    /// Report a successful delivery.
    ///
    /// Success needs no store change (the job already left its lane on
    /// dequeue); this only makes it visible to events and metrics.
    pub async fn complete(&self, job: &Job) -> QueueResult<()> {
        self.observability.record_completed(job);
        debug!(job_id = %job.id, job_type = %job.job_type, "Job completed");
        Ok(())
    }

    /// Lane-resident jobs per priority; scheduled jobs are not counted
    pub async fn queue_depth(&self) -> QueueResult<QueueDepth> {
        let mut depth = QueueDepth::default();
        for &priority in JobPriority::all() {
            let count = self.backend.list_len(self.keys.lane(priority)).await?;
            depth.set(priority, count);
        }
        Ok(depth)
    }

    /// Jobs waiting in the scheduled set, due or not
    pub async fn scheduled_depth(&self) -> QueueResult<usize> {
        self.backend.scheduled_len(self.keys.scheduled()).await
    }

    pub async fn dead_letter_depth(&self) -> QueueResult<usize> {
        self.backend.list_len(self.keys.dead_letter()).await
    }

    /// Up to `n` dead-letter records, newest first; malformed entries are skipped
    pub async fn peek_dead_letter(&self, n: usize) -> QueueResult<Vec<DeadLetterRecord>> {
        let raw = self.backend.list_range(self.keys.dead_letter(), n).await?;

        Ok(raw
            .iter()
            .filter_map(|entry| match self.codec.decode_dead_letter(entry) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(error = %e, "Skipping malformed dead-letter entry");
                    None
                }
            })
            .collect())
    }

    /// Drop every dead-letter record, returning how many were removed
    #[instrument(skip(self))]
    pub async fn clear_dead_letter(&self) -> QueueResult<usize> {
        let removed = self.backend.clear_list(self.keys.dead_letter()).await?;
        self.observability.record_dead_letter_cleared(removed);
        info!(removed, "Cleared dead-letter store");
        Ok(removed)
    }

    /// Put the dead-letter record at `index` (0 = newest) back into its lane
    /// with `attempts` reset to 0, at the ordinary FIFO insertion end.
    ///
    /// The record is removed by its exact value, which is unique per record;
    /// if another caller replayed or cleared it first this returns
    /// `DeadLetterNotFound` and nothing is enqueued.
    #[instrument(skip(self))]
    pub async fn retry_dead_letter(&self, index: usize) -> QueueResult<Job> {
        let dead_letter = self.keys.dead_letter();
        let raw = self
            .backend
            .list_index(dead_letter, index)
            .await?
            .ok_or(QueueError::DeadLetterNotFound(index))?;

        let DeadLetterRecord { id: record_id, mut job, .. } = self.codec.decode_dead_letter(&raw)?;
        job.attempts = 0;
        let encoded = self.codec.encode_job(&job)?;

        let lane = self.keys.lane(job.priority);
        if !self.backend.move_list_item(dead_letter, &raw, lane, encoded, ListEnd::Head).await? {
            return Err(QueueError::DeadLetterNotFound(index));
        }

        self.observability.record_replayed(&job);
        info!(job_id = %job.id, record_id = %record_id, "Replayed dead-lettered job");
        Ok(job)
    }

    /// Lifecycle events published by this queue and its clones
    pub fn event_stream(&self) -> BoxStream<JobEvent> {
        self.observability.event_stream()
    }

    /// Get backend reference
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Get observability layer
    pub fn observability(&self) -> &ObservabilityLayer {
        &self.observability
    }

    pub fn keys(&self) -> &QueueKeys {
        &self.keys
    }

    /// Get configuration
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }
}

#[cfg(feature = "redis")]
impl Queue<RedisBackend> {
    /// Connect to the Redis server named by `config.redis_url`
    pub async fn connect(config: QueueConfig) -> QueueResult<Self> {
        config.validate()?;
        let url = config
            .redis_url
            .as_deref()
            .ok_or_else(|| QueueError::Configuration("redis_url is not set".to_string()))?;
        let backend = RedisBackend::connect(url).await?;
        info!(namespace = %config.namespace, "Queue connected to redis");
        Self::with_config(backend, config)
    }
}

impl<B: QueueBackend> Clone for Queue<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            codec: self.codec.clone(),
            observability: self.observability.clone(),
            keys: self.keys.clone(),
            config: self.config.clone(),
        }
    }
}

/// Add up to 10% random jitter so idle consumers do not poll in lockstep
fn jittered(delay: Duration) -> Duration {
    let max_jitter = (delay.as_millis() as u64 / 10).max(1);
    delay + Duration::from_millis(rand::thread_rng().gen_range(0..=max_jitter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use crate::ERROR_KEY;
    use serde_json::json;
    use tracing_test::traced_test;

    fn payload(data: &str) -> Payload {
        let mut payload = Payload::new();
        payload.insert("data".to_string(), json!(data));
        payload
    }

    #[tokio::test]
    async fn test_enqueue_uses_configured_default_budget() {
        let config = QueueConfig {
            default_max_attempts: 5,
            ..QueueConfig::default()
        };
        let queue = Queue::with_config(MemoryBackend::new(), config).unwrap();

        let job = queue.enqueue("notify", payload("x"), JobPriority::Normal).await.unwrap();
        assert_eq!(job.max_attempts, 5);
        assert_eq!(job.attempts, 0);
    }

    #[tokio::test]
    async fn test_with_config_rejects_invalid_config() {
        let config = QueueConfig::default().with_namespace("");
        let result = Queue::with_config(MemoryBackend::new(), config);
        assert!(matches!(result, Err(QueueError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_enqueue_lands_in_namespaced_lane() {
        let backend = MemoryBackend::new();
        let queue = Queue::with_config(backend.clone(), QueueConfig::default().with_namespace("bot")).unwrap();

        queue.enqueue("notify", payload("x"), JobPriority::High).await.unwrap();

        assert_eq!(backend.list_len("bot:queue:high").await.unwrap(), 1);
        assert_eq!(backend.list_len("jobs:queue:high").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let backend = MemoryBackend::new();
        let a = Queue::with_config(backend.clone(), QueueConfig::default().with_namespace("a")).unwrap();
        let b = Queue::with_config(backend, QueueConfig::default().with_namespace("b")).unwrap();

        a.enqueue("notify", payload("x"), JobPriority::Normal).await.unwrap();

        assert!(b.dequeue().await.unwrap().is_none());
        assert!(a.dequeue().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_fail_records_error_on_payload() {
        let queue = Queue::new(MemoryBackend::new());
        queue.enqueue("execute_order", payload("x"), JobPriority::Critical).await.unwrap();

        let job = queue.dequeue().await.unwrap().unwrap();
        let outcome = queue.fail(job, "exchange timeout").await.unwrap();
        assert_eq!(outcome, FailOutcome::Retried { attempts: 1, max_attempts: 3 });

        let retried = queue.dequeue().await.unwrap().unwrap();
        assert_eq!(retried.payload[ERROR_KEY], json!("exchange timeout"));
        assert_eq!(retried.payload["data"], json!("x"));
        assert_eq!(retried.attempts, 2);
    }

    #[tokio::test]
    async fn test_dead_letter_record_keeps_error_and_job() {
        let queue = Queue::new(MemoryBackend::new());
        let options = EnqueueOptions::new().with_max_attempts(1);
        queue.enqueue_with_options("notify", payload("x"), JobPriority::Low, options).await.unwrap();

        let job = queue.dequeue().await.unwrap().unwrap();
        let outcome = queue.fail(job.clone(), "smtp down").await.unwrap();

        let records = queue.peek_dead_letter(10).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(outcome, FailOutcome::DeadLettered { record_id: records[0].id.clone() });
        assert_eq!(records[0].error, "smtp down");
        assert_eq!(records[0].job, job);
    }

    #[tokio::test]
    async fn test_retry_dead_letter_missing_index() {
        let queue = Queue::new(MemoryBackend::new());
        let err = queue.retry_dead_letter(0).await.unwrap_err();
        assert_eq!(err, QueueError::DeadLetterNotFound(0));
    }

    #[tokio::test]
    async fn test_retry_dead_letter_picks_exact_record_among_identical_jobs() {
        let queue = Queue::new(MemoryBackend::new());
        let mut job = Job::new("notify", payload("same"), JobPriority::Normal);
        job.attempts = 3;

        // Two records for byte-identical jobs
        queue.fail(job.clone(), "boom").await.unwrap();
        queue.fail(job.clone(), "boom").await.unwrap();
        let before = queue.peek_dead_letter(2).await.unwrap();

        queue.retry_dead_letter(1).await.unwrap();

        let after = queue.peek_dead_letter(10).await.unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].id, before[0].id);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_peek_skips_malformed_dead_letters() {
        let queue = Queue::new(MemoryBackend::new());
        let job = Job { attempts: 3, ..Job::new("notify", payload("x"), JobPriority::High) };
        queue.fail(job, "boom").await.unwrap();
        queue
            .backend()
            .push(queue.keys().dead_letter(), "{broken".to_string(), ListEnd::Head)
            .await
            .unwrap();

        let records = queue.peek_dead_letter(10).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(queue.dead_letter_depth().await.unwrap(), 2);
        assert!(logs_contain("Skipping malformed dead-letter entry"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_malformed_scheduled_entry_is_dropped_once() {
        let queue = Queue::new(MemoryBackend::new());
        let past = Utc::now() - chrono::Duration::seconds(1);
        queue
            .backend()
            .schedule(queue.keys().scheduled(), "not a job".to_string(), past)
            .await
            .unwrap();
        let options = EnqueueOptions::new().with_schedule_for(past);
        let job = queue.enqueue_with_options("rescore", payload("x"), JobPriority::Low, options).await.unwrap();

        let dequeued = queue.dequeue().await.unwrap().unwrap();
        assert_eq!(dequeued.id, job.id);
        assert_eq!(queue.scheduled_depth().await.unwrap(), 0);

        assert!(queue.dequeue().await.unwrap().is_none());
        logs_assert(|lines: &[&str]| {
            match lines.iter().filter(|line| line.contains("Dropped malformed scheduled entry")).count() {
                1 => Ok(()),
                n => Err(format!("expected one drop log, got {}", n)),
            }
        });
        assert!(logs_contain("not a job"));
    }

    #[tokio::test]
    async fn test_promotion_waits_for_exact_due_time() {
        let queue = Queue::new(MemoryBackend::new());
        let mut job = Job::new("rescore", payload("x"), JobPriority::High);
        job.scheduled_for = Some(Utc::now() + chrono::Duration::hours(1));

        // Store score claims the entry is due, the record says otherwise
        let encoded = JsonCodec.encode_job(&job).unwrap();
        let past = Utc::now() - chrono::Duration::seconds(1);
        queue.backend().schedule(queue.keys().scheduled(), encoded, past).await.unwrap();

        assert_eq!(queue.promote_due().await.unwrap(), 0);
        assert!(queue.dequeue().await.unwrap().is_none());
        assert_eq!(queue.scheduled_depth().await.unwrap(), 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_corrupt_lane_entry_is_serialization_error() {
        let queue = Queue::new(MemoryBackend::new());
        queue
            .backend()
            .push(queue.keys().lane(JobPriority::Normal), "garbage".to_string(), ListEnd::Head)
            .await
            .unwrap();

        let err = queue.dequeue().await.unwrap_err();
        assert!(matches!(err, QueueError::Serialization { .. }));
        assert!(logs_contain("raw=garbage"));
    }

    #[tokio::test]
    async fn test_dequeue_with_timeout_waits_for_scheduled_job() {
        let queue = Queue::new(MemoryBackend::new());
        let options = EnqueueOptions::new().schedule_in(Duration::from_millis(80));
        let job = queue.enqueue_with_options("rescore", payload("x"), JobPriority::Normal, options).await.unwrap();

        let dequeued = queue.dequeue_with_timeout(Duration::from_secs(2)).await.unwrap().unwrap();
        assert_eq!(dequeued.id, job.id);
    }

    #[tokio::test]
    async fn test_dequeue_with_timeout_gives_up_at_deadline() {
        let queue = Queue::new(MemoryBackend::new());
        let started = std::time::Instant::now();

        let result = queue.dequeue_with_timeout(Duration::from_millis(120)).await.unwrap();

        assert!(result.is_none());
        assert!(started.elapsed() >= Duration::from_millis(120));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_complete_touches_only_observability() {
        let queue = Queue::new(MemoryBackend::new());
        queue.enqueue("notify", payload("x"), JobPriority::Normal).await.unwrap();
        let job = queue.dequeue().await.unwrap().unwrap();

        queue.complete(&job).await.unwrap();

        assert_eq!(queue.observability().metrics().jobs_completed(), 1);
        assert_eq!(queue.queue_depth().await.unwrap().total(), 0);
        assert_eq!(queue.dead_letter_depth().await.unwrap(), 0);
    }

    #[test]
    fn test_jitter_stays_within_ten_percent() {
        for _ in 0..100 {
            let d = jittered(Duration::from_millis(100));
            assert!(d >= Duration::from_millis(100) && d <= Duration::from_millis(110));
        }
    }
}

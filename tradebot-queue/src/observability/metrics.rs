use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use parking_lot::RwLock;
use serde::Serialize;

/// Live in-process counters for queue operations
pub struct LiveMetrics {
    jobs_enqueued: AtomicU64,
    jobs_promoted: AtomicU64,
    jobs_dequeued: AtomicU64,
    jobs_completed: AtomicU64,
    jobs_retried: AtomicU64,
    jobs_dead_lettered: AtomicU64,
    jobs_replayed: AtomicU64,

    // Per-job-type metrics
    job_type_metrics: RwLock<HashMap<String, JobTypeMetrics>>,
}

impl LiveMetrics {
    pub fn new() -> Self {
        Self {
            jobs_enqueued: AtomicU64::new(0),
            jobs_promoted: AtomicU64::new(0),
            jobs_dequeued: AtomicU64::new(0),
            jobs_completed: AtomicU64::new(0),
            jobs_retried: AtomicU64::new(0),
            jobs_dead_lettered: AtomicU64::new(0),
            jobs_replayed: AtomicU64::new(0),
            job_type_metrics: RwLock::new(HashMap::new()),
        }
    }

    fn bump_type(&self, job_type: &str, f: impl FnOnce(&mut JobTypeMetrics)) {
        let mut metrics = self.job_type_metrics.write();
        f(metrics.entry(job_type.to_string()).or_default());
    }

    pub fn increment_jobs_enqueued(&self, job_type: &str) {
        self.jobs_enqueued.fetch_add(1, Ordering::Relaxed);
        self.bump_type(job_type, |m| m.enqueued += 1);
    }

    pub fn increment_jobs_promoted(&self, count: u64) {
        self.jobs_promoted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_jobs_dequeued(&self, job_type: &str) {
        self.jobs_dequeued.fetch_add(1, Ordering::Relaxed);
        self.bump_type(job_type, |m| m.dequeued += 1);
    }

    pub fn increment_jobs_completed(&self, job_type: &str) {
        self.jobs_completed.fetch_add(1, Ordering::Relaxed);
        self.bump_type(job_type, |m| m.completed += 1);
    }

    pub fn increment_jobs_retried(&self, job_type: &str) {
        self.jobs_retried.fetch_add(1, Ordering::Relaxed);
        self.bump_type(job_type, |m| m.retried += 1);
    }

    pub fn increment_jobs_dead_lettered(&self, job_type: &str) {
        self.jobs_dead_lettered.fetch_add(1, Ordering::Relaxed);
        self.bump_type(job_type, |m| m.dead_lettered += 1);
    }

    pub fn increment_jobs_replayed(&self, job_type: &str) {
        self.jobs_replayed.fetch_add(1, Ordering::Relaxed);
        self.bump_type(job_type, |m| m.replayed += 1);
    }

    // Getters for global metrics
    pub fn jobs_enqueued(&self) -> u64 {
        self.jobs_enqueued.load(Ordering::Relaxed)
    }

    pub fn jobs_promoted(&self) -> u64 {
        self.jobs_promoted.load(Ordering::Relaxed)
    }

    pub fn jobs_dequeued(&self) -> u64 {
        self.jobs_dequeued.load(Ordering::Relaxed)
    }

    pub fn jobs_completed(&self) -> u64 {
        self.jobs_completed.load(Ordering::Relaxed)
    }

    pub fn jobs_retried(&self) -> u64 {
        self.jobs_retried.load(Ordering::Relaxed)
    }

    pub fn jobs_dead_lettered(&self) -> u64 {
        self.jobs_dead_lettered.load(Ordering::Relaxed)
    }

    pub fn jobs_replayed(&self) -> u64 {
        self.jobs_replayed.load(Ordering::Relaxed)
    }

    /// Get metrics for a specific job type
    pub fn job_type_metrics(&self, job_type: &str) -> Option<JobTypeMetrics> {
        self.job_type_metrics.read().get(job_type).cloned()
    }

    /// Get all job type metrics
    pub fn all_job_type_metrics(&self) -> HashMap<String, JobTypeMetrics> {
        self.job_type_metrics.read().clone()
    }

    /// Point-in-time copy of the global counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            enqueued: self.jobs_enqueued(),
            promoted: self.jobs_promoted(),
            dequeued: self.jobs_dequeued(),
            completed: self.jobs_completed(),
            retried: self.jobs_retried(),
            dead_lettered: self.jobs_dead_lettered(),
            replayed: self.jobs_replayed(),
        }
    }
}

impl Default for LiveMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Metrics for a specific job type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobTypeMetrics {
    pub enqueued: u64,
    pub dequeued: u64,
    pub completed: u64,
    pub retried: u64,
    pub dead_lettered: u64,
    pub replayed: u64,
}

/// Global counters at one instant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub enqueued: u64,
    pub promoted: u64,
    pub dequeued: u64,
    pub completed: u64,
    pub retried: u64,
    pub dead_lettered: u64,
    pub replayed: u64,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use super::{JobId, JobPriority};

/// Open string-keyed payload carried by every job
pub type Payload = serde_json::Map<String, Value>;

/// Payload key the queue writes the last failure message under
pub const ERROR_KEY: &str = "_error";

/// Default retry budget when none is given at enqueue time
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// One unit of work: immutable identity plus mutable retry state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier
    pub id: JobId,

    /// Job type identifier for handler dispatch
    #[serde(rename = "type")]
    pub job_type: String,

    /// Caller-defined payload
    #[serde(default)]
    pub payload: Payload,

    /// Lane the job lives in
    pub priority: JobPriority,

    /// When the job was created
    pub created_at: DateTime<Utc>,

    /// When the job becomes eligible (None = immediately)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<DateTime<Utc>>,

    /// Times this job has been handed out by `dequeue`
    pub attempts: u32,

    /// Retry budget
    pub max_attempts: u32,
}

impl Job {
    /// Create a fresh job with a new id
    pub fn new(job_type: impl Into<String>, payload: Payload, priority: JobPriority) -> Self {
        Self {
            id: JobId::new(),
            job_type: job_type.into(),
            payload,
            priority,
            created_at: Utc::now(),
            scheduled_for: None,
            attempts: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Check whether another failure would still be retried
    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }

    /// Check if the job is due at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_for.map_or(true, |at| at <= now)
    }

    /// Last failure message recorded on the payload, if any
    pub fn last_error(&self) -> Option<&str> {
        self.payload.get(ERROR_KEY).and_then(Value::as_str)
    }

    pub(crate) fn record_error(&mut self, error: &str) {
        self.payload
            .insert(ERROR_KEY.to_string(), Value::String(error.to_string()));
    }
}

/// Per-enqueue options
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnqueueOptions {
    /// Retry budget; `None` or `Some(0)` means the configured default
    pub max_attempts: Option<u32>,

    /// Absolute due time; `None` means immediately eligible
    pub schedule_for: Option<DateTime<Utc>>,
}

impl EnqueueOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retry budget
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Defer the job until `at`
    pub fn with_schedule_for(mut self, at: DateTime<Utc>) -> Self {
        self.schedule_for = Some(at);
        self
    }

    /// Defer the job by `delay` from now
    pub fn schedule_in(mut self, delay: Duration) -> Self {
        let due = chrono::Duration::from_std(delay)
            .ok()
            .and_then(|delay| Utc::now().checked_add_signed(delay))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.schedule_for = Some(due);
        self
    }

    /// Resolve the effective budget against the configured default
    pub fn effective_max_attempts(&self, default: u32) -> u32 {
        match self.max_attempts {
            Some(n) if n > 0 => n,
            _ => default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_payload() -> Payload {
        let mut payload = Payload::new();
        payload.insert("symbol".to_string(), json!("BTC-USD"));
        payload.insert("qty".to_string(), json!(0.25));
        payload
    }

    #[test]
    fn test_new_job_defaults() {
        let job = Job::new("execute_order", sample_payload(), JobPriority::High);
        assert_eq!(job.attempts, 0);
        assert_eq!(job.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert!(job.scheduled_for.is_none());
        assert!(job.can_retry());
        assert!(job.last_error().is_none());
    }

    #[test]
    fn test_serialized_field_names() {
        let job = Job::new("notify", sample_payload(), JobPriority::Critical);
        let value = serde_json::to_value(&job).unwrap();
        let object = value.as_object().unwrap();

        for key in ["id", "type", "payload", "priority", "created_at", "attempts", "max_attempts"] {
            assert!(object.contains_key(key), "missing key {key}");
        }
        assert!(!object.contains_key("scheduled_for"));
        assert_eq!(object["priority"], json!(3));
        assert_eq!(object["type"], json!("notify"));
    }

    #[test]
    fn test_round_trip_preserves_every_field() {
        let mut job = Job::new("rescore", sample_payload(), JobPriority::Low);
        job.scheduled_for = Some(Utc::now() + chrono::Duration::minutes(5));
        job.attempts = 2;
        job.max_attempts = 5;
        job.record_error("exchange timeout");

        let encoded = serde_json::to_string(&job).unwrap();
        let decoded: Job = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, job);
        assert_eq!(decoded.last_error(), Some("exchange timeout"));
    }

    #[test]
    fn test_effective_max_attempts() {
        assert_eq!(EnqueueOptions::new().effective_max_attempts(3), 3);
        assert_eq!(EnqueueOptions::new().with_max_attempts(0).effective_max_attempts(3), 3);
        assert_eq!(EnqueueOptions::new().with_max_attempts(7).effective_max_attempts(3), 7);
    }

    #[test]
    fn test_is_due() {
        let now = Utc::now();
        let mut job = Job::new("rescore", Payload::new(), JobPriority::Normal);
        assert!(job.is_due(now));
        job.scheduled_for = Some(now + chrono::Duration::seconds(1));
        assert!(!job.is_due(now));
        assert!(job.is_due(now + chrono::Duration::seconds(1)));
    }
}

//! Store key layout for one queue namespace.
//!
//! `{ns}:queue:{priority}` for the four lanes, `{ns}:scheduled` for deferred
//! jobs, `{ns}:deadletter` for exhausted jobs.

use crate::JobPriority;

/// Derived key names for one namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueKeys {
    namespace: String,
    lanes: [String; 4],
    scheduled: String,
    dead_letter: String,
}

impl QueueKeys {
    pub fn new(namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        let lane = |p: JobPriority| format!("{}:queue:{}", namespace, p.name());

        Self {
            lanes: [
                lane(JobPriority::Low),
                lane(JobPriority::Normal),
                lane(JobPriority::High),
                lane(JobPriority::Critical),
            ],
            scheduled: format!("{}:scheduled", namespace),
            dead_letter: format!("{}:deadletter", namespace),
            namespace,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Lane key for a priority
    pub fn lane(&self, priority: JobPriority) -> &str {
        &self.lanes[priority.as_u8() as usize]
    }

    pub fn scheduled(&self) -> &str {
        &self.scheduled
    }

    pub fn dead_letter(&self) -> &str {
        &self.dead_letter
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{JobId, JobPriority};

/// Structured lifecycle events published by the queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JobEvent {
    /// Job was accepted into a lane or the scheduled set
    Enqueued {
        job_id: JobId,
        job_type: String,
        priority: JobPriority,
        scheduled_for: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    },

    /// Due scheduled job moved into its lane
    Promoted {
        job_id: JobId,
        priority: JobPriority,
        at: DateTime<Utc>,
    },

    /// Job was handed to a consumer
    Dequeued {
        job_id: JobId,
        attempts: u32,
        at: DateTime<Utc>,
    },

    /// Failed job went back to the front of its lane
    Retrying {
        job_id: JobId,
        attempts: u32,
        error: String,
        at: DateTime<Utc>,
    },

    /// Job exhausted its budget
    DeadLettered {
        job_id: JobId,
        error: String,
        at: DateTime<Utc>,
    },

    /// Consumer reported success
    Completed {
        job_id: JobId,
        at: DateTime<Utc>,
    },

    /// Dead-lettered job was put back into circulation
    Replayed {
        job_id: JobId,
        at: DateTime<Utc>,
    },

    /// Dead-letter store was emptied
    DeadLetterCleared {
        removed: usize,
        at: DateTime<Utc>,
    },
}

impl JobEvent {
    /// Get event type name as string
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Enqueued { .. } => "enqueued",
            Self::Promoted { .. } => "promoted",
            Self::Dequeued { .. } => "dequeued",
            Self::Retrying { .. } => "retrying",
            Self::DeadLettered { .. } => "dead_lettered",
            Self::Completed { .. } => "completed",
            Self::Replayed { .. } => "replayed",
            Self::DeadLetterCleared { .. } => "dead_letter_cleared",
        }
    }

    /// Get the job ID, for events about a single job
    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            Self::Enqueued { job_id, .. }
            | Self::Promoted { job_id, .. }
            | Self::Dequeued { job_id, .. }
            | Self::Retrying { job_id, .. }
            | Self::DeadLettered { job_id, .. }
            | Self::Completed { job_id, .. }
            | Self::Replayed { job_id, .. } => Some(job_id),
            Self::DeadLetterCleared { .. } => None,
        }
    }

    /// Get the timestamp from any event
    pub fn timestamp(&self) -> &DateTime<Utc> {
        match self {
            Self::Enqueued { at, .. }
            | Self::Promoted { at, .. }
            | Self::Dequeued { at, .. }
            | Self::Retrying { at, .. }
            | Self::DeadLettered { at, .. }
            | Self::Completed { at, .. }
            | Self::Replayed { at, .. }
            | Self::DeadLetterCleared { at, .. } => at,
        }
    }
}

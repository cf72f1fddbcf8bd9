use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DeadLetterId, Job};

/// A job that exhausted its retry budget, with the failure that sank it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterRecord {
    /// Unique record identifier (distinct from the job id)
    pub id: DeadLetterId,

    /// The job as it was when it failed for the last time
    pub job: Job,

    /// Final error message
    pub error: String,

    /// When the job was dead-lettered
    pub failed_at: DateTime<Utc>,
}

impl DeadLetterRecord {
    pub fn new(job: Job, error: impl Into<String>) -> Self {
        Self {
            id: DeadLetterId::new(),
            job,
            error: error.into(),
            failed_at: Utc::now(),
        }
    }
}

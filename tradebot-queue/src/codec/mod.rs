pub mod json;

use crate::{QueueResult, Job, DeadLetterRecord};

/// Converts queue records to and from the string form kept in the store.
///
/// The same encoded string is used as the list element / sorted-set member,
/// so an implementation must be deterministic for a given value.
pub trait JobCodec: Send + Sync {
    fn encode_job(&self, job: &Job) -> QueueResult<String>;

    fn decode_job(&self, raw: &str) -> QueueResult<Job>;

    fn encode_dead_letter(&self, record: &DeadLetterRecord) -> QueueResult<String>;

    fn decode_dead_letter(&self, raw: &str) -> QueueResult<DeadLetterRecord>;

    /// Get codec identifier
    fn codec_id(&self) -> &'static str;
}

pub use json::JsonCodec;

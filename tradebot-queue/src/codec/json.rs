use crate::{QueueResult, QueueError, Job, DeadLetterRecord, codec::JobCodec};

/// JSON codec matching the persisted record layout
#[derive(Debug, Clone, Default)]
pub struct JsonCodec;

impl JobCodec for JsonCodec {
    fn encode_job(&self, job: &Job) -> QueueResult<String> {
        serde_json::to_string(job).map_err(|e| QueueError::serialization("encode job", e))
    }

    fn decode_job(&self, raw: &str) -> QueueResult<Job> {
        serde_json::from_str(raw).map_err(|e| QueueError::serialization("decode job", e))
    }

    fn encode_dead_letter(&self, record: &DeadLetterRecord) -> QueueResult<String> {
        serde_json::to_string(record).map_err(|e| QueueError::serialization("encode dead letter", e))
    }

    fn decode_dead_letter(&self, raw: &str) -> QueueResult<DeadLetterRecord> {
        serde_json::from_str(raw).map_err(|e| QueueError::serialization("decode dead letter", e))
    }

    fn codec_id(&self) -> &'static str {
        "json"
    }
}

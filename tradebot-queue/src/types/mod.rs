pub mod ids;
pub mod job;
pub mod priority;
pub mod dead_letter;
pub mod depth;
pub mod events;

pub use ids::{JobId, DeadLetterId};
pub use job::{Job, Payload, EnqueueOptions, ERROR_KEY, DEFAULT_MAX_ATTEMPTS};
pub use priority::JobPriority;
pub use dead_letter::DeadLetterRecord;
pub use depth::QueueDepth;
pub use events::JobEvent;

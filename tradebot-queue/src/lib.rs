//! # tradebot-queue: Priority job queue for the trading bot backend
//!
//! Background work (order execution, notifications, rescoring) flows through
//! four priority lanes in a shared store, with deferred delivery, bounded
//! retries and a dead-letter store for jobs that keep failing.
//!
//! ## Features
//!
//! - **Strict priority**: `CRITICAL > HIGH > NORMAL > LOW`, FIFO within a lane
//! - **Scheduled jobs**: due jobs are promoted on every dequeue
//! - **Retry-first**: a failed job is served before first-attempt jobs of its lane
//! - **Dead letters**: inspect, clear or replay jobs that exhausted their budget
//! - **Shared store**: any number of producers and consumers per namespace;
//!   in-memory for tests, Redis for production (`redis` feature)
//! - **Structured observability**: `tracing` spans, an event stream and live counters
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tradebot_queue::prelude::*;
//! use serde_json::json;
//!
//! # async fn run() -> QueueResult<()> {
//! let queue = Queue::new(MemoryBackend::new());
//!
//! let mut payload = Payload::new();
//! payload.insert("symbol".to_string(), json!("BTC-USD"));
//! queue.enqueue("execute_order", payload, JobPriority::Critical).await?;
//!
//! if let Some(job) = queue.dequeue().await? {
//!     match place_order(&job).await {
//!         Ok(()) => queue.complete(&job).await?,
//!         Err(e) => {
//!             queue.fail(job, e).await?;
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! # async fn place_order(_job: &Job) -> Result<(), String> { Ok(()) }
//! ```
//!
//! ## Store layout
//!
//! With namespace `ns` (default `jobs`):
//!
//! | Key                | Kind       | Contents                              |
//! |--------------------|------------|---------------------------------------|
//! | `ns:queue:low` ... | list       | encoded jobs, one lane per priority   |
//! | `ns:scheduled`     | sorted set | encoded jobs scored by due time       |
//! | `ns:deadletter`    | list       | encoded dead-letter records, newest first |

pub mod config;
pub mod keys;
pub mod types;
pub mod error;
pub mod codec;
pub mod backend;
pub mod queue;
pub mod worker;
pub mod observability;

// Core API exports
pub use queue::{Queue, FailOutcome};
pub use types::{
    JobId, DeadLetterId, Job, Payload, EnqueueOptions, JobPriority,
    DeadLetterRecord, QueueDepth, JobEvent, ERROR_KEY, DEFAULT_MAX_ATTEMPTS,
};
pub use error::{QueueError, QueueResult, JobError};
pub use config::{QueueConfig, WorkerConfig};
pub use keys::QueueKeys;
pub use codec::{JobCodec, JsonCodec};
pub use backend::{QueueBackend, ListEnd};
pub use worker::{JobHandler, HandlerRegistry, Worker, WorkerHandle};

// Observability exports
pub use observability::{ObservabilityLayer, LiveMetrics, MetricsSnapshot};

#[cfg(feature = "tracing-basic")]
pub use observability::{init_tracing, LogFormat};

// Backend implementations
#[cfg(feature = "memory")]
pub use backend::memory::MemoryBackend;

#[cfg(feature = "redis")]
pub use backend::redis::RedisBackend;

/// Common imports for producers and consumers
pub mod prelude {
    pub use crate::{
        Queue, FailOutcome, QueueBackend, QueueConfig, WorkerConfig,
    };

    pub use crate::{
        Job, JobId, JobPriority, Payload, EnqueueOptions, DeadLetterRecord,
        QueueDepth, JobError, QueueError, QueueResult,
    };

    pub use crate::{JobHandler, HandlerRegistry, Worker, WorkerHandle};

    pub use crate::{ObservabilityLayer, JobEvent};

    #[cfg(feature = "memory")]
    pub use crate::MemoryBackend;

    #[cfg(feature = "redis")]
    pub use crate::RedisBackend;

    pub use async_trait::async_trait;
}

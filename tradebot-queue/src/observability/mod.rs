pub mod metrics;
pub mod layer;

#[cfg(feature = "tracing-basic")]
pub mod tracing;

use futures_core::Stream;
use std::pin::Pin;

pub use metrics::{LiveMetrics, JobTypeMetrics, MetricsSnapshot};
pub use layer::ObservabilityLayer;

#[cfg(feature = "tracing-basic")]
pub use self::tracing::{init_tracing, LogFormat};

/// Type alias for boxed streams (stable Rust compatible)
pub type BoxStream<T> = Pin<Box<dyn Stream<Item = T> + Send + 'static>>;

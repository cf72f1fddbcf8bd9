//! Queue and worker configuration.
//!
//! Values have defaults and can be overridden from the environment using the
//! `TRADEBOT_QUEUE__` prefix:
//!
//! ```bash
//! export TRADEBOT_QUEUE__NAMESPACE=bot
//! export TRADEBOT_QUEUE__REDIS_URL=redis://127.0.0.1:6379
//! export TRADEBOT_QUEUE__DEFAULT_MAX_ATTEMPTS=5
//! ```

use std::time::Duration;

use crate::{QueueError, QueueResult, types::DEFAULT_MAX_ATTEMPTS};

/// Environment prefix read by [`QueueConfig::from_env`]
pub const ENV_PREFIX: &str = "TRADEBOT_QUEUE__";

/// Default key namespace
pub const DEFAULT_NAMESPACE: &str = "jobs";

/// Configuration for the queue façade
#[derive(Debug, Clone, PartialEq)]
pub struct QueueConfig {
    /// Prefix shared by every key of one deployment
    pub namespace: String,
    /// Retry budget applied when an enqueue does not give one
    pub default_max_attempts: u32,
    /// First sleep between passes of `dequeue_with_timeout`
    pub poll_interval: Duration,
    /// Cap for the doubling poll sleep
    pub max_poll_interval: Duration,
    /// Redis connection URL (only used by the Redis backend)
    pub redis_url: Option<String>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            default_max_attempts: DEFAULT_MAX_ATTEMPTS,
            poll_interval: Duration::from_millis(50),
            max_poll_interval: Duration::from_secs(1),
            redis_url: None,
        }
    }
}

impl QueueConfig {
    /// Set the namespace
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the Redis URL
    pub fn with_redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = Some(url.into());
        self
    }

    /// Load from process environment on top of the defaults
    pub fn from_env() -> QueueResult<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Load from an arbitrary set of `(key, value)` pairs carrying [`ENV_PREFIX`]
    pub fn from_vars<I, K, V>(vars: I) -> QueueResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut config = Self::default();

        for (key, value) in vars {
            let Some(name) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value: String = value.into();

            match name.to_lowercase().as_str() {
                "namespace" => config.namespace = value,
                "redis_url" => config.redis_url = Some(value),
                "default_max_attempts" => {
                    config.default_max_attempts = parse_number(name, &value)?;
                }
                "poll_interval_ms" => {
                    config.poll_interval = Duration::from_millis(parse_number(name, &value)?);
                }
                "max_poll_interval_ms" => {
                    config.max_poll_interval = Duration::from_millis(parse_number(name, &value)?);
                }
                _ => {}
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations no queue can run with
    pub fn validate(&self) -> QueueResult<()> {
        if self.namespace.trim().is_empty() {
            return Err(QueueError::Configuration("namespace must not be empty".to_string()));
        }
        if self.default_max_attempts == 0 {
            return Err(QueueError::Configuration(
                "default_max_attempts must be at least 1".to_string(),
            ));
        }
        if self.poll_interval.is_zero() || self.poll_interval > self.max_poll_interval {
            return Err(QueueError::Configuration(format!(
                "poll_interval ({:?}) must be non-zero and not exceed max_poll_interval ({:?})",
                self.poll_interval, self.max_poll_interval
            )));
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> QueueResult<T> {
    value.trim().parse().map_err(|_| {
        QueueError::Configuration(format!("{}{} is not a valid number: {:?}", ENV_PREFIX, name, value))
    })
}

/// Configuration for a background [`Worker`](crate::Worker)
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    /// Sleep when no job was available
    pub idle_backoff: Duration,
    /// Sleep after a backend failure
    pub error_backoff: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            idle_backoff: Duration::from_millis(100),
            error_backoff: Duration::from_secs(1),
        }
    }
}

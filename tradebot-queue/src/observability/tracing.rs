//! Subscriber setup for binaries and tests that embed the queue.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::{QueueError, QueueResult};

/// Output format of the installed subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Install a global `fmt` subscriber filtered by `RUST_LOG`, falling back to
/// `default_filter` (e.g. `"tradebot_queue=info"`).
pub fn init_tracing(default_filter: &str, format: LogFormat) -> QueueResult<()> {
    let from_env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(from_env.as_deref(), default_filter)?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).try_init(),
        LogFormat::Json => registry.with(fmt::layer().json().with_current_span(true)).try_init(),
    };

    result.map_err(|e| QueueError::Internal(format!("tracing already initialized: {}", e)))
}

/// `RUST_LOG` directives when they parse, otherwise `default_filter`
fn build_filter(from_env: Option<&str>, default_filter: &str) -> QueueResult<EnvFilter> {
    match from_env.and_then(|directives| EnvFilter::try_new(directives).ok()) {
        Some(filter) => Ok(filter),
        None => EnvFilter::try_new(default_filter)
            .map_err(|e| QueueError::Configuration(format!("invalid log filter: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_default_filter_is_configuration_error() {
        let err = build_filter(None, "tradebot_queue=bogus").unwrap_err();
        assert!(matches!(err, QueueError::Configuration(_)));
    }

    #[test]
    fn test_env_directives_take_precedence() {
        let filter = build_filter(Some("tradebot_queue=debug"), "tradebot_queue=bogus").unwrap();
        assert!(filter.to_string().contains("tradebot_queue=debug"));
    }

    #[test]
    fn test_unparsable_env_falls_back_to_default() {
        let filter = build_filter(Some("tradebot_queue=bogus"), "info").unwrap();
        assert!(filter.to_string().contains("info"));
        assert!(!filter.to_string().contains("bogus"));
    }
}

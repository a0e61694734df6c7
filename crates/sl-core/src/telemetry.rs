//! Process diagnostics via the tracing ecosystem.
//!
//! This covers the crate's own operational output (startup, delivery
//! failures, middleware traces); application log entries go through
//! [`crate::logger::Logger`] instead.

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Subscriber configuration.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Default level when `RUST_LOG` is unset.
    pub level: Level,
    /// Emit JSON lines instead of human-readable output.
    pub json_format: bool,
    /// Include span open/close events.
    pub include_spans: bool,
    /// Include module path targets.
    pub include_target: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            include_spans: true,
            include_target: true,
        }
    }
}

impl TelemetryConfig {
    /// Verbose output for local development.
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            ..Self::default()
        }
    }

    /// JSON output for production.
    pub fn production() -> Self {
        Self {
            level: Level::INFO,
            json_format: true,
            include_spans: false,
            include_target: true,
        }
    }
}

/// Initializes the global subscriber with default configuration.
pub fn init_telemetry() {
    init_telemetry_with_config(TelemetryConfig::default());
}

/// Initializes the global subscriber.
///
/// `RUST_LOG` takes precedence over the configured level when set.
pub fn init_telemetry_with_config(config: TelemetryConfig) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "sl_core={0},sl_client={0},sl_api={0}",
            config.level
        ))
    });

    let span_events = if config.include_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    if config.json_format {
        let fmt_layer = fmt::layer()
            .json()
            .with_span_events(span_events)
            .with_target(config.include_target);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .init();
    } else {
        let fmt_layer = fmt::layer()
            .with_span_events(span_events)
            .with_target(config.include_target);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.level, Level::INFO);
        assert!(!config.json_format);
    }

    #[test]
    fn test_development_config() {
        let config = TelemetryConfig::development();
        assert_eq!(config.level, Level::DEBUG);
        assert!(!config.json_format);
    }

    #[test]
    fn test_production_config() {
        let config = TelemetryConfig::production();
        assert_eq!(config.level, Level::INFO);
        assert!(config.json_format);
        assert!(!config.include_spans);
    }
}

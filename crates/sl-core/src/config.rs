//! Logging configuration.
//!
//! The level threshold and production flag are resolved once at startup and
//! threaded through logger construction, rather than read from the
//! environment on every call.

use crate::level::LogLevel;
use std::env;

/// Returns true when the process runs with `APP_ENV=production`.
pub fn is_production_environment() -> bool {
    env::var("APP_ENV")
        .map(|v| v.eq_ignore_ascii_case("production"))
        .unwrap_or(false)
}

/// Process-wide logging configuration.
///
/// Built once (usually via [`LogConfig::from_env`]) and shared across
/// loggers behind an `Arc`.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum level; entries below it are dropped without side effects.
    pub min_level: LogLevel,
    /// Production flag; gates stack traces and console mirroring.
    pub production: bool,
}

impl LogConfig {
    pub fn new(min_level: LogLevel, production: bool) -> Self {
        Self {
            min_level,
            production,
        }
    }

    /// Resolves configuration from `LOG_LEVEL` and `APP_ENV`.
    ///
    /// An invalid or absent `LOG_LEVEL` falls back to `info` in production
    /// and `debug` otherwise.
    pub fn from_env() -> Self {
        let production = is_production_environment();
        let min_level = resolve_level(env::var("LOG_LEVEL").ok().as_deref(), production);
        Self {
            min_level,
            production,
        }
    }

    /// Verbose configuration for local development.
    pub fn development() -> Self {
        Self::new(LogLevel::Debug, false)
    }

    /// Production configuration.
    pub fn production() -> Self {
        Self::new(LogLevel::Info, true)
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::development()
    }
}

fn resolve_level(raw: Option<&str>, production: bool) -> LogLevel {
    let fallback = if production {
        LogLevel::Info
    } else {
        LogLevel::Debug
    };
    raw.and_then(|v| v.parse().ok()).unwrap_or(fallback)
}

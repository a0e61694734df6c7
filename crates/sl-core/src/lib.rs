//! # sl-core
//!
//! Core logging primitives for Stacklight.
//!
//! This crate provides the log level ordering, payload sanitization,
//! the structured server-side logger with scoped contexts, logging
//! configuration, and tracing-subscriber initialization.

pub mod config;
pub mod entry;
pub mod level;
pub mod logger;
pub mod sanitize;
pub mod telemetry;

pub use config::{is_production_environment, LogConfig};
pub use entry::{ErrorInfo, LogEntry};
pub use level::{LogLevel, ParseLevelError};
pub use logger::{ConsoleSink, LogSink, Logger, MemorySink, Timer};
pub use sanitize::{is_sensitive_key, sanitize};

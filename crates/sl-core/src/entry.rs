//! Structured log entry model.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::level::LogLevel;

/// One structured observation emitted by a logger.
///
/// Serialized as a single JSON line; optional sections are omitted entirely
/// when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// RFC-3339 timestamp, generated at emission time.
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
    /// Persistent key/value metadata from the logger's scope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,
    /// Per-call fields, sanitized before emission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

/// Structured capture of an error attached to an entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub name: String,
    pub message: String,
    /// Cause chain; omitted in production.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorInfo {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack: None,
        }
    }

    /// Captures a standard error, walking its source chain into `stack`
    /// when `include_stack` is set.
    pub fn from_error(err: &(dyn std::error::Error), include_stack: bool) -> Self {
        let stack = if include_stack {
            let mut frames = Vec::new();
            let mut source = err.source();
            while let Some(cause) = source {
                frames.push(cause.to_string());
                source = cause.source();
            }
            if frames.is_empty() {
                None
            } else {
                Some(frames.join("\ncaused by: "))
            }
        } else {
            None
        };

        Self {
            name: "Error".to_string(),
            message: err.to_string(),
            stack,
        }
    }
}

impl LogEntry {
    /// Creates an entry stamped with the current time.
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            level,
            message: message.into(),
            context: None,
            data: None,
            error: None,
        }
    }

    /// Renders the entry as a single JSON line.
    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":\"log serialization failed\"}}",
                self.timestamp, self.level
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_sections_are_omitted() {
        let entry = LogEntry::new(LogLevel::Info, "hello");
        let line = entry.to_json_line();
        assert!(line.contains("\"level\":\"info\""));
        assert!(line.contains("\"message\":\"hello\""));
        assert!(!line.contains("context"));
        assert!(!line.contains("\"data\""));
        assert!(!line.contains("\"error\""));
    }

    #[test]
    fn test_error_info_captures_source_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let info = ErrorInfo::from_error(&io, true);
        assert_eq!(info.name, "Error");
        assert_eq!(info.message, "disk on fire");
        // io::Error has no source here
        assert!(info.stack.is_none());
    }

    #[test]
    fn test_error_info_excludes_stack_when_disabled() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let info = ErrorInfo::from_error(&io, false);
        assert!(info.stack.is_none());
    }
}

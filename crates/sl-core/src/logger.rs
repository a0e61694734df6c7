//! Scoped, leveled server logger.
//!
//! Each [`Logger`] owns an immutable context map; [`Logger::child`] derives
//! a new logger with merged context without touching the parent. Entries are
//! rendered as single JSON lines and written through a [`LogSink`], which is
//! the seam between entry construction and the process's output streams.

use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use crate::config::LogConfig;
use crate::entry::{ErrorInfo, LogEntry};
use crate::level::LogLevel;
use crate::sanitize::sanitize;

/// Destination for rendered log lines.
pub trait LogSink: Send + Sync {
    fn write(&self, level: LogLevel, line: &str);
}

/// Writes warn/error lines to stderr and everything else to stdout.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl LogSink for ConsoleSink {
    fn write(&self, level: LogLevel, line: &str) {
        match level {
            LogLevel::Warn | LogLevel::Error => eprintln!("{line}"),
            _ => println!("{line}"),
        }
    }
}

/// Captures lines in memory. Used by tests and local tooling.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<(LogLevel, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all captured lines in emission order.
    pub fn lines(&self) -> Vec<(LogLevel, String)> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns captured lines parsed back into JSON values.
    pub fn entries(&self) -> Vec<Value> {
        self.lines()
            .iter()
            .filter_map(|(_, line)| serde_json::from_str(line).ok())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LogSink for MemorySink {
    fn write(&self, level: LogLevel, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((level, line.to_string()));
    }
}

/// Scoped structured logger.
#[derive(Clone)]
pub struct Logger {
    context: Map<String, Value>,
    config: Arc<LogConfig>,
    sink: Arc<dyn LogSink>,
}

impl Logger {
    /// Creates a logger writing to the console.
    pub fn new(config: Arc<LogConfig>) -> Self {
        Self::with_sink(config, Arc::new(ConsoleSink))
    }

    /// Creates a logger writing through the given sink.
    pub fn with_sink(config: Arc<LogConfig>, sink: Arc<dyn LogSink>) -> Self {
        Self {
            context: Map::new(),
            config,
            sink,
        }
    }

    /// Derives a child logger whose context is the union of this logger's
    /// context and `additional` (additional keys win on conflict). The
    /// parent is unaffected.
    ///
    /// `additional` is expected to be a JSON object; any other value is
    /// ignored.
    pub fn child(&self, additional: Value) -> Logger {
        let mut context = self.context.clone();
        if let Value::Object(extra) = additional {
            context.extend(extra);
        }
        Logger {
            context,
            config: self.config.clone(),
            sink: self.sink.clone(),
        }
    }

    fn log(&self, level: LogLevel, message: &str, data: Option<Value>, error: Option<ErrorInfo>) {
        if level < self.config.min_level {
            return;
        }

        let mut entry = LogEntry::new(level, message);
        if !self.context.is_empty() {
            entry.context = Some(self.context.clone());
        }
        if let Some(data) = data {
            let non_empty = match &data {
                Value::Object(map) => !map.is_empty(),
                Value::Null => false,
                _ => true,
            };
            if non_empty {
                entry.data = Some(sanitize(&data));
            }
        }
        entry.error = error;

        self.sink.write(level, &entry.to_json_line());
    }

    pub fn debug(&self, message: &str, data: Option<Value>) {
        self.log(LogLevel::Debug, message, data, None);
    }

    pub fn info(&self, message: &str, data: Option<Value>) {
        self.log(LogLevel::Info, message, data, None);
    }

    pub fn warn(&self, message: &str, data: Option<Value>) {
        self.log(LogLevel::Warn, message, data, None);
    }

    /// Logs at error level, capturing the error's message and, outside
    /// production, its cause chain.
    pub fn error(
        &self,
        message: &str,
        error: Option<&(dyn std::error::Error)>,
        data: Option<Value>,
    ) {
        let info = error.map(|e| ErrorInfo::from_error(e, !self.config.production));
        self.log(LogLevel::Error, message, data, info);
    }

    /// Logs at error level with a pre-built [`ErrorInfo`]. The stack is
    /// stripped in production.
    pub fn error_info(&self, message: &str, mut error: ErrorInfo, data: Option<Value>) {
        if self.config.production {
            error.stack = None;
        }
        self.log(LogLevel::Error, message, data, Some(error));
    }

    /// Logs a non-error throwable at error level, folding the value into
    /// `data` under `errorValue` so nothing is lost.
    pub fn error_value(&self, message: &str, value: Value, data: Option<Value>) {
        let mut map = match data {
            Some(Value::Object(m)) => m,
            _ => Map::new(),
        };
        map.insert("errorValue".to_string(), value);
        self.log(LogLevel::Error, message, Some(Value::Object(map)), None);
    }

    /// Logs an HTTP request. Escalates to warn when the status is >= 400.
    pub fn request(
        &self,
        method: &str,
        url: &str,
        status_code: Option<u16>,
        duration_ms: Option<u64>,
        extra: Option<Value>,
    ) {
        let level = if status_code.is_some_and(|s| s >= 400) {
            LogLevel::Warn
        } else {
            LogLevel::Info
        };
        let mut data = Map::new();
        data.insert("method".to_string(), json!(method));
        data.insert("url".to_string(), json!(url));
        if let Some(status) = status_code {
            data.insert("statusCode".to_string(), json!(status));
        }
        if let Some(duration) = duration_ms {
            data.insert("durationMs".to_string(), json!(duration));
        }
        merge_extra(&mut data, extra);
        self.log(level, "HTTP Request", Some(Value::Object(data)), None);
    }

    /// Logs a database operation at debug level.
    pub fn db(&self, operation: &str, table: &str, duration_ms: Option<u64>, extra: Option<Value>) {
        let mut data = Map::new();
        data.insert("operation".to_string(), json!(operation));
        data.insert("table".to_string(), json!(table));
        if let Some(duration) = duration_ms {
            data.insert("durationMs".to_string(), json!(duration));
        }
        merge_extra(&mut data, extra);
        self.log(
            LogLevel::Debug,
            "Database Operation",
            Some(Value::Object(data)),
            None,
        );
    }

    /// Logs an external API call. Escalates to warn when the status is >= 400.
    pub fn external(
        &self,
        service: &str,
        endpoint: &str,
        status_code: Option<u16>,
        duration_ms: Option<u64>,
    ) {
        let level = if status_code.is_some_and(|s| s >= 400) {
            LogLevel::Warn
        } else {
            LogLevel::Debug
        };
        let mut data = Map::new();
        data.insert("service".to_string(), json!(service));
        data.insert("endpoint".to_string(), json!(endpoint));
        if let Some(status) = status_code {
            data.insert("statusCode".to_string(), json!(status));
        }
        if let Some(duration) = duration_ms {
            data.insert("durationMs".to_string(), json!(duration));
        }
        self.log(level, "External API Call", Some(Value::Object(data)), None);
    }

    /// Logs a performance measurement. Escalates to warn past 5000 ms.
    pub fn perf(&self, operation: &str, duration_ms: u64, extra: Option<Value>) {
        let level = if duration_ms > 5000 {
            LogLevel::Warn
        } else {
            LogLevel::Debug
        };
        let mut data = Map::new();
        data.insert("operation".to_string(), json!(operation));
        data.insert("durationMs".to_string(), json!(duration_ms));
        merge_extra(&mut data, extra);
        self.log(level, "Performance", Some(Value::Object(data)), None);
    }

    /// Logs a user action for the audit trail; `user_id` joins the context.
    pub fn audit(&self, action: &str, user_id: &str, resource: &str, extra: Option<Value>) {
        let scoped = self.child(json!({ "userId": user_id }));
        let mut data = Map::new();
        data.insert("action".to_string(), json!(action));
        data.insert("resource".to_string(), json!(resource));
        merge_extra(&mut data, extra);
        scoped.log(LogLevel::Info, "Audit", Some(Value::Object(data)), None);
    }

    /// Starts an independent duration timer.
    pub fn start_timer(&self) -> Timer {
        Timer {
            start: Instant::now(),
        }
    }
}

fn merge_extra(data: &mut Map<String, Value>, extra: Option<Value>) {
    if let Some(Value::Object(map)) = extra {
        data.extend(map);
    }
}

/// Measures elapsed wall-clock time from its creation.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Elapsed time in whole milliseconds, rounded to nearest.
    pub fn elapsed_ms(&self) -> u64 {
        (self.start.elapsed().as_secs_f64() * 1000.0).round() as u64
    }
}

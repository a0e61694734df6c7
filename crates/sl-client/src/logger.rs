//! Batching client logger.
//!
//! Entries are appended to a mutex-guarded queue and flushed in batches:
//! immediately when the queue reaches capacity, otherwise after a debounce
//! delay from the most recent emission. The flush swaps the queue for an
//! empty one before any delivery await, so entries emitted while a send is
//! in flight accumulate into the next batch rather than being lost or sent
//! twice. Failed batches are written to the console and never retried.

use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

use sl_core::{is_production_environment, ErrorInfo, LogLevel};

use crate::entry::{ClientLogEntry, PageContext};
use crate::transport::LogTransport;

/// Queue capacity that forces an immediate flush.
pub const MAX_QUEUE_SIZE: usize = 10;

/// Debounce delay between the last emission and a timed flush.
pub const FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// Client logger configuration.
#[derive(Debug, Clone)]
pub struct ClientLoggerConfig {
    pub max_queue_size: usize,
    pub flush_interval: Duration,
    /// Mirror every entry to the console immediately, independent of
    /// batching. Defaults to on outside production.
    pub mirror_to_console: bool,
    pub page: PageContext,
}

impl Default for ClientLoggerConfig {
    fn default() -> Self {
        Self {
            max_queue_size: MAX_QUEUE_SIZE,
            flush_interval: FLUSH_INTERVAL,
            mirror_to_console: !is_production_environment(),
            page: PageContext::default(),
        }
    }
}

struct Inner {
    queue: Mutex<Vec<ClientLogEntry>>,
    pending_flush: Mutex<Option<JoinHandle<()>>>,
    transport: Arc<dyn LogTransport>,
    config: ClientLoggerConfig,
}

impl Inner {
    async fn flush(inner: Arc<Inner>) {
        let batch = {
            let mut queue = lock(&inner.queue);
            if queue.is_empty() {
                return;
            }
            std::mem::take(&mut *queue)
        };

        if let Err(err) = inner.transport.send(&batch).await {
            tracing::warn!(
                error = %err,
                batch_size = batch.len(),
                "log delivery failed, writing batch to console"
            );
            for entry in &batch {
                println!(
                    "[ClientLog] {}",
                    serde_json::to_string(entry).unwrap_or_default()
                );
            }
        }
    }
}

/// Batching client logger. Cheap to clone; clones share the queue.
#[derive(Clone)]
pub struct ClientLogger {
    inner: Arc<Inner>,
    component: Option<String>,
}

impl ClientLogger {
    /// Creates a logger with default configuration.
    pub fn new(transport: Arc<dyn LogTransport>) -> Self {
        Self::with_config(transport, ClientLoggerConfig::default())
    }

    pub fn with_config(transport: Arc<dyn LogTransport>, config: ClientLoggerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                queue: Mutex::new(Vec::new()),
                pending_flush: Mutex::new(None),
                transport,
                config,
            }),
            component: None,
        }
    }

    /// Returns a logger scoped to a component; entries it emits carry the
    /// component name. The queue is shared with the parent.
    pub fn scoped(&self, component: &str) -> ClientLogger {
        ClientLogger {
            inner: self.inner.clone(),
            component: Some(component.to_string()),
        }
    }

    pub fn debug(&self, message: &str, data: Option<Value>) {
        self.emit(LogLevel::Debug, message, None, data, None);
    }

    pub fn info(&self, message: &str, data: Option<Value>) {
        self.emit(LogLevel::Info, message, None, data, None);
    }

    pub fn warn(&self, message: &str, data: Option<Value>) {
        self.emit(LogLevel::Warn, message, None, data, None);
    }

    pub fn error(&self, message: &str, error: Option<ErrorInfo>, data: Option<Value>) {
        self.emit(LogLevel::Error, message, None, data, error);
    }

    /// Records a discrete user-interaction event.
    pub fn event(&self, action: &str, data: Option<Value>) {
        self.emit(
            LogLevel::Info,
            &format!("User action: {action}"),
            Some(action),
            data,
            None,
        );
    }

    /// Records a component mount.
    pub fn mount(&self, data: Option<Value>) {
        self.emit(LogLevel::Debug, "Component mounted", Some("mount"), data, None);
    }

    /// Records a navigation between pages.
    pub fn navigation(&self, from: &str, to: &str) {
        self.emit(
            LogLevel::Info,
            "Navigation",
            Some("navigation"),
            Some(json!({ "from": from, "to": to })),
            None,
        );
    }

    /// Records a performance timing.
    pub fn timing(&self, operation: &str, duration_ms: u64) {
        self.emit(
            LogLevel::Debug,
            &format!("Timing: {operation}"),
            Some("timing"),
            Some(json!({ "operation": operation, "durationMs": duration_ms })),
            None,
        );
    }

    pub(crate) fn emit(
        &self,
        level: LogLevel,
        message: &str,
        action: Option<&str>,
        data: Option<Value>,
        error: Option<ErrorInfo>,
    ) {
        let mut entry = ClientLogEntry::new(level, message, &self.inner.config.page);
        entry.component = self.component.clone();
        entry.action = action.map(str::to_string);
        entry.data = data;
        entry.error = error;

        if self.inner.config.mirror_to_console {
            mirror(&entry);
        }

        let at_capacity = {
            let mut queue = lock(&self.inner.queue);
            queue.push(entry);
            queue.len() >= self.inner.config.max_queue_size
        };

        self.schedule_flush(at_capacity);
    }

    /// Cancels any pending timer and (re)schedules delivery: immediately at
    /// capacity, otherwise one debounce interval from now.
    fn schedule_flush(&self, immediate: bool) {
        // Without a runtime (e.g. inside a panic hook) entries stay queued
        // until the next trigger or flush_on_close.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let mut pending = lock(&self.inner.pending_flush);
        if let Some(task) = pending.take() {
            task.abort();
        }

        let inner = self.inner.clone();
        if immediate {
            handle.spawn(async move { Inner::flush(inner).await });
        } else {
            let delay = self.inner.config.flush_interval;
            // Only the sleep is abortable: the flush runs detached, so
            // canceling this timer can never kill a delivery that has
            // already taken the queue.
            *pending = Some(handle.spawn(async move {
                tokio::time::sleep(delay).await;
                tokio::spawn(Inner::flush(inner));
            }));
        }
    }

    /// Flushes the queue now. No-op when empty.
    pub async fn flush_now(&self) {
        Inner::flush(self.inner.clone()).await;
    }

    /// Best-effort delivery of everything still queued, for process
    /// shutdown. Errors are ignored and the batch is not retried.
    pub async fn flush_on_close(&self) {
        if let Some(task) = lock(&self.inner.pending_flush).take() {
            task.abort();
        }
        let batch = {
            let mut queue = lock(&self.inner.queue);
            std::mem::take(&mut *queue)
        };
        if batch.is_empty() {
            return;
        }
        let _ = self.inner.transport.send(&batch).await;
    }

    /// Number of entries currently queued.
    pub fn queue_len(&self) -> usize {
        lock(&self.inner.queue).len()
    }
}

fn mirror(entry: &ClientLogEntry) {
    let component = entry.component.as_deref().unwrap_or("");
    match entry.level {
        LogLevel::Error => tracing::error!(component, "{}", entry.message),
        LogLevel::Warn => tracing::warn!(component, "{}", entry.message),
        LogLevel::Info => tracing::info!(component, "{}", entry.message),
        LogLevel::Debug => tracing::debug!(component, "{}", entry.message),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RecordingTransport;

    fn test_logger(transport: Arc<RecordingTransport>) -> ClientLogger {
        ClientLogger::with_config(
            transport,
            ClientLoggerConfig {
                max_queue_size: 10,
                flush_interval: Duration::from_millis(100),
                mirror_to_console: false,
                page: PageContext::default(),
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_triggers_immediate_single_flush() {
        let transport = Arc::new(RecordingTransport::new());
        let logger = test_logger(transport.clone());

        for i in 0..10 {
            logger.info(&format!("entry {i}"), None);
        }

        // Let the spawned flush run; well before the debounce delay.
        tokio::time::sleep(Duration::from_millis(1)).await;

        let batches = transport.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 10);
        assert_eq!(batches[0][0].message, "entry 0");
        assert_eq!(batches[0][9].message, "entry 9");
        assert_eq!(logger.queue_len(), 0);
        assert_eq!(transport.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_flushes_single_entry() {
        let transport = Arc::new(RecordingTransport::new());
        let logger = test_logger(transport.clone());

        logger.info("lonely", None);

        tokio::time::sleep(Duration::from_millis(99)).await;
        assert_eq!(transport.attempts(), 0);

        tokio::time::sleep(Duration::from_millis(5)).await;
        let batches = transport.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 1);
        assert_eq!(batches[0][0].message, "lonely");
        assert_eq!(logger.queue_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_emissions_coalesce_into_one_flush() {
        let transport = Arc::new(RecordingTransport::new());
        let logger = test_logger(transport.clone());

        logger.info("first", None);
        tokio::time::sleep(Duration::from_millis(60)).await;
        logger.info("second", None);

        // 110 ms after the first emission: its timer was canceled.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(transport.attempts(), 0);

        // 160 ms: the rescheduled timer fires with both entries.
        tokio::time::sleep(Duration::from_millis(60)).await;
        let batches = transport.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_delivery_is_not_retried() {
        let transport = Arc::new(RecordingTransport::failing());
        let logger = test_logger(transport.clone());

        logger.warn("doomed", None);
        logger.flush_now().await;

        assert_eq!(transport.attempts(), 1);
        assert!(transport.batches().is_empty());
        assert_eq!(logger.queue_len(), 0);

        // The failed batch was not requeued: another flush is a no-op.
        logger.flush_now().await;
        assert_eq!(transport.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_on_close_delivers_remainder() {
        let transport = Arc::new(RecordingTransport::new());
        let logger = test_logger(transport.clone());

        logger.info("a", None);
        logger.info("b", None);
        logger.flush_on_close().await;

        let batches = transport.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);

        // The pending debounce timer was canceled.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(transport.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_during_in_flight_send_go_to_next_batch() {
        let transport = Arc::new(RecordingTransport::with_delay(Duration::from_millis(50)));
        let logger = ClientLogger::with_config(
            transport.clone(),
            ClientLoggerConfig {
                max_queue_size: 10,
                flush_interval: Duration::from_secs(60),
                mirror_to_console: false,
                page: PageContext::default(),
            },
        );

        logger.info("first", None);
        let in_flight = {
            let logger = logger.clone();
            tokio::spawn(async move { logger.flush_now().await })
        };
        tokio::task::yield_now().await;

        // Emitted while the first batch is still on the wire.
        logger.info("second", None);
        logger.info("third", None);

        logger.flush_now().await;
        let _ = in_flight.await;

        let batches = transport.batches();
        let total: usize = batches.iter().map(Vec::len).sum();
        assert_eq!(total, 3);
        assert!(batches.iter().all(|b| !b.is_empty()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rescheduling_does_not_cancel_in_flight_delivery() {
        let transport = Arc::new(RecordingTransport::with_delay(Duration::from_millis(50)));
        let logger = test_logger(transport.clone());

        logger.info("first", None);

        // Wake mid-delivery: the timer fired at 100 ms and the batch stays
        // on the wire until 150 ms.
        tokio::time::sleep(Duration::from_millis(110)).await;
        assert_eq!(transport.attempts(), 1);

        // This emission aborts the stored timer handle; the in-flight send
        // keeps its batch.
        logger.info("second", None);
        tokio::time::sleep(Duration::from_millis(200)).await;

        let batches = transport.batches();
        let total: usize = batches.iter().map(Vec::len).sum();
        assert_eq!(total, 2);
        assert_eq!(batches[0][0].message, "first");
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_on_close_spares_in_flight_delivery() {
        let transport = Arc::new(RecordingTransport::with_delay(Duration::from_millis(50)));
        let logger = test_logger(transport.clone());

        logger.info("first", None);
        tokio::time::sleep(Duration::from_millis(110)).await;

        logger.info("second", None);
        logger.flush_on_close().await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        let total: usize = transport.batches().iter().map(Vec::len).sum();
        assert_eq!(total, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_helpers_shape_entries() {
        let transport = Arc::new(RecordingTransport::new());
        let logger = test_logger(transport.clone()).scoped("carousel");

        logger.event("slide-next", Some(json!({ "index": 2 })));
        logger.mount(None);
        logger.navigation("/", "/collections");
        logger.timing("image-load", 240);
        logger.flush_now().await;

        let batch = &transport.batches()[0];
        assert_eq!(batch[0].message, "User action: slide-next");
        assert_eq!(batch[0].action.as_deref(), Some("slide-next"));
        assert_eq!(batch[0].component.as_deref(), Some("carousel"));
        assert_eq!(batch[0].level, LogLevel::Info);

        assert_eq!(batch[1].message, "Component mounted");
        assert_eq!(batch[1].level, LogLevel::Debug);

        assert_eq!(batch[2].action.as_deref(), Some("navigation"));
        assert_eq!(batch[2].data.as_ref().unwrap()["to"], "/collections");

        assert_eq!(batch[3].action.as_deref(), Some("timing"));
        assert_eq!(batch[3].data.as_ref().unwrap()["durationMs"], 240);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_are_not_level_filtered() {
        let transport = Arc::new(RecordingTransport::new());
        let logger = test_logger(transport.clone());

        logger.debug("kept even at debug", None);
        logger.flush_now().await;

        assert_eq!(transport.batches()[0].len(), 1);
    }
}

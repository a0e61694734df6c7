//! # sl-client
//!
//! Batching client logger for Stacklight.
//!
//! Entries are queued in memory and flushed in batches to the ingestion
//! endpoint, triggered by a capacity threshold or a debounce timer, with
//! best-effort delivery on shutdown and automatic capture of panics and
//! failed background tasks.

pub mod capture;
pub mod entry;
pub mod logger;
pub mod transport;

pub use capture::{install_panic_capture, watch_task};
pub use entry::{ClientLogEntry, PageContext};
pub use logger::{ClientLogger, ClientLoggerConfig, FLUSH_INTERVAL, MAX_QUEUE_SIZE};
pub use transport::{HttpTransport, LogBatch, LogTransport, RecordingTransport, TransportError};

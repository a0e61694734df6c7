//! Batch delivery transports.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;

use crate::entry::ClientLogEntry;

/// Ingestion path batched entries are POSTed to.
pub const DEFAULT_INGEST_PATH: &str = "/api/logs";

/// Delivery failure. Terminal for the batch: the caller falls back to the
/// console and never retries.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("log delivery failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("log delivery unavailable: {0}")]
    Unavailable(String),
}

/// JSON envelope sent to the ingestion endpoint.
#[derive(Debug, Serialize)]
pub struct LogBatch<'a> {
    pub logs: &'a [ClientLogEntry],
}

/// Delivers one batch of entries to the central sink.
#[async_trait]
pub trait LogTransport: Send + Sync {
    async fn send(&self, batch: &[ClientLogEntry]) -> Result<(), TransportError>;
}

/// HTTP transport POSTing `{ "logs": [...] }` to the ingestion endpoint.
///
/// The response body is not inspected; only transport-level failures are
/// reported.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    /// Creates a transport targeting `<base_url>/api/logs`.
    pub fn new(base_url: &str) -> Self {
        Self::with_client(
            reqwest::Client::new(),
            format!("{}{}", base_url.trim_end_matches('/'), DEFAULT_INGEST_PATH),
        )
    }

    /// Creates a transport with an explicit client and endpoint URL.
    pub fn with_client(client: reqwest::Client, endpoint: String) -> Self {
        Self { client, endpoint }
    }
}

#[async_trait]
impl LogTransport for HttpTransport {
    async fn send(&self, batch: &[ClientLogEntry]) -> Result<(), TransportError> {
        self.client
            .post(&self.endpoint)
            .json(&LogBatch { logs: batch })
            .send()
            .await?;
        Ok(())
    }
}

/// In-memory transport recording every delivered batch. Used by tests.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    batches: Mutex<Vec<Vec<ClientLogEntry>>>,
    attempts: Mutex<usize>,
    fail: AtomicBool,
    delay: Option<Duration>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport that rejects every batch.
    pub fn failing() -> Self {
        let transport = Self::default();
        transport.fail.store(true, Ordering::SeqCst);
        transport
    }

    /// A transport that sleeps before accepting each batch, to exercise
    /// emissions arriving while a delivery is in flight.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Batches delivered so far, in completion order.
    pub fn batches(&self) -> Vec<Vec<ClientLogEntry>> {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of delivery attempts, including failed ones.
    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl LogTransport for RecordingTransport {
    async fn send(&self, batch: &[ClientLogEntry]) -> Result<(), TransportError> {
        *self.attempts.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable("rejected by test".to_string()));
        }
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(batch.to_vec());
        Ok(())
    }
}

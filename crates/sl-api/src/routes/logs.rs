//! Client log ingestion endpoint.
//!
//! Receives batched client entries and re-emits each through the server
//! logger, where the configured level threshold and sanitization apply.

use axum::{body::Bytes, extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use sl_client::ClientLogEntry;
use sl_core::LogLevel;

use crate::error::ApiError;
use crate::state::AppState;

/// Batch envelope accepted from client loggers.
#[derive(Debug, Deserialize)]
pub struct LogBatchPayload {
    pub logs: Vec<ClientLogEntry>,
}

/// Acknowledgement returned to the sender. Senders do not inspect it.
#[derive(Debug, Serialize, Deserialize)]
pub struct LogsAcceptedResponse {
    pub accepted: bool,
    pub count: usize,
}

/// Creates log ingestion routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/api/logs", post(ingest_logs))
}

async fn ingest_logs(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<LogsAcceptedResponse>), ApiError> {
    let payload: LogBatchPayload = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON payload: {}", e)))?;

    let count = payload.logs.len();
    let log = state.logger.child(json!({ "component": "client" }));

    for entry in payload.logs {
        emit_client_entry(&log, entry);
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(LogsAcceptedResponse {
            accepted: true,
            count,
        }),
    ))
}

fn emit_client_entry(log: &sl_core::Logger, entry: ClientLogEntry) {
    let scoped = match &entry.component {
        Some(component) => log.child(json!({ "clientComponent": component })),
        None => log.clone(),
    };

    let mut data = match entry.data {
        Some(Value::Object(map)) => map,
        Some(other) => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
        None => Map::new(),
    };
    if let Some(action) = entry.action {
        data.insert("action".to_string(), json!(action));
    }
    if let Some(url) = entry.url {
        data.insert("url".to_string(), json!(url));
    }
    if let Some(user_agent) = entry.user_agent {
        data.insert("userAgent".to_string(), json!(user_agent));
    }
    data.insert("clientTimestamp".to_string(), json!(entry.timestamp));
    let data = Some(Value::Object(data));

    match entry.level {
        LogLevel::Debug => scoped.debug(&entry.message, data),
        LogLevel::Info => scoped.info(&entry.message, data),
        LogLevel::Warn => scoped.warn(&entry.message, data),
        LogLevel::Error => match entry.error {
            Some(error) => scoped.error_info(&entry.message, error, data),
            None => scoped.error(&entry.message, None, data),
        },
    }
}

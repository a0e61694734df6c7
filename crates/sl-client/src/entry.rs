//! Client-side log entry model.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sl_core::{ErrorInfo, LogLevel};

/// One client-side observation, queued and shipped in batches to the
/// ingestion endpoint.
///
/// Unlike the server [`sl_core::LogEntry`], client entries carry the page
/// URL and user agent (when a page context is configured) and an `action`
/// field for discrete user-interaction events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientLogEntry {
    pub level: LogLevel,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "userAgent", skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    pub timestamp: String,
}

impl ClientLogEntry {
    /// Creates an entry stamped with the current time, filling `url` and
    /// `user_agent` from the page context.
    pub fn new(level: LogLevel, message: impl Into<String>, page: &PageContext) -> Self {
        Self {
            level,
            message: message.into(),
            component: None,
            action: None,
            data: None,
            error: None,
            url: page.url.clone(),
            user_agent: page.user_agent.clone(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Page context mirrored onto every entry when the embedder runs in a
/// browser-like host. Both fields are omitted from entries when absent.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub url: Option<String>,
    pub user_agent: Option<String>,
}

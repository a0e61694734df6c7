//! Application state shared across handlers.

use std::sync::Arc;

use sl_core::{LogConfig, Logger};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Root server logger; request-scoped children derive from it.
    pub logger: Logger,
    /// Logging configuration shared across components.
    pub config: Arc<LogConfig>,
}

impl AppState {
    /// Creates state with a console-backed logger.
    pub fn new(config: LogConfig) -> Self {
        let config = Arc::new(config);
        Self {
            logger: Logger::new(config.clone()),
            config,
        }
    }

    /// Creates state with an explicit logger, e.g. one writing to a
    /// memory sink in tests.
    pub fn with_logger(logger: Logger, config: Arc<LogConfig>) -> Self {
        Self { logger, config }
    }
}

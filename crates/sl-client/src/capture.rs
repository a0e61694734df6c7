//! Automatic capture of panics and failed background tasks.
//!
//! Both feed error-level entries through the normal emit path; neither
//! halts further execution.

use serde_json::json;
use std::panic::{self, PanicHookInfo};
use tokio::task::JoinHandle;

use sl_core::ErrorInfo;

use crate::logger::ClientLogger;

/// Installs a panic hook that records each panic as an error entry before
/// delegating to the previously installed hook.
///
/// Entries produced from inside the hook stay queued until the next flush
/// trigger or [`ClientLogger::flush_on_close`], since no timer can be
/// scheduled at that point.
pub fn install_panic_capture(logger: ClientLogger) {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let message = panic_message(info);
        let (file, line, column) = info
            .location()
            .map(|loc| (loc.file().to_string(), loc.line(), loc.column()))
            .unwrap_or_else(|| ("unknown".to_string(), 0, 0));

        logger.error(
            "Unhandled panic",
            Some(ErrorInfo::new("panic", &message)),
            Some(json!({
                "message": message,
                "filename": file,
                "lineno": line,
                "colno": column,
            })),
        );

        previous(info);
    }));
}

fn panic_message(info: &PanicHookInfo<'_>) -> String {
    if let Some(s) = info.payload().downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = info.payload().downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

/// Awaits a background task, recording an error entry when it fails or
/// panics. The analogue of an unhandled-rejection handler: the failure is
/// logged, not swallowed silently, and the caller keeps running.
pub async fn watch_task<T, E>(logger: &ClientLogger, task: JoinHandle<Result<T, E>>) -> Option<T>
where
    E: std::fmt::Display,
{
    match task.await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(err)) => {
            let reason = err.to_string();
            logger.error(
                "Unhandled task error",
                Some(ErrorInfo::new("task", &reason)),
                Some(json!({ "reason": reason })),
            );
            None
        }
        Err(join_err) => {
            let reason = join_err.to_string();
            logger.error(
                "Unhandled task panic",
                Some(ErrorInfo::new("panic", &reason)),
                Some(json!({ "reason": reason })),
            );
            None
        }
    }
}

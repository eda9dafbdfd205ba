//! Logging Infrastructure
//!
//! `tracing-subscriber` fmt output filtered by `RUST_LOG` (falling back to
//! `LOG_LEVEL`), optionally written to a daily rolling file.

use std::path::Path;
use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVES: &str = "fulfillment_server=info,tower_http=info";

/// Initialize the logger on stdout
pub fn init_logger() {
    init_logger_with_file(None, None);
}

/// Initialize the logger with optional file output
///
/// `log_level` replaces the crate directive (e.g. `debug`); `RUST_LOG`
/// always wins when set. File output is enabled only if `log_dir` exists.
pub fn init_logger_with_file(log_level: Option<&str>, log_dir: Option<&str>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directives = match log_level {
            Some(level) => format!("fulfillment_server={level},tower_http=info"),
            None => DEFAULT_DIRECTIVES.to_string(),
        };
        EnvFilter::new(directives)
    });

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(false);

    if let Some(dir) = log_dir {
        let log_path = Path::new(dir);
        if log_path.exists() {
            let file_appender = tracing_appender::rolling::daily(log_path, "fulfillment-server");
            subscriber.with_ansi(false).with_writer(file_appender).init();
            return;
        }
    }

    subscriber.init();
}

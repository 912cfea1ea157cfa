//! Tracing setup shared by the binary and the tests.
//!
//! Logs go to stdout and, when a directory is configured, to a daily rolling file. Records emitted
//! through the `log` crate, as `tokio-postgres` does, are forwarded into tracing.

use std::io;
use std::path::Path;
use std::sync::Once;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable that turns on log output in tests.
const ENABLE_TEST_TRACING_ENV: &str = "ENABLE_TRACING";

#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to forward log records into tracing: {0}")]
    LogTracer(#[from] tracing_log::log::SetLoggerError),

    #[error("failed to install the tracing subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error("failed to create the log directory: {0}")]
    LogDir(#[source] io::Error),
}

/// Keeps the background file writer alive.
///
/// Buffered lines are flushed when this is dropped, so it must live until the process exits.
#[must_use = "dropping the flusher stops writing the log file"]
#[derive(Debug)]
pub struct LogFlusher {
    _guard: Option<WorkerGuard>,
}

/// Installs the global subscriber for `app_name`.
///
/// `RUST_LOG` overrides the default filter, which logs the application and the `migrate` crate at
/// `info`. With `log_dir` set, lines are also written to `<log_dir>/<app_name>.log.<date>`; the
/// directory is created when missing.
///
/// The `log` bridge is installed here and not by the subscriber, so this can be called once per
/// process. A second call returns [`TracingError::LogTracer`].
pub fn init_tracing(app_name: &str, log_dir: Option<&Path>) -> Result<LogFlusher, TracingError> {
    tracing_log::LogTracer::init()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(app_name)));

    let stdout_layer = fmt::layer().with_target(true);

    let (file_layer, guard) = match log_dir {
        Some(log_dir) => {
            std::fs::create_dir_all(log_dir).map_err(TracingError::LogDir)?;
            let appender = tracing_appender::rolling::daily(log_dir, format!("{app_name}.log"));
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);

            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    // `try_init` would install a second `log` bridge and fail.
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer);
    tracing::subscriber::set_global_default(subscriber)?;

    Ok(LogFlusher { _guard: guard })
}

/// Installs a test subscriber once per process, only when `ENABLE_TRACING` is set.
pub fn init_test_tracing() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        if std::env::var(ENABLE_TEST_TRACING_ENV).is_err() {
            return;
        }

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("migrate=debug,info"));

        // Another test harness may have installed a subscriber already.
        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

fn default_directives(app_name: &str) -> String {
    // Crate names use underscores as tracing targets.
    let target = app_name.replace('-', "_");
    format!("{target}=info,migrate=info,warn")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directives_cover_application_and_library() {
        assert_eq!(
            default_directives("migrator"),
            "migrator=info,migrate=info,warn"
        );
        assert_eq!(
            default_directives("my-tool"),
            "my_tool=info,migrate=info,warn"
        );
    }

    #[test]
    fn test_tracing_can_be_initialized_repeatedly() {
        init_test_tracing();
        init_test_tracing();
    }
}

//! Tracing subscriber setup.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingSettings;

/// Installs the global tracing subscriber.
///
/// Logs go to stderr; with `settings.file` they also go to a daily-rotated
/// `pifi.log` under `logs_dir`. `RUST_LOG` overrides `settings.level`.
///
/// The returned guard flushes the file writer on drop and must be kept alive
/// for the lifetime of the process. Calling this twice is harmless: the
/// second call leaves the first subscriber in place.
pub fn init_logging(settings: &LoggingSettings, logs_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.level.as_str()));

    let (file_layer, guard) = match (settings.file, logs_dir) {
        (true, Some(dir)) => {
            let appender = tracing_appender::rolling::daily(dir, "pifi.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .boxed();
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init();

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }

    guard
}

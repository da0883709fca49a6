use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

const DEFAULT_LEVEL: &str = "info";
const LOG_PREFIX: &str = "anky.log";

/// Route tracing output to a daily-rolling file under `dir`.
///
/// The terminal belongs to the TUI, so nothing is written to stdout or
/// stderr. `RUST_LOG` overrides the default `info` filter. Keep the
/// returned guard alive until exit so buffered lines get flushed.
/// Returns `None` when the directory is unusable or a global subscriber is
/// already installed.
pub fn init(dir: &Path) -> Option<WorkerGuard> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL));

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_PREFIX)
        .build(dir)
        .ok()?;
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(non_blocking);

    Registry::default()
        .with(env_filter)
        .with(file_layer)
        .try_init()
        .ok()
        .map(|_| guard)
}

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub const LOG_FILE_NAME: &str = "log.txt";

pub fn exe_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|d| d.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Route `tracing` output to `log.txt` next to the executable.
///
/// With `debug` off the level is pinned to `info` so a stray `RUST_LOG` in the
/// user's environment cannot flood the file; with `debug` on `RUST_LOG` wins.
/// The returned guard flushes the background writer on drop and must be held
/// for the lifetime of the process.
pub fn init(debug: bool) -> WorkerGuard {
    let appender = tracing_appender::rolling::never(exe_dir(), LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let level = if debug { "debug" } else { "info" };
    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    } else {
        EnvFilter::new(level)
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_thread_names(true)
        .try_init();

    tracing::info!("===== seltrans {} start =====", env!("CARGO_PKG_VERSION"));
    guard
}

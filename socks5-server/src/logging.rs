//! Logging init: stdout always, plus an optional daily-rolling file sink.
//!
//! Grounded on `devolutions-log`'s `init` (file layer + stdio layer, both
//! non-blocking, composed under one `EnvFilter`), simplified for this
//! binary's single-process scope: no `StaticLogConfig` trait, no log-file
//! discovery helper, just the two layers `devolutions-log` itself builds.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Holds the non-blocking writer guards alive for the process lifetime.
/// Dropping either guard stops flushing that sink, so `main` keeps this
/// bound until shutdown.
pub struct LoggerGuard {
    _stdout_guard: WorkerGuard,
    _file_guard: Option<WorkerGuard>,
}

pub fn init(log_file: Option<&Path>) -> anyhow::Result<LoggerGuard> {
    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let stdout_layer = fmt::layer().with_writer(stdout_writer);

    let (file_layer, file_guard) = match log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
            let prefix = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| "socks5-server".to_owned());
            let appender = tracing_appender::rolling::daily(dir, prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .with(EnvFilter::from_default_env())
        .init();

    Ok(LoggerGuard {
        _stdout_guard: stdout_guard,
        _file_guard: file_guard,
    })
}

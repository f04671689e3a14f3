//! Tracing initialization.

use std::path::{Path, PathBuf};
use std::sync::{Once, OnceLock};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

/// Environment variable holding the log filter directives.
pub const LOG_ENV: &str = "TAKC_LOG";
/// Environment variable naming an optional log file.
pub const LOG_FILE_ENV: &str = "TAKC_LOG_FILE";

static INIT: Once = Once::new();
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

#[derive(Debug, Clone, Default)]
pub struct TracingOptions {
    /// Default to `takc=debug` instead of `takc=info`.
    pub verbose: bool,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
    /// Also append plain-text logs to this file.
    pub log_file: Option<PathBuf>,
}

fn default_directives(verbose: bool) -> &'static str {
    if verbose { "takc=debug" } else { "takc=info" }
}

/// Initialize logging to stderr, plus an optional file sink.
///
/// Reads `TAKC_LOG` for filter directives (e.g. `takc=debug,reqwest=warn`),
/// falling back to `takc=info`. Idempotent; later calls are no-ops.
pub fn init_tracing(opts: &TracingOptions) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV)
            .unwrap_or_else(|_| EnvFilter::new(default_directives(opts.verbose)));

        let console_layer = if opts.json {
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .boxed()
        } else {
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .boxed()
        };

        let file_layer = opts.log_file.as_deref().and_then(file_writer).map(|writer| {
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .boxed()
        });

        let _ = tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer)
            .with(filter)
            .try_init();
    });
}

fn file_writer(path: &Path) -> Option<tracing_appender::non_blocking::NonBlocking> {
    let file_name = path.file_name()?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    if std::fs::create_dir_all(dir).is_err() {
        eprintln!("takc: cannot create log directory {}", dir.display());
        return None;
    }
    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = FILE_GUARD.set(guard);
    Some(writer)
}

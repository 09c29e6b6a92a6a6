//! QuickCap Core Library
//!
//! Word-synchronized caption rendering for short-form vertical video.
//! Speech is transcribed into timed words, grouped into phrases, laid out
//! and rasterized per the selected style template, then burned into a
//! 9:16 reframe of the source by ffmpeg.

pub mod core;
pub mod http;

use std::path::Path;
use std::sync::OnceLock;

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Installs the global tracing subscriber.
///
/// Logs go to stdout and, when `log_dir` is given, to a daily-rolling
/// `quickcap.log` there. The filter defaults to `info` and honors `RUST_LOG`.
/// Calling this more than once is a no-op.
pub fn init_logging(log_dir: Option<&Path>) {
    use tracing_subscriber::prelude::*;

    if LOG_GUARD.get().is_some() {
        return;
    }

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(cfg!(debug_assertions));

    // Best effort: an unwritable log dir leaves stdout logging in place.
    let file_layer = log_dir
        .filter(|dir| std::fs::create_dir_all(dir).is_ok())
        .map(|dir| {
            let file_appender = tracing_appender::rolling::daily(dir, "quickcap.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let _ = LOG_GUARD.set(guard);
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
        });

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer);

    // Avoid panics if already initialized (tests, embedding).
    let _ = tracing::subscriber::set_global_default(subscriber);
}

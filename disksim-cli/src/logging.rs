// SPDX-License-Identifier: GPL-3.0-only

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{Duration, SystemTime};

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingLevel;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const APP_DIR: &str = "disksim";
const LOG_PREFIX: &str = "disksim.log";
const KEEP_DAYS: u64 = 7;

/// Install the global subscriber. Console output goes to stderr so that
/// listings and JSON on stdout stay machine-readable.
pub fn init(level: LoggingLevel, log_to_disk: bool) {
    if !log_to_disk {
        tracing_subscriber::registry()
            .with(env_filter(level))
            .with(stderr_layer())
            .init();
        return;
    }

    match file_writer() {
        Ok((writer, guard)) => {
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
                .with_timer(tracing_subscriber::fmt::time::SystemTime)
                .with_filter(env_filter(level));

            tracing_subscriber::registry()
                .with(stderr_layer().with_filter(env_filter(level)))
                .with(file_layer)
                .init();

            // Keep the background writer alive for the rest of the process.
            let _ = LOG_GUARD.set(guard);
        }
        Err(e) => {
            eprintln!("disksim: failed to initialize file logging: {e:#}");
            tracing_subscriber::registry()
                .with(env_filter(level))
                .with(stderr_layer())
                .init();
        }
    }
}

fn stderr_layer<S>() -> impl Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
}

/// `RUST_LOG` wins; otherwise the configured level applies to our crates
/// and everything else stays at warn.
fn env_filter(level: LoggingLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directive = level.as_directive();
        EnvFilter::new(format!(
            "warn,disksim={directive},disksim_core={directive},disksim_types={directive}"
        ))
    })
}

fn file_writer() -> anyhow::Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let dir = log_dir();
    fs::create_dir_all(&dir)
        .with_context(|| format!("create log directory failed: {}", dir.display()))?;
    prune_rolled_logs(&dir, SystemTime::now());
    Ok(tracing_appender::non_blocking(
        tracing_appender::rolling::daily(&dir, LOG_PREFIX),
    ))
}

/// `$DISKSIM_LOG_DIR`, else the XDG state directory.
fn log_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("DISKSIM_LOG_DIR") {
        return PathBuf::from(dir);
    }
    let state = std::env::var_os("XDG_STATE_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local/state")))
        .unwrap_or_else(std::env::temp_dir);
    state.join(APP_DIR).join("logs")
}

/// Remove our rolled files last modified more than [`KEEP_DAYS`] before `now`.
fn prune_rolled_logs(dir: &Path, now: SystemTime) {
    let Some(cutoff) = now.checked_sub(Duration::from_secs(KEEP_DAYS * 24 * 60 * 60)) else {
        return;
    };
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let ours = entry.file_name().to_string_lossy().starts_with(LOG_PREFIX);
        let stale = entry
            .metadata()
            .is_ok_and(|meta| meta.is_file() && meta.modified().is_ok_and(|time| time < cutoff));
        if ours && stale {
            let _ = fs::remove_file(entry.path());
        }
    }
}

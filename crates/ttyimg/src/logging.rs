#![forbid(unsafe_code)]

//! Diagnostics go to stderr or a log file, never to stdout: stdout carries
//! the image.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context as _;
use tracing_subscriber::EnvFilter;

/// Filter variable for `--log-file` output.
pub const LOG_ENV: &str = "TTYIMG_LOG";

/// Install the global subscriber.
///
/// Without `log_file`, warnings and errors go to stderr. With it, events
/// are appended to the file at the level given by `TTYIMG_LOG` (default
/// `debug`).
///
/// # Errors
///
/// The log file cannot be opened.
pub fn init(log_file: Option<&Path>) -> anyhow::Result<()> {
    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            let filter =
                EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("debug"));
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
                .map_err(|err| anyhow::anyhow!(err))?;
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::new("warn"))
                .with_writer(io::stderr)
                .try_init()
                .map_err(|err| anyhow::anyhow!(err))?;
        }
    }
    Ok(())
}

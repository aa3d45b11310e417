use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use super::formatter::BracketedFormatter;

/// Install the global subscriber: bracketed lines on stdout and in a
/// timestamped file under `log_dir`. `RUST_LOG` takes precedence over the
/// `verbose` switch.
///
/// Returns the path of the log file that was created.
pub fn setup_logging(log_dir: &Path, verbose: bool) -> io::Result<PathBuf> {
    fs::create_dir_all(log_dir)?;

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let log_path = log_dir.join(format!("dataset_prep_{}.log", timestamp));

    let file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&log_path)?;

    let file_layer = fmt::layer()
        .event_format(BracketedFormatter)
        .with_writer(Mutex::new(file))
        .with_ansi(false);

    let stdout_layer = fmt::layer()
        .event_format(BracketedFormatter)
        .with_writer(io::stdout);

    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    info!("Log file created at: {:?}", log_path);

    Ok(log_path)
}

//! Process-wide tracing setup.
//!
//! Logs go to stderr and to a timestamped file under the log directory.
//! The level is taken from `RUST_LOG` and defaults to `info`.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default directory for log files, relative to the working directory.
pub const DEFAULT_LOG_DIR: &str = "logs";

/// File name pattern for log files (`chrono` format).
pub const LOG_FILE_FORMAT: &str = "%Y_%m_%d_%H_%M_%S";

/// Log file of the installed subscriber. Held locked for the whole of
/// [`init`] so concurrent callers wait for the first one to finish.
static LOG_FILE: Mutex<Option<PathBuf>> = Mutex::new(None);

/// Installs the global subscriber once and returns the path of the log file.
///
/// Later calls return the path chosen by the first call, whatever `log_dir`
/// they pass.
///
/// # Errors
/// Fails if the log directory or file cannot be created, or if another
/// global subscriber was installed first.
pub fn init(log_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let mut installed = LOG_FILE.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(path) = installed.as_ref() {
        return Ok(path.clone());
    }

    let log_dir = log_dir.as_ref();
    fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

    let file_name = format!("{}.log", chrono::Local::now().format(LOG_FILE_FORMAT));
    let path = log_dir.join(file_name);
    let file = File::create(&path)
        .with_context(|| format!("Failed to create log file: {}", path.display()))?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer().with_writer(std::io::stderr);
    let file_layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    *installed = Some(path.clone());
    info!(log_file = %path.display(), "Logging initialized");
    Ok(path)
}

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Errors returned by [`log_to_file`].
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// The log file could not be opened.
    #[error("could not open log file: {0}")]
    Io(#[from] std::io::Error),
    /// A global subscriber was already installed.
    #[error("could not install log subscriber: {0}")]
    Init(Box<dyn std::error::Error + Send + Sync>),
}

/// Send `tracing` output to a file.
///
/// A terminal application cannot log to the terminal it draws on, so this
/// installs a global subscriber writing to `path` (opened in append mode).
/// The level is taken from `RUST_LOG`, defaulting to `debug`.  The runtime
/// logs under the `steep::*` targets.
///
/// # Example
///
/// ```no_run
/// steep_core::log_to_file("debug.log").unwrap();
/// tracing::info!("starting up");
/// ```
pub fn log_to_file(path: impl AsRef<Path>) -> Result<(), LogError> {
    let file = File::options().create(true).append(true).open(path)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(LogError::Init)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_directory_is_an_io_error() {
        let path = std::env::temp_dir()
            .join("steep-no-such-dir")
            .join("nested")
            .join("app.log");
        assert!(matches!(log_to_file(path), Err(LogError::Io(_))));
    }
}

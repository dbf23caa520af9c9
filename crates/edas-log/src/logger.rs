//! Logger construction.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::Dispatch;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use crate::error::LogError;

/// Options for [`Logger::init`].
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
  /// Console filter directives. Falls back to `RUST_LOG`, then `info`.
  pub filter: Option<String>,
  /// Directory for the debug-level log file. No file is written when unset.
  pub log_dir: Option<PathBuf>,
  /// Emit ANSI colors on the console.
  pub ansi: bool,
}

/// `~/.edas/logs`, if a home directory can be determined.
pub fn default_log_dir() -> Option<PathBuf> {
  dirs::home_dir().map(|home| home.join(".edas").join("logs"))
}

/// Name of a new log file: `edas-<hostname>-<UTC timestamp>.log`.
pub fn log_file_name() -> String {
  let host = whoami::fallible::hostname().unwrap_or_else(|_| "localhost".to_string());
  let timestamp = chrono::Utc::now().format("%Y-%m-%d_%H-%M-%S");
  format!("edas-{}-{}.log", host, timestamp)
}

/// An injectable logging dependency.
///
/// Created once at process start and cloned into each component. Cloning is
/// cheap and every clone writes to the same subscriber.
#[derive(Clone)]
pub struct Logger {
  dispatch: Dispatch,
  log_file: Option<PathBuf>,
}

impl Logger {
  /// Build the standard console (and optional file) subscriber.
  pub fn init(config: &LogConfig) -> Result<Self, LogError> {
    let filter = match &config.filter {
      Some(directives) => EnvFilter::try_new(directives)?,
      None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let console = fmt::layer()
      .with_writer(std::io::stderr)
      .with_ansi(config.ansi)
      .with_filter(filter);

    let (file_layer, log_file) = match &config.log_dir {
      Some(dir) => {
        let path = dir.join(log_file_name());
        let file = open_log_file(dir, &path)?;
        let layer = fmt::layer()
          .with_writer(Mutex::new(file))
          .with_ansi(false)
          .with_filter(LevelFilter::DEBUG);
        (Some(layer), Some(path))
      }
      None => (None, None),
    };

    let subscriber = tracing_subscriber::registry()
      .with(console)
      .with(file_layer);

    Ok(Self {
      dispatch: Dispatch::new(subscriber),
      log_file,
    })
  }

  /// A logger that discards everything.
  pub fn disabled() -> Self {
    Self::from_dispatch(Dispatch::none())
  }

  /// A logger bound to whatever subscriber is the default on this thread.
  pub fn current() -> Self {
    Self::from_dispatch(tracing::dispatcher::get_default(Dispatch::clone))
  }

  pub fn from_dispatch(dispatch: Dispatch) -> Self {
    Self {
      dispatch,
      log_file: None,
    }
  }

  /// Run `f` with this logger as the default subscriber.
  pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
    tracing::dispatcher::with_default(&self.dispatch, f)
  }

  pub fn dispatch(&self) -> &Dispatch {
    &self.dispatch
  }

  /// Path of the file log, if one is being written.
  pub fn log_file(&self) -> Option<&Path> {
    self.log_file.as_deref()
  }

  /// Make this logger the process-wide default.
  ///
  /// Covers threads that were not handed a logger (third-party code, the
  /// async runtime's own threads). Can only succeed once per process.
  pub fn install_global(&self) -> Result<(), LogError> {
    tracing::dispatcher::set_global_default(self.dispatch.clone())
      .map_err(|_| LogError::AlreadyInstalled)
  }
}

impl std::fmt::Debug for Logger {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Logger")
      .field("log_file", &self.log_file)
      .finish_non_exhaustive()
  }
}

fn open_log_file(dir: &Path, path: &Path) -> Result<File, LogError> {
  std::fs::create_dir_all(dir)
    .and_then(|_| File::create(path))
    .map_err(|source| LogError::File {
      path: path.to_path_buf(),
      source,
    })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_log_file_name_shape() {
    let name = log_file_name();
    assert!(name.starts_with("edas-"));
    assert!(name.ends_with(".log"));
  }

  #[test]
  fn test_disabled_logger_runs_closure() {
    let logger = Logger::disabled();
    let value = logger.in_scope(|| {
      tracing::info!("discarded");
      42
    });
    assert_eq!(value, 42);
    assert!(logger.log_file().is_none());
  }

  #[test]
  fn test_invalid_filter() {
    let config = LogConfig {
      filter: Some("edas=notalevel".to_string()),
      ..Default::default()
    };
    assert!(matches!(Logger::init(&config), Err(LogError::Filter(_))));
  }
}

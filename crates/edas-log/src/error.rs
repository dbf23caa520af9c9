use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogError {
  #[error("invalid log filter: {0}")]
  Filter(#[from] tracing_subscriber::filter::ParseError),

  #[error("failed to create log file {path}: {source}")]
  File {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("a global logger is already installed")]
  AlreadyInstalled,
}

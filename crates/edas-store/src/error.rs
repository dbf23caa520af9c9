use std::path::PathBuf;

use edas_execution::PersistenceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("io error at {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to encode result: {0}")]
  Encode(#[from] serde_json::Error),

  #[error("result not found: {0}")]
  NotFound(String),

  #[error("no home directory to place the cache in")]
  NoHomeDir,
}

impl StoreError {
  pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    if source.kind() == std::io::ErrorKind::NotFound {
      return Self::NotFound(path.into().display().to_string());
    }
    Self::Io {
      path: path.into(),
      source,
    }
  }
}

impl From<StoreError> for PersistenceError {
  fn from(e: StoreError) -> Self {
    PersistenceError::Persist {
      message: e.to_string(),
    }
  }
}

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config file {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid JSON config: {0}")]
  Json(#[from] serde_json::Error),

  #[error("line {line}: expected `key=value`, got `{content}`")]
  Syntax { line: usize, content: String },

  #[error("invalid value `{value}` for `{key}`: {message}")]
  InvalidValue {
    key: String,
    value: String,
    message: String,
  },
}

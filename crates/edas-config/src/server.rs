//! Server configuration.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::properties::Properties;

/// Interval between status checks in polling waits.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Timeout for establishing the remote scheduler connection.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;

/// Property keys understood by [`ServerConfig::from_properties`].
pub mod keys {
  pub const SCHEDULER: &str = "dask.scheduler";
  pub const WORKERS: &str = "dask.nworkers";
  pub const CACHE_DIR: &str = "cache.dir";
  pub const LOG_DIR: &str = "log.dir";
  pub const POLL_INTERVAL_MS: &str = "poll.interval.ms";
  pub const CONNECT_TIMEOUT_MS: &str = "connect.timeout.ms";
}

/// The worker pool the coordinator connects to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PoolConfig {
  /// An in-process pool. `None` uses the host's available parallelism.
  Local {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    workers: Option<usize>,
  },
  /// A remote scheduler reachable at `host:port`.
  Remote { scheduler_address: String },
}

impl Default for PoolConfig {
  fn default() -> Self {
    PoolConfig::Local { workers: None }
  }
}

/// Top-level server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
  #[serde(default)]
  pub pool: PoolConfig,
  #[serde(default = "default_poll_interval_ms")]
  pub poll_interval_ms: u64,
  #[serde(default = "default_connect_timeout_ms")]
  pub connect_timeout_ms: u64,
  /// Directory for temporary result files.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cache_dir: Option<PathBuf>,
  /// Directory for log files. No file log is written when unset.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub log_dir: Option<PathBuf>,
}

fn default_poll_interval_ms() -> u64 {
  DEFAULT_POLL_INTERVAL_MS
}

fn default_connect_timeout_ms() -> u64 {
  DEFAULT_CONNECT_TIMEOUT_MS
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      pool: PoolConfig::default(),
      poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
      connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
      cache_dir: None,
      log_dir: None,
    }
  }
}

impl ServerConfig {
  /// Interval between status polls, never shorter than 1 ms.
  pub fn poll_interval(&self) -> Duration {
    Duration::from_millis(self.poll_interval_ms.max(1))
  }

  pub fn connect_timeout(&self) -> Duration {
    Duration::from_millis(self.connect_timeout_ms)
  }

  /// Load configuration from a file.
  ///
  /// Files ending in `.json` are parsed as JSON; anything else is read as a
  /// properties file.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;

    let is_json = path
      .extension()
      .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let config: Self = if is_json {
      serde_json::from_str(&content)?
    } else {
      Self::from_properties(&Properties::parse(&content)?)?
    };
    config.validate()?;
    Ok(config)
  }

  /// Reject values the coordinator cannot work with: a zero poll interval
  /// or a zero local worker count.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.poll_interval_ms == 0 {
      return Err(ConfigError::InvalidValue {
        key: keys::POLL_INTERVAL_MS.to_string(),
        value: "0".to_string(),
        message: "must be at least 1".to_string(),
      });
    }
    if let PoolConfig::Local { workers: Some(n) } = self.pool {
      positive(keys::WORKERS, n)?;
    }
    Ok(())
  }

  /// Build a configuration from properties, defaulting absent keys.
  ///
  /// A `dask.scheduler` entry selects a remote pool and takes precedence
  /// over `dask.nworkers`.
  pub fn from_properties(props: &Properties) -> Result<Self, ConfigError> {
    let pool = match props.get(keys::SCHEDULER).filter(|s| !s.is_empty()) {
      Some(address) => PoolConfig::Remote {
        scheduler_address: address.to_string(),
      },
      None => PoolConfig::Local {
        workers: parse_opt::<usize>(props, keys::WORKERS)?
          .map(|n| positive(keys::WORKERS, n))
          .transpose()?,
      },
    };

    let config = Self {
      pool,
      poll_interval_ms: parse_opt(props, keys::POLL_INTERVAL_MS)?
        .unwrap_or(DEFAULT_POLL_INTERVAL_MS),
      connect_timeout_ms: parse_opt(props, keys::CONNECT_TIMEOUT_MS)?
        .unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS),
      cache_dir: props.get(keys::CACHE_DIR).map(PathBuf::from),
      log_dir: props.get(keys::LOG_DIR).map(PathBuf::from),
    };
    config.validate()?;
    Ok(config)
  }
}

fn parse_opt<T>(props: &Properties, key: &str) -> Result<Option<T>, ConfigError>
where
  T: FromStr,
  T::Err: std::fmt::Display,
{
  props
    .get(key)
    .map(|value| {
      value.parse::<T>().map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        message: e.to_string(),
      })
    })
    .transpose()
}

fn positive(key: &str, n: usize) -> Result<usize, ConfigError> {
  if n == 0 {
    return Err(ConfigError::InvalidValue {
      key: key.to_string(),
      value: n.to_string(),
      message: "must be at least 1".to_string(),
    });
  }
  Ok(n)
}

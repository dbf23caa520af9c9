//! EDAS Config
//!
//! This crate contains the serializable server configuration for EDAS: which
//! worker pool the coordinator connects to, how often blocking waits poll,
//! and where results and logs are written.
//!
//! Configuration can be loaded from:
//! - JSON files (`*.json`)
//! - `key=value` properties files such as `app.conf`
//!
//! CLI flags are applied on top of the loaded values by the binary.

mod error;
mod properties;
mod server;

pub use error::ConfigError;
pub use properties::Properties;
pub use server::{
  DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_POLL_INTERVAL_MS, PoolConfig, ServerConfig, keys,
};

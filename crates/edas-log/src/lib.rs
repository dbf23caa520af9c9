//! EDAS Log
//!
//! Logging is configured once at process start and handed to every component
//! as a [`Logger`]. A logger wraps a [`tracing::Dispatch`]; components run
//! their work inside [`Logger::in_scope`], so the same `tracing` macros used
//! everywhere else land in the injected subscriber rather than a lazily
//! created global one.
//!
//! The standard subscriber writes to stderr (filtered by `RUST_LOG`, default
//! `info`) and, when a log directory is configured, to
//! `<log_dir>/edas-<hostname>-<timestamp>.log` at debug level.

mod error;
mod logger;

pub use error::LogError;
pub use logger::{LogConfig, Logger, default_log_dir, log_file_name};

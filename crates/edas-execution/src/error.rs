//! Error types for job execution.
//!
//! Every failure a job can hit is a [`JobError`]. Failures never escape as
//! panics or early returns to callers of the non-blocking accessors; the
//! handle turns them into an [`ErrorReport`] and a terminal `Error` status.

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error as StdError;

use serde::{Deserialize, Serialize};
use thiserror::Error;

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// A failure raised by a workflow executor.
///
/// The backtrace is captured when the error is created (subject to
/// `RUST_BACKTRACE`), so it points at the failing workflow rather than at
/// whoever later reports it.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ExecutionError {
  message: String,
  #[source]
  source: Option<BoxError>,
  trace: Option<String>,
}

impl ExecutionError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
      source: None,
      trace: capture_trace(),
    }
  }

  pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
    Self {
      message: message.into(),
      source: Some(source.into()),
      trace: capture_trace(),
    }
  }

  /// Wrap the payload of a panic caught while running a workflow.
  pub fn panicked(payload: &(dyn Any + Send)) -> Self {
    let detail = payload
      .downcast_ref::<&str>()
      .map(|s| s.to_string())
      .or_else(|| payload.downcast_ref::<String>().cloned())
      .unwrap_or_else(|| "non-string panic payload".to_string());
    Self::new(format!("workflow panicked: {}", detail))
  }

  pub fn message(&self) -> &str {
    &self.message
  }

  /// The formatted backtrace, if one was captured.
  pub fn trace(&self) -> Option<&str> {
    self.trace.as_deref()
  }
}

/// Errors raised while reducing partial results to one.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MergeError {
  #[error("no results to merge")]
  NoResults,

  #[error("malformed merge directive `{directive}`, expected `<method>:<parameter>`")]
  MalformedDirective { directive: String },

  #[error("unknown merge method `{method}`")]
  UnknownMergeMethod { method: String },

  #[error("parameter '{parameter}' not defined in result {index}")]
  MissingParameter { parameter: String, index: usize },

  #[error("parameter '{parameter}' in result {index} is not numeric: `{value}`")]
  NonNumericParameter {
    parameter: String,
    index: usize,
    value: String,
  },
}

/// Errors raised by a result sink while saving or delivering a result.
#[derive(Debug, Error)]
pub enum PersistenceError {
  #[error("failed to persist result: {message}")]
  Persist { message: String },

  #[error("failed to deliver to client '{client_id}': {message}")]
  Deliver { client_id: String, message: String },

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Errors involving the worker-pool connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
  #[error("invalid scheduler address `{address}`")]
  InvalidAddress { address: String },

  #[error("failed to connect to scheduler at {address}: {source}")]
  Connect {
    address: String,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to start local worker pool: {source}")]
  LocalPool {
    #[source]
    source: std::io::Error,
  },

  #[error("worker pool connection is closed")]
  Closed,

  #[error("submission for job '{job_id}' was abandoned before reporting")]
  Abandoned { job_id: String },
}

/// Any failure that can end a job.
#[derive(Debug, Error)]
pub enum JobError {
  #[error(transparent)]
  Execution(#[from] ExecutionError),

  #[error(transparent)]
  Merge(#[from] MergeError),

  #[error(transparent)]
  Persistence(#[from] PersistenceError),

  #[error(transparent)]
  Connection(#[from] ConnectionError),
}

impl JobError {
  /// The backtrace carried by the underlying error, if any.
  pub fn trace(&self) -> Option<&str> {
    match self {
      JobError::Execution(e) => e.trace(),
      _ => None,
    }
  }
}

/// A failure as surfaced to callers and result sinks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct ErrorReport {
  pub message: String,
  pub stack_trace: String,
}

impl ErrorReport {
  /// Separator between message and trace in [`ErrorReport::to_wire`].
  pub const SEPARATOR: &'static str = ">~>";

  /// Build a report from an error and its source chain.
  ///
  /// Uses the error's own backtrace when it carries one, otherwise captures
  /// one here. When no backtrace is available at all the trace falls back
  /// to the error's debug form.
  pub fn from_error(error: &JobError) -> Self {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
      message.push_str(": ");
      message.push_str(&cause.to_string());
      source = cause.source();
    }

    let stack_trace = error
      .trace()
      .map(str::to_string)
      .or_else(capture_trace)
      .unwrap_or_else(|| format!("{:?}", error));

    Self {
      message,
      stack_trace,
    }
  }

  /// The single-string form handed to result sinks: `<message>>~><trace>`.
  pub fn to_wire(&self) -> String {
    format!("{}{}{}", self.message, Self::SEPARATOR, self.stack_trace)
  }
}

fn capture_trace() -> Option<String> {
  let backtrace = Backtrace::capture();
  match backtrace.status() {
    BacktraceStatus::Captured => Some(backtrace.to_string()),
    _ => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_report_includes_source_chain() {
    let io = std::io::Error::other("disk full");
    let error = JobError::from(ExecutionError::with_source("regrid failed", io));

    let report = ErrorReport::from_error(&error);

    assert_eq!(report.message, "regrid failed: disk full");
    assert!(!report.stack_trace.is_empty());
  }

  #[test]
  fn test_report_wire_format() {
    let report = ErrorReport {
      message: "boom".to_string(),
      stack_trace: "at workflow".to_string(),
    };
    assert_eq!(report.to_wire(), "boom>~>at workflow");
  }

  #[test]
  fn test_panic_payloads() {
    let from_str = ExecutionError::panicked(&"index out of bounds");
    assert_eq!(from_str.message(), "workflow panicked: index out of bounds");

    let from_string = ExecutionError::panicked(&String::from("bad state"));
    assert_eq!(from_string.message(), "workflow panicked: bad state");

    let other = ExecutionError::panicked(&42_u32);
    assert_eq!(other.message(), "workflow panicked: non-string panic payload");
  }

  #[test]
  fn test_merge_error_is_not_traced_by_itself() {
    let error = JobError::from(MergeError::NoResults);
    assert!(error.trace().is_none());
    assert_eq!(
      ErrorReport::from_error(&error).message,
      "no results to merge"
    );
  }
}

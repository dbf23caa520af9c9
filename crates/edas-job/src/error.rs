use thiserror::Error;

/// Errors raised while building a [`Job`](crate::Job).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobError {
  #[error("job process name is empty")]
  EmptyProcess,

  #[error("expected worker count must be at least 1")]
  NoWorkers,
}

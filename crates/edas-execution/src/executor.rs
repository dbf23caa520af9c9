//! The workflow executor boundary.

use edas_job::{Job, JobResult};

use crate::error::ExecutionError;

/// Runs a job's workflow to completion.
///
/// Implementations are synchronous and may block for as long as the
/// workflow takes. Retrying, if any, is the implementation's concern.
pub trait WorkflowExecutor: Send + Sync {
  fn execute(&self, job: &Job) -> Result<JobResult, ExecutionError>;
}

impl<F> WorkflowExecutor for F
where
  F: Fn(&Job) -> Result<JobResult, ExecutionError> + Send + Sync,
{
  fn execute(&self, job: &Job) -> Result<JobResult, ExecutionError> {
    self(job)
  }
}

use std::io;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use chrono::Utc;
use edas_job::{Job, JobResult};
use edas_log::Logger;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::error::{ExecutionError, JobError};
use crate::executor::WorkflowExecutor;
use crate::handle::CompletionSlot;

/// One worker's run of a job.
///
/// Running the unit calls the executor once and resolves its completion slot
/// once, with the result or with the failure. Panics inside the executor are
/// caught and reported as failures.
pub struct SubmissionUnit {
  id: Uuid,
  job: Arc<Job>,
  executor: Arc<dyn WorkflowExecutor>,
  slot: CompletionSlot,
  log: Logger,
}

impl SubmissionUnit {
  pub fn new(
    job: Arc<Job>,
    executor: Arc<dyn WorkflowExecutor>,
    slot: CompletionSlot,
    log: Logger,
  ) -> Self {
    Self {
      id: Uuid::new_v4(),
      job,
      executor,
      slot,
      log,
    }
  }

  pub fn id(&self) -> Uuid {
    self.id
  }

  pub fn job(&self) -> &Job {
    &self.job
  }

  pub fn worker(&self) -> usize {
    self.slot.worker()
  }

  /// Execute the job and resolve the completion. Blocks until the executor
  /// returns.
  pub fn run(self) {
    let log = self.log.clone();
    log.in_scope(move || {
      let Self {
        id,
        job,
        executor,
        slot,
        ..
      } = self;
      let outcome = run_executor(id, slot.worker(), &job, executor.as_ref());
      slot.complete(outcome.map_err(JobError::from));
    });
  }

  /// Resolve the completion with `error` without running the executor.
  pub fn abort(self, error: JobError) {
    let log = self.log.clone();
    log.in_scope(move || {
      error!(
        unit_id = %self.id,
        job_id = %self.job.request_id(),
        error = %error,
        "submission aborted"
      );
      self.slot.complete(Err(error));
    });
  }

  /// Run the unit on a dedicated thread.
  pub fn spawn(self) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
      .name(format!("edas-unit-{}", self.worker()))
      .spawn(move || self.run())
  }
}

impl std::fmt::Debug for SubmissionUnit {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SubmissionUnit")
      .field("id", &self.id)
      .field("job_id", &self.job.request_id())
      .field("worker", &self.slot.worker())
      .finish()
  }
}

#[instrument(
  name = "submission",
  skip(job, executor),
  fields(job_id = %job.request_id(), process = %job.process())
)]
fn run_executor(
  unit_id: Uuid,
  worker: usize,
  job: &Job,
  executor: &dyn WorkflowExecutor,
) -> Result<JobResult, ExecutionError> {
  let started = Instant::now();
  info!(start_time = %Utc::now().to_rfc3339(), "executing submission");

  let outcome = catch_unwind(AssertUnwindSafe(|| executor.execute(job)))
    .unwrap_or_else(|payload| Err(ExecutionError::panicked(payload.as_ref())));

  let elapsed_ms = started.elapsed().as_millis() as u64;
  match &outcome {
    Ok(result) => {
      info!(elapsed_ms, artifacts = result.artifacts.len(), "submission completed");
    }
    Err(e) => {
      error!(
        elapsed_ms,
        error = %e,
        trace = e.trace().unwrap_or_default(),
        "submission failed"
      );
    }
  }
  outcome
}

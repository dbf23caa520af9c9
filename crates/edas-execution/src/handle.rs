//! Per-job execution handles.
//!
//! An [`ExecutionHandle`] collects the results reported by the workers of one
//! job, merges them once every worker has reported, and hands the merged
//! result to its sink. Callers poll [`ExecutionHandle::status`] or block in
//! [`ExecutionHandle::get_result`].
//!
//! Status moves `Idle -> Executing -> Completed | Error` and never back.
//! A completed job ignores (and counts) further completions. A job that
//! failed keeps recording its remaining workers' results, up to the expected
//! count, but is never finalized.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use edas_job::{Job, JobResult};
use edas_log::Logger;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::{ConnectionError, ErrorReport, JobError};
use crate::merge::merge_results;
use crate::sink::{Delivery, ResultSink};

/// Lifecycle of a job as seen through its handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
  Idle,
  Executing,
  Completed,
  Error,
}

impl Status {
  pub fn is_terminal(self) -> bool {
    matches!(self, Status::Completed | Status::Error)
  }
}

struct State {
  status: Status,
  results: Vec<JobResult>,
  completed_worker_count: usize,
  failed_worker_count: usize,
  ignored_completions: usize,
  /// Set while the merge/persist step runs, so it runs once.
  finalizing: bool,
  merged: Option<JobResult>,
  last_error: Option<ErrorReport>,
  start_time: DateTime<Utc>,
  started: Instant,
}

struct Inner {
  client_id: String,
  job: Arc<Job>,
  sink: Option<Arc<dyn ResultSink>>,
  log: Logger,
  /// Cleared by `get_result`: the caller then owns the merged result and the
  /// handle skips its own persist/deliver step.
  process_results: AtomicBool,
  state: Mutex<State>,
  changed: Condvar,
}

/// Tracks one submitted job. Cloning yields another view of the same job.
#[derive(Clone)]
pub struct ExecutionHandle {
  inner: Arc<Inner>,
}

impl ExecutionHandle {
  /// Create a handle for `job` on behalf of `client_id`.
  ///
  /// Without a sink, merged results and errors are written to the log.
  pub fn new(
    client_id: impl Into<String>,
    job: impl Into<Arc<Job>>,
    sink: Option<Arc<dyn ResultSink>>,
    log: Logger,
  ) -> Self {
    Self {
      inner: Arc::new(Inner {
        client_id: client_id.into(),
        job: job.into(),
        sink,
        log,
        process_results: AtomicBool::new(true),
        state: Mutex::new(State {
          status: Status::Idle,
          results: Vec::new(),
          completed_worker_count: 0,
          failed_worker_count: 0,
          ignored_completions: 0,
          finalizing: false,
          merged: None,
          last_error: None,
          start_time: Utc::now(),
          started: Instant::now(),
        }),
        changed: Condvar::new(),
      }),
    }
  }

  pub fn client_id(&self) -> &str {
    &self.inner.client_id
  }

  /// The id of the tracked job (its request id).
  pub fn job_id(&self) -> &str {
    self.inner.job.request_id()
  }

  pub fn job(&self) -> &Arc<Job> {
    &self.inner.job
  }

  pub fn logger(&self) -> &Logger {
    &self.inner.log
  }

  pub fn status(&self) -> Status {
    self.state().status
  }

  /// Partial results received so far, in arrival order.
  pub fn results(&self) -> Vec<JobResult> {
    self.state().results.clone()
  }

  pub fn completed_worker_count(&self) -> usize {
    self.state().completed_worker_count
  }

  pub fn failed_worker_count(&self) -> usize {
    self.state().failed_worker_count
  }

  /// Completions that arrived after the handle stopped accepting them.
  pub fn ignored_completions(&self) -> usize {
    self.state().ignored_completions
  }

  pub fn expected_worker_count(&self) -> usize {
    self.inner.job.expected_worker_count()
  }

  pub fn last_error(&self) -> Option<ErrorReport> {
    self.state().last_error.clone()
  }

  pub fn start_time(&self) -> DateTime<Utc> {
    self.state().start_time
  }

  pub fn elapsed(&self) -> Duration {
    self.state().started.elapsed()
  }

  /// Restart the clock used for `start_time` and `elapsed`.
  pub fn update_start_time(&self) {
    let mut state = self.state();
    state.start_time = Utc::now();
    state.started = Instant::now();
  }

  /// Move an idle handle to `Executing`. Has no effect in any other state.
  pub fn mark_executing(&self) {
    let mut state = self.state();
    if state.status == Status::Idle {
      state.status = Status::Executing;
      drop(state);
      self.inner.changed.notify_all();
    }
  }

  /// A single-use completion for one worker of this job.
  pub fn completion_slot(&self, worker: usize) -> CompletionSlot {
    CompletionSlot {
      handle: self.clone(),
      worker,
      resolved: false,
    }
  }

  /// Record a worker's result, finalizing once every worker has reported.
  pub fn process_result(&self, result: JobResult) {
    self.inner.log.in_scope(|| {
      let snapshot = {
        let mut state = self.state();
        let expected = self.expected_worker_count();
        // a failed job keeps recording its other workers but never finalizes
        let failed_but_open = state.status == Status::Error
          && !state.finalizing
          && state.completed_worker_count < expected;

        if !failed_but_open && (state.status.is_terminal() || state.finalizing) {
          state.ignored_completions += 1;
          warn!(
            job_id = %self.job_id(),
            status = ?state.status,
            "ignoring result received after the job finished"
          );
          return;
        }

        if !failed_but_open {
          state.status = Status::Executing;
        }
        state.results.push(result);
        state.completed_worker_count += 1;

        info!(
          job_id = %self.job_id(),
          completed = state.completed_worker_count,
          expected,
          "worker result received"
        );

        if failed_but_open || state.completed_worker_count < expected {
          return;
        }
        state.finalizing = true;
        state.results.clone()
      };

      self.finalize(snapshot);
    });
  }

  /// Record a failure. The handle becomes `Error` and the report goes to the
  /// sink, or to the log when there is none.
  pub fn process_failure(&self, error: JobError) {
    self.inner.log.in_scope(|| self.fail(error, false));
  }

  /// Fetch the merged result.
  ///
  /// With `block`, waits until the job is terminal (at most `timeout`, when
  /// given). Returns `Ok(None)` if the result is not ready, and `Err` with
  /// the stored report if a blocking wait ends in failure. Non-blocking calls
  /// never return `Err`.
  ///
  /// Any call hands responsibility for the result to the caller: the handle
  /// will no longer persist or deliver it itself.
  pub fn get_result(
    &self,
    timeout: Option<Duration>,
    block: bool,
  ) -> Result<Option<JobResult>, ErrorReport> {
    self.inner.process_results.store(false, Ordering::SeqCst);

    let state = if block {
      self.wait_terminal(timeout)
    } else {
      self.state()
    };

    match (state.status, &state.last_error) {
      (Status::Completed, _) => Ok(state.merged.clone()),
      (Status::Error, Some(report)) if block => Err(report.clone()),
      _ => Ok(None),
    }
  }

  /// Block until the job is terminal or `timeout` elapses; returns the
  /// status at that point.
  pub fn wait(&self, timeout: Option<Duration>) -> Status {
    self.wait_terminal(timeout).status
  }

  fn wait_terminal(&self, timeout: Option<Duration>) -> MutexGuard<'_, State> {
    let guard = self.state();
    let pending = |state: &mut State| !state.status.is_terminal();

    match timeout {
      Some(timeout) => {
        self
          .inner
          .changed
          .wait_timeout_while(guard, timeout, pending)
          .unwrap_or_else(|e| e.into_inner())
          .0
      }
      None => {
        self
          .inner
          .changed
          .wait_while(guard, pending)
          .unwrap_or_else(|e| e.into_inner())
      }
    }
  }

  fn finalize(&self, results: Vec<JobResult>) {
    info!(job_id = %self.job_id(), results = results.len(), "processing final result");

    let merged = match merge_results(&results) {
      Ok(merged) => merged,
      Err(e) => {
        self.fail(e.into(), true);
        return;
      }
    };

    if self.inner.process_results.load(Ordering::SeqCst) {
      self.persist(&merged);
    }
    if let Some(sink) = &self.inner.sink {
      sink.release(self.client_id(), self.job_id());
    }

    let elapsed = {
      let mut state = self.state();
      state.merged = Some(merged);
      state.status = Status::Completed;
      state.finalizing = false;
      state.started.elapsed()
    };
    self.inner.changed.notify_all();

    info!(
      job_id = %self.job_id(),
      elapsed_ms = elapsed.as_millis() as u64,
      "request completed"
    );
  }

  fn persist(&self, merged: &JobResult) {
    let result_id = merged.id().unwrap_or(self.job_id()).to_string();

    let Some(sink) = &self.inner.sink else {
      let artifacts: Vec<&str> = merged.artifacts.iter().map(|a| a.name.as_str()).collect();
      info!(
        job_id = %self.job_id(),
        result_id = %result_id,
        artifacts = ?artifacts,
        attrs = ?merged.attrs,
        "final result"
      );
      return;
    };

    let outcome = sink.persist(merged).and_then(|location| {
      sink.deliver(&Delivery {
        client_id: self.client_id().to_string(),
        job_id: self.job_id().to_string(),
        result_id: result_id.clone(),
        location,
        include_payload: self.inner.job.send_data(),
      })
    });

    if let Err(e) = outcome {
      error!(job_id = %self.job_id(), error = %e, "error processing final result");

      let failed = Delivery {
        client_id: self.client_id().to_string(),
        job_id: self.job_id().to_string(),
        result_id,
        location: String::new(),
        include_payload: false,
      };
      if let Err(e) = sink.deliver(&failed) {
        error!(job_id = %self.job_id(), error = %e, "failed to send failed-delivery notice");
      }
    }
  }

  fn fail(&self, error: JobError, finalizing: bool) {
    let report = ErrorReport::from_error(&error);

    {
      let mut state = self.state();
      if state.status.is_terminal() || (state.finalizing && !finalizing) {
        state.ignored_completions += 1;
        warn!(
          job_id = %self.job_id(),
          status = ?state.status,
          error = %report.message,
          "ignoring failure received after the job finished"
        );
        return;
      }
      if !finalizing {
        state.failed_worker_count += 1;
      }
      state.status = Status::Error;
      state.finalizing = false;
      state.last_error = Some(report.clone());
    }
    self.inner.changed.notify_all();

    match &self.inner.sink {
      Some(sink) => {
        if let Err(e) = sink.send_error_report(self.client_id(), self.job_id(), &report.to_wire()) {
          error!(job_id = %self.job_id(), error = %e, "failed to send error report");
        }
        sink.release(self.client_id(), self.job_id());
      }
      None => {
        error!(
          job_id = %self.job_id(),
          error = %report.message,
          trace = %report.stack_trace,
          "request failed"
        );
      }
    }
  }

  fn state(&self) -> MutexGuard<'_, State> {
    self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
  }
}

impl std::fmt::Debug for ExecutionHandle {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ExecutionHandle")
      .field("client_id", &self.inner.client_id)
      .field("job_id", &self.job_id())
      .field("status", &self.status())
      .finish()
  }
}

/// The single completion owed by one worker of a job.
///
/// Consumed by [`CompletionSlot::complete`], so each worker reports at most
/// once. A slot dropped without reporting (a worker abandoned by pool
/// shutdown, or unwinding past the executor) reports an `Abandoned` failure.
pub struct CompletionSlot {
  handle: ExecutionHandle,
  worker: usize,
  resolved: bool,
}

impl CompletionSlot {
  pub fn worker(&self) -> usize {
    self.worker
  }

  pub fn handle(&self) -> &ExecutionHandle {
    &self.handle
  }

  pub fn complete(mut self, outcome: Result<JobResult, JobError>) {
    self.resolved = true;
    match outcome {
      Ok(result) => self.handle.process_result(result),
      Err(error) => self.handle.process_failure(error),
    }
  }
}

impl Drop for CompletionSlot {
  fn drop(&mut self) {
    if !self.resolved {
      self.handle.process_failure(
        ConnectionError::Abandoned {
          job_id: self.handle.job_id().to_string(),
        }
        .into(),
      );
    }
  }
}

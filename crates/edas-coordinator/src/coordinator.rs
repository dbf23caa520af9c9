use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use edas_config::ServerConfig;
use edas_execution::{
  ConnectionError, ExecutionHandle, Status, SubmissionUnit, WorkflowExecutor,
};
use edas_job::Job;
use edas_log::Logger;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::pool::{PoolKind, WorkerPool};

/// A submission unit that has been handed to the pool and not yet finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveSubmission {
  pub unit_id: Uuid,
  pub job_id: String,
  pub worker: usize,
}

struct ActiveUnit {
  info: ActiveSubmission,
  task: JoinHandle<()>,
}

/// Submits jobs to a worker pool and tracks their handles.
///
/// The pool is connected once, at construction, and stays up until
/// [`ExecutionCoordinator::terminate`] (or drop). Terminating abandons units
/// that are still queued; units already running finish on their own.
pub struct ExecutionCoordinator {
  config: ServerConfig,
  executor: Arc<dyn WorkflowExecutor>,
  pool: WorkerPool,
  closed: CancellationToken,
  handles: Mutex<HashMap<String, ExecutionHandle>>,
  active: Mutex<Vec<ActiveUnit>>,
  log: Logger,
}

impl ExecutionCoordinator {
  /// Connect to the pool described by `config`.
  pub fn new(
    config: ServerConfig,
    executor: Arc<dyn WorkflowExecutor>,
    log: Logger,
  ) -> Result<Self, ConnectionError> {
    let pool = log.in_scope(|| WorkerPool::connect(&config.pool, config.connect_timeout()))?;

    Ok(Self {
      config,
      executor,
      pool,
      closed: CancellationToken::new(),
      handles: Mutex::new(HashMap::new()),
      active: Mutex::new(Vec::new()),
      log,
    })
  }

  pub fn config(&self) -> &ServerConfig {
    &self.config
  }

  pub fn pool_kind(&self) -> &PoolKind {
    self.pool.kind()
  }

  pub fn workers(&self) -> usize {
    self.pool.workers()
  }

  /// Start one submission unit per expected worker of `handle`'s job.
  ///
  /// Returns without waiting for the units. After termination the handle
  /// receives a `Closed` connection failure instead.
  pub fn submit(&self, job: impl Into<Arc<Job>>, handle: &ExecutionHandle) {
    let job = job.into();
    self.log.in_scope(|| {
      if job.request_id() != handle.job_id() {
        warn!(
          job_id = %job.request_id(),
          handle_job_id = %handle.job_id(),
          "submitting a job under a handle for a different job"
        );
      }

      handle.mark_executing();
      handle.update_start_time();
      self.register(handle);

      let workers = handle.expected_worker_count();
      info!(
        job_id = %handle.job_id(),
        client_id = %handle.client_id(),
        process = %job.process(),
        workers,
        "submitting job"
      );

      for worker in 0..workers {
        let unit = SubmissionUnit::new(
          job.clone(),
          self.executor.clone(),
          handle.completion_slot(worker),
          self.log.clone(),
        );
        self.dispatch(unit);
      }
    });
  }

  fn dispatch(&self, unit: SubmissionUnit) {
    let Some(runtime) = self.pool.handle().filter(|_| !self.closed.is_cancelled()) else {
      unit.abort(ConnectionError::Closed.into());
      return;
    };

    let info = ActiveSubmission {
      unit_id: unit.id(),
      job_id: unit.job().request_id().to_string(),
      worker: unit.worker(),
    };
    let closed = self.closed.clone();
    let task = runtime.spawn_blocking(move || {
      if closed.is_cancelled() {
        unit.abort(ConnectionError::Closed.into());
      } else {
        unit.run();
      }
    });

    let mut active = self.active();
    active.retain(|unit| !unit.task.is_finished());
    active.push(ActiveUnit { info, task });
  }

  fn register(&self, handle: &ExecutionHandle) {
    let previous = self
      .handles()
      .insert(handle.job_id().to_string(), handle.clone());
    if previous.is_some() {
      warn!(job_id = %handle.job_id(), "replacing handle for resubmitted job");
    }
  }

  /// Close the pool connection. Running units are not interrupted.
  pub fn terminate(&self) {
    self.closed.cancel();
    if self.pool.close() {
      self.log.in_scope(|| {
        info!(
          outstanding = self.active_submissions().len(),
          "worker pool connection closed"
        )
      });
    }
  }

  pub fn is_down(&self) -> bool {
    self.closed.is_cancelled() || self.pool.is_closed()
  }

  /// Units handed to the pool that have not finished yet.
  pub fn active_submissions(&self) -> Vec<ActiveSubmission> {
    let mut active = self.active();
    active.retain(|unit| !unit.task.is_finished());
    active.iter().map(|unit| unit.info.clone()).collect()
  }

  /// Poll `handle` until it reaches a terminal status.
  pub fn wait_until_complete(&self, handle: &ExecutionHandle) -> Status {
    let interval = self.config.poll_interval();
    loop {
      let status = handle.status();
      if status.is_terminal() {
        return status;
      }
      thread::sleep(interval);
    }
  }

  /// Poll the handle registered for `job_id` until it is terminal. `None` if
  /// no such job was submitted.
  pub fn wait_until_job_completes(&self, job_id: &str) -> Option<Status> {
    let handle = self.handle(job_id)?;
    Some(self.wait_until_complete(&handle))
  }

  pub fn handle(&self, job_id: &str) -> Option<ExecutionHandle> {
    self.handles().get(job_id).cloned()
  }

  pub fn has_result(&self, job_id: &str) -> bool {
    self.result_status(job_id) == Some(Status::Completed)
  }

  pub fn result_status(&self, job_id: &str) -> Option<Status> {
    self.handle(job_id).map(|handle| handle.status())
  }

  /// Forget the handle registered for `job_id`.
  pub fn remove_handle(&self, job_id: &str) -> Option<ExecutionHandle> {
    self.handles().remove(job_id)
  }

  fn handles(&self) -> MutexGuard<'_, HashMap<String, ExecutionHandle>> {
    self.handles.lock().unwrap_or_else(|e| e.into_inner())
  }

  fn active(&self) -> MutexGuard<'_, Vec<ActiveUnit>> {
    self.active.lock().unwrap_or_else(|e| e.into_inner())
  }
}

impl Drop for ExecutionCoordinator {
  fn drop(&mut self) {
    self.terminate();
  }
}

impl std::fmt::Debug for ExecutionCoordinator {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ExecutionCoordinator")
      .field("pool", self.pool.kind())
      .field("workers", &self.pool.workers())
      .field("down", &self.is_down())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use edas_config::PoolConfig;
  use edas_execution::ExecutionError;
  use edas_job::JobResult;
  use std::time::Duration;

  fn coordinator(workers: usize) -> ExecutionCoordinator {
    let config = ServerConfig {
      pool: PoolConfig::Local {
        workers: Some(workers),
      },
      poll_interval_ms: 10,
      ..ServerConfig::default()
    };
    let executor: Arc<dyn WorkflowExecutor> =
      Arc::new(|job: &Job| -> Result<JobResult, ExecutionError> {
        Ok(JobResult::new().with_attr("process", job.process()))
      });
    ExecutionCoordinator::new(config, executor, Logger::disabled()).unwrap()
  }

  fn job(id: &str, workers: usize) -> Arc<Job> {
    Arc::new(Job::builder("ave").request_id(id).workers(workers).build().unwrap())
  }

  #[test]
  fn test_submit_registers_handle() {
    let coordinator = coordinator(2);
    let job = job("j1", 2);
    let handle = ExecutionHandle::new("c", job.clone(), None, Logger::disabled());

    coordinator.submit(job, &handle);

    assert_eq!(coordinator.wait_until_complete(&handle), Status::Completed);
    assert!(coordinator.has_result("j1"));
    assert_eq!(coordinator.result_status("j1"), Some(Status::Completed));
    assert_eq!(coordinator.result_status("other"), None);
    assert!(!coordinator.has_result("other"));
  }

  #[test]
  fn test_wait_until_job_completes_unknown_job() {
    let coordinator = coordinator(1);
    assert_eq!(coordinator.wait_until_job_completes("missing"), None);
  }

  #[test]
  fn test_remove_handle() {
    let coordinator = coordinator(1);
    let job = job("j2", 1);
    let handle = ExecutionHandle::new("c", job.clone(), None, Logger::disabled());
    coordinator.submit(job, &handle);
    coordinator.wait_until_complete(&handle);

    assert!(coordinator.remove_handle("j2").is_some());
    assert!(coordinator.handle("j2").is_none());
  }

  #[test]
  fn test_submit_after_terminate_fails_handle() {
    let coordinator = coordinator(1);
    coordinator.terminate();
    assert!(coordinator.is_down());

    let job = job("late", 2);
    let handle = ExecutionHandle::new("c", job.clone(), None, Logger::disabled());
    coordinator.submit(job, &handle);

    assert_eq!(handle.status(), Status::Error);
    let report = handle.last_error().unwrap();
    assert_eq!(report.message, ConnectionError::Closed.to_string());
    assert_eq!(handle.get_result(Some(Duration::from_millis(10)), true).unwrap_err(), report);
  }
}

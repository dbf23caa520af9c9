//! Result sinks.
//!
//! A sink is where finished work goes: it persists merged results, tells
//! clients where to find them, and receives error reports. Handles tolerate
//! the absence of a sink (they log instead) and the failure of one (they log
//! and send a failed-delivery notice).

use std::sync::{Mutex, MutexGuard};

use edas_job::JobResult;
use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;

/// Notification that a result is available to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
  pub client_id: String,
  pub job_id: String,
  pub result_id: String,
  /// Where the result was persisted. Empty when persistence failed.
  pub location: String,
  /// Whether the payload itself should be sent, not just its location.
  pub include_payload: bool,
}

impl Delivery {
  /// True for the notice sent when a result could not be saved or delivered.
  pub fn is_failed(&self) -> bool {
    self.location.is_empty()
  }
}

/// Destination for finished results and error reports.
pub trait ResultSink: Send + Sync {
  /// Persist a merged result, returning its location.
  fn persist(&self, result: &JobResult) -> Result<String, PersistenceError>;

  /// Notify a client about a persisted (or failed) result.
  fn deliver(&self, delivery: &Delivery) -> Result<(), PersistenceError>;

  /// Hand a wire-form error report to a client.
  fn send_error_report(
    &self,
    client_id: &str,
    job_id: &str,
    report: &str,
  ) -> Result<(), PersistenceError>;

  /// Called once a handle reaches a terminal state and no longer needs the
  /// sink to track it.
  fn release(&self, _client_id: &str, _job_id: &str) {}
}

/// A sink that keeps everything in memory.
///
/// Useful for tests and for embedding callers that poll the sink instead of
/// the handle.
#[derive(Debug, Default)]
pub struct MemorySink {
  state: Mutex<MemorySinkState>,
  fail_persist: bool,
}

#[derive(Debug, Default)]
struct MemorySinkState {
  persisted: Vec<JobResult>,
  deliveries: Vec<Delivery>,
  error_reports: Vec<(String, String, String)>,
  released: Vec<(String, String)>,
}

impl MemorySink {
  pub fn new() -> Self {
    Self::default()
  }

  /// A sink whose `persist` always fails.
  pub fn failing() -> Self {
    Self {
      fail_persist: true,
      ..Self::default()
    }
  }

  pub fn persisted(&self) -> Vec<JobResult> {
    self.state().persisted.clone()
  }

  pub fn deliveries(&self) -> Vec<Delivery> {
    self.state().deliveries.clone()
  }

  /// Error reports as `(client_id, job_id, report)`.
  pub fn error_reports(&self) -> Vec<(String, String, String)> {
    self.state().error_reports.clone()
  }

  /// Released handles as `(client_id, job_id)`.
  pub fn released(&self) -> Vec<(String, String)> {
    self.state().released.clone()
  }

  fn state(&self) -> MutexGuard<'_, MemorySinkState> {
    self.state.lock().unwrap_or_else(|e| e.into_inner())
  }
}

impl ResultSink for MemorySink {
  fn persist(&self, result: &JobResult) -> Result<String, PersistenceError> {
    if self.fail_persist {
      return Err(PersistenceError::Persist {
        message: "memory sink configured to fail".to_string(),
      });
    }
    let mut state = self.state();
    state.persisted.push(result.clone());
    Ok(format!("memory://{}", state.persisted.len() - 1))
  }

  fn deliver(&self, delivery: &Delivery) -> Result<(), PersistenceError> {
    self.state().deliveries.push(delivery.clone());
    Ok(())
  }

  fn send_error_report(
    &self,
    client_id: &str,
    job_id: &str,
    report: &str,
  ) -> Result<(), PersistenceError> {
    self.state().error_reports.push((
      client_id.to_string(),
      job_id.to_string(),
      report.to_string(),
    ));
    Ok(())
  }

  fn release(&self, client_id: &str, job_id: &str) {
    self
      .state()
      .released
      .push((client_id.to_string(), job_id.to_string()));
  }
}

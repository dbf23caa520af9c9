//! Job descriptions.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::error::JobError;
use crate::uid::{DEFAULT_ID_LENGTH, random_id, with_suffix};

/// Run argument controlling whether delivered results carry their payload.
pub const SEND_DATA_ARG: &str = "sendData";

/// An immutable description of one unit of submitted work.
///
/// A job is executed once per expected worker; the handle tracking it
/// completes when every worker has reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
  request_id: String,
  process: String,
  #[serde(default)]
  run_args: BTreeMap<String, String>,
  expected_worker_count: NonZeroUsize,
}

impl Job {
  /// Start building a job for the given process.
  pub fn builder(process: impl Into<String>) -> JobBuilder {
    JobBuilder {
      request_id: None,
      process: process.into(),
      run_args: BTreeMap::new(),
      workers: 1,
    }
  }

  /// Unique id of this request.
  pub fn request_id(&self) -> &str {
    &self.request_id
  }

  /// Name of the requested process.
  pub fn process(&self) -> &str {
    &self.process
  }

  pub fn run_args(&self) -> &BTreeMap<String, String> {
    &self.run_args
  }

  pub fn run_arg(&self, key: &str) -> Option<&str> {
    self.run_args.get(key).map(String::as_str)
  }

  /// Number of worker completions required before results are merged.
  pub fn expected_worker_count(&self) -> usize {
    self.expected_worker_count.get()
  }

  /// Whether delivered results should include the payload.
  ///
  /// Reads the `sendData` run argument; anything starting with `t` (any case)
  /// is true, and a missing argument defaults to true.
  pub fn send_data(&self) -> bool {
    self
      .run_arg(SEND_DATA_ARG)
      .map(|v| v.trim().to_lowercase().starts_with('t'))
      .unwrap_or(true)
  }
}

/// Builder for [`Job`].
#[derive(Debug, Clone)]
pub struct JobBuilder {
  request_id: Option<String>,
  process: String,
  run_args: BTreeMap<String, String>,
  workers: usize,
}

impl JobBuilder {
  /// Use an explicit request id instead of a generated one.
  pub fn request_id(mut self, request_id: impl Into<String>) -> Self {
    self.request_id = Some(request_id.into());
    self
  }

  pub fn run_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.run_args.insert(key.into(), value.into());
    self
  }

  pub fn run_args<I, K, V>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
  {
    self
      .run_args
      .extend(args.into_iter().map(|(k, v)| (k.into(), v.into())));
    self
  }

  /// Number of workers expected to report a result.
  pub fn workers(mut self, workers: usize) -> Self {
    self.workers = workers;
    self
  }

  pub fn build(self) -> Result<Job, JobError> {
    if self.process.trim().is_empty() {
      return Err(JobError::EmptyProcess);
    }
    let expected_worker_count = NonZeroUsize::new(self.workers).ok_or(JobError::NoWorkers)?;
    let request_id = match self.request_id {
      Some(id) if !id.trim().is_empty() => id,
      _ => with_suffix(&self.process, &random_id(DEFAULT_ID_LENGTH)),
    };

    Ok(Job {
      request_id,
      process: self.process,
      run_args: self.run_args,
      expected_worker_count,
    })
  }
}

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use edas_execution::{Delivery, PersistenceError, ResultSink};
use edas_job::JobResult;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{CacheDir, StoreError};

/// Deliveries are appended here, one JSON object per line.
pub const DELIVERIES_FILE: &str = "deliveries.jsonl";

/// Error reports are appended here, one JSON object per line.
pub const ERRORS_FILE: &str = "errors.jsonl";

#[derive(Debug, Serialize, Deserialize)]
struct ErrorRecord {
  client_id: String,
  job_id: String,
  report: String,
}

/// A [`ResultSink`] that writes merged results into a cache directory.
///
/// Each result is stored as `{id}.json` in the cache root and its path is the
/// location handed to the delivery. Deliveries and error reports are appended
/// to journal files next to the results.
pub struct FsResultSink {
  cache: CacheDir,
  journal: Mutex<()>,
}

impl FsResultSink {
  pub fn new(cache: CacheDir) -> Self {
    Self {
      cache,
      journal: Mutex::new(()),
    }
  }

  pub fn cache(&self) -> &CacheDir {
    &self.cache
  }

  /// Read back a result written by [`ResultSink::persist`].
  pub fn load(&self, location: impl AsRef<Path>) -> Result<JobResult, StoreError> {
    let path = location.as_ref();
    let bytes = fs::read(path).map_err(|e| StoreError::io(path, e))?;
    Ok(serde_json::from_slice(&bytes)?)
  }

  /// All deliveries recorded so far, oldest first.
  pub fn deliveries(&self) -> Result<Vec<Delivery>, StoreError> {
    self.read_journal(DELIVERIES_FILE)
  }

  /// All error reports recorded so far as `(client_id, job_id, report)`.
  pub fn error_reports(&self) -> Result<Vec<(String, String, String)>, StoreError> {
    let records: Vec<ErrorRecord> = self.read_journal(ERRORS_FILE)?;
    Ok(
      records
        .into_iter()
        .map(|r| (r.client_id, r.job_id, r.report))
        .collect(),
    )
  }

  fn append<T: Serialize>(&self, file: &str, record: &T) -> Result<(), StoreError> {
    let root = self.cache.ensure()?;
    let path = root.join(file);
    let mut line = serde_json::to_vec(record)?;
    line.push(b'\n');

    let _guard = self.journal.lock().unwrap_or_else(|e| e.into_inner());
    let mut out = OpenOptions::new()
      .create(true)
      .append(true)
      .open(&path)
      .map_err(|e| StoreError::io(&path, e))?;
    out.write_all(&line).map_err(|e| StoreError::io(&path, e))
  }

  fn read_journal<T: for<'de> Deserialize<'de>>(&self, file: &str) -> Result<Vec<T>, StoreError> {
    let path = self.cache.root().join(file);
    let content = match fs::read_to_string(&path) {
      Ok(content) => content,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(e) => return Err(StoreError::io(&path, e)),
    };
    content
      .lines()
      .filter(|line| !line.trim().is_empty())
      .map(|line| serde_json::from_str(line).map_err(StoreError::from))
      .collect()
  }

  fn result_path(&self) -> Result<PathBuf, StoreError> {
    self.cache.ensure()?;
    Ok(self.cache.unique_file(Some("json")))
  }
}

impl ResultSink for FsResultSink {
  fn persist(&self, result: &JobResult) -> Result<String, PersistenceError> {
    let path = self.result_path()?;
    let bytes = serde_json::to_vec_pretty(result).map_err(StoreError::from)?;
    fs::write(&path, bytes).map_err(|e| StoreError::io(&path, e))?;

    debug!(path = %path.display(), artifacts = result.artifacts.len(), "persisted result");
    Ok(path.display().to_string())
  }

  fn deliver(&self, delivery: &Delivery) -> Result<(), PersistenceError> {
    if delivery.is_failed() {
      warn!(
        client_id = %delivery.client_id,
        job_id = %delivery.job_id,
        "recording failed delivery"
      );
    } else {
      info!(
        client_id = %delivery.client_id,
        job_id = %delivery.job_id,
        location = %delivery.location,
        include_payload = delivery.include_payload,
        "result available"
      );
    }
    self
      .append(DELIVERIES_FILE, delivery)
      .map_err(|e| PersistenceError::Deliver {
        client_id: delivery.client_id.clone(),
        message: e.to_string(),
      })
  }

  fn send_error_report(
    &self,
    client_id: &str,
    job_id: &str,
    report: &str,
  ) -> Result<(), PersistenceError> {
    let record = ErrorRecord {
      client_id: client_id.to_string(),
      job_id: job_id.to_string(),
      report: report.to_string(),
    };
    self
      .append(ERRORS_FILE, &record)
      .map_err(|e| PersistenceError::Deliver {
        client_id: client_id.to_string(),
        message: e.to_string(),
      })
  }

  fn release(&self, client_id: &str, job_id: &str) {
    debug!(client_id, job_id, "released job");
  }
}

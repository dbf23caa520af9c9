//! Handles finalizing into a filesystem sink.

use std::sync::Arc;

use edas_execution::{ExecutionError, ExecutionHandle, ResultSink, Status};
use edas_job::{Job, JobResult};
use edas_log::Logger;
use edas_store::{CacheDir, FsResultSink};
use serde_json::json;

fn handle(sink: Arc<FsResultSink>, workers: usize) -> ExecutionHandle {
  let job = Job::builder("xarray.ave")
    .request_id("job-fs")
    .workers(workers)
    .build()
    .expect("valid job");
  ExecutionHandle::new("client-fs", job, Some(sink as Arc<dyn ResultSink>), Logger::disabled())
}

#[test]
fn test_completed_job_is_written_and_delivered() {
  let tmp = tempfile::tempdir().expect("failed to create temp dir");
  let sink = Arc::new(FsResultSink::new(CacheDir::new(tmp.path().join("cache"))));
  let handle = handle(sink.clone(), 2);

  handle.process_result(JobResult::new().with_artifact("tas", json!([280.1])));
  handle.process_result(JobResult::new().with_artifact("pr", json!([0.002])));
  assert_eq!(handle.status(), Status::Completed);

  let deliveries = sink.deliveries().expect("read deliveries");
  assert_eq!(deliveries.len(), 1);
  let delivery = &deliveries[0];
  assert_eq!(delivery.client_id, "client-fs");
  assert_eq!(delivery.result_id, "job-fs");
  assert!(!delivery.is_failed());

  let stored = sink.load(&delivery.location).expect("load result");
  let names: Vec<_> = stored.artifacts.iter().map(|a| a.name.as_str()).collect();
  assert_eq!(names, vec!["tas", "pr"]);
}

#[test]
fn test_failed_job_writes_error_report() {
  let tmp = tempfile::tempdir().expect("failed to create temp dir");
  let sink = Arc::new(FsResultSink::new(CacheDir::new(tmp.path())));
  let handle = handle(sink.clone(), 1);

  handle.process_failure(ExecutionError::new("variable tas not found").into());

  assert_eq!(handle.status(), Status::Error);
  let reports = sink.error_reports().expect("read error reports");
  assert_eq!(reports.len(), 1);
  assert_eq!(reports[0].1, "job-fs");
  assert!(reports[0].2.starts_with("variable tas not found>~>"));
  assert!(sink.deliveries().expect("read deliveries").is_empty());
}

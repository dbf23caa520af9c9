//! Concurrent completion of multi-worker jobs through execution handles.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use edas_execution::{
  ExecutionError, ExecutionHandle, JobError, MemorySink, ResultSink, Status, SubmissionUnit,
  WorkflowExecutor,
};
use edas_job::{Job, JobResult, MERGE_ATTR};
use edas_log::Logger;
use serde_json::json;

fn job(id: &str, workers: usize) -> Arc<Job> {
  Arc::new(
    Job::builder("xarray.max")
      .request_id(id)
      .workers(workers)
      .build()
      .expect("valid job"),
  )
}

#[test]
fn test_workers_finishing_out_of_order_complete_once() {
  let sink = Arc::new(MemorySink::new());
  let job = job("job-a", 4);
  let handle = ExecutionHandle::new(
    "client",
    job.clone(),
    Some(sink.clone() as Arc<dyn ResultSink>),
    Logger::disabled(),
  );

  let executor: Arc<dyn WorkflowExecutor> =
    Arc::new(|_: &Job| -> Result<JobResult, ExecutionError> {
      let worker = thread::current()
        .name()
        .and_then(|n| n.rsplit('-').next())
        .and_then(|n| n.parse::<u64>().ok())
        .unwrap_or(0);
      thread::sleep(Duration::from_millis(40 - worker * 10));
      Ok(
        JobResult::new()
          .with_attr(MERGE_ATTR, "min:score")
          .with_attr("score", (10 + worker).to_string())
          .with_attr("worker", worker.to_string()),
      )
    });

  let threads: Vec<_> = (0..4)
    .map(|worker| {
      SubmissionUnit::new(
        job.clone(),
        executor.clone(),
        handle.completion_slot(worker),
        Logger::disabled(),
      )
      .spawn()
      .expect("spawn unit")
    })
    .collect();
  for t in threads {
    t.join().expect("unit thread");
  }

  assert_eq!(handle.status(), Status::Completed);
  assert_eq!(handle.completed_worker_count(), 4);
  assert_eq!(sink.persisted().len(), 1);
  assert_eq!(sink.deliveries().len(), 1);

  let merged = &sink.persisted()[0];
  assert_eq!(merged.attr("score"), Some("10"));
  assert_eq!(merged.attr("worker"), Some("0"));
}

#[test]
fn test_failure_in_one_handle_does_not_affect_another() {
  let good = ExecutionHandle::new("c", job("good", 1), None, Logger::disabled());
  let bad = ExecutionHandle::new("c", job("bad", 1), None, Logger::disabled());

  bad.process_failure(JobError::from(ExecutionError::new("bad input")));
  good.process_result(JobResult::new().with_artifact("out", json!([1, 2])));

  assert_eq!(bad.status(), Status::Error);
  assert_eq!(good.status(), Status::Completed);
  assert!(good.last_error().is_none());
}

#[test]
fn test_blocking_get_result_is_bounded_by_timeout() {
  let handle = ExecutionHandle::new("c", job("slow", 1), None, Logger::disabled());

  let started = Instant::now();
  let result = handle.get_result(Some(Duration::from_millis(100)), true);
  let waited = started.elapsed();

  assert_eq!(result, Ok(None));
  assert!(waited >= Duration::from_millis(100));
  assert!(waited < Duration::from_secs(5));
}

#[test]
fn test_blocking_get_result_wakes_on_completion() {
  let handle = ExecutionHandle::new("c", job("wake", 1), None, Logger::disabled());
  let worker = handle.clone();

  let t = thread::spawn(move || {
    thread::sleep(Duration::from_millis(50));
    worker.process_result(JobResult::new().with_artifact("out", json!(3)));
  });

  let merged = handle
    .get_result(None, true)
    .expect("no failure")
    .expect("result ready");
  assert!(merged.artifact("out").is_some());
  t.join().expect("worker thread");
}

#[test]
fn test_blocking_get_result_returns_failure() {
  let handle = ExecutionHandle::new("c", job("fails", 2), None, Logger::disabled());
  let worker = handle.clone();

  let t = thread::spawn(move || {
    worker.process_failure(ExecutionError::new("dataset not found").into());
  });

  let err = handle
    .get_result(Some(Duration::from_secs(5)), true)
    .expect_err("failure surfaces");
  assert_eq!(err.message, "dataset not found");
  assert!(err.to_wire().starts_with("dataset not found>~>"));
  t.join().expect("worker thread");
}

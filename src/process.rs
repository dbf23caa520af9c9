use std::process::{Command, Stdio};

use edas_execution::{ExecutionError, WorkflowExecutor};
use edas_job::{Job, JobResult};
use tracing::debug;

/// Runs an external program as the workflow.
///
/// The job is described to the program through environment variables:
///
/// - `EDAS_REQUEST_ID`, `EDAS_PROCESS`, `EDAS_WORKERS`
/// - `EDAS_RUN_ARGS`: all run arguments as a JSON object
/// - `EDAS_ARG_<NAME>`: one per run argument, the name upper-cased with
///   non-alphanumerics replaced by `_`
///
/// The program must print a JSON [`JobResult`] on stdout and exit with
/// status 0.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
  program: String,
  args: Vec<String>,
}

impl ProcessExecutor {
  pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
    Self {
      program: program.into(),
      args,
    }
  }
}

impl WorkflowExecutor for ProcessExecutor {
  fn execute(&self, job: &Job) -> Result<JobResult, ExecutionError> {
    let run_args = serde_json::to_string(job.run_args())
      .map_err(|e| ExecutionError::with_source("failed to encode run arguments", e))?;

    let mut command = Command::new(&self.program);
    command
      .args(&self.args)
      .env("EDAS_REQUEST_ID", job.request_id())
      .env("EDAS_PROCESS", job.process())
      .env("EDAS_WORKERS", job.expected_worker_count().to_string())
      .env("EDAS_RUN_ARGS", run_args)
      .stdin(Stdio::null());
    for (key, value) in job.run_args() {
      command.env(env_name(key), value);
    }

    debug!(program = %self.program, args = ?self.args, "spawning workflow process");
    let output = command
      .output()
      .map_err(|e| ExecutionError::with_source(format!("failed to run `{}`", self.program), e))?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      return Err(ExecutionError::new(format!(
        "`{}` exited with {}: {}",
        self.program,
        output.status,
        stderr.trim()
      )));
    }

    serde_json::from_slice(&output.stdout).map_err(|e| {
      ExecutionError::with_source(format!("`{}` did not print a valid result", self.program), e)
    })
  }
}

fn env_name(key: &str) -> String {
  let name: String = key
    .chars()
    .map(|c| {
      if c.is_ascii_alphanumeric() {
        c.to_ascii_uppercase()
      } else {
        '_'
      }
    })
    .collect();
  format!("EDAS_ARG_{}", name)
}

mod process;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use edas_config::{PoolConfig, ServerConfig};
use edas_coordinator::ExecutionCoordinator;
use edas_execution::{ExecutionHandle, ResultSink, Status};
use edas_job::Job;
use edas_log::{LogConfig, Logger, default_log_dir};
use edas_store::{CacheDir, FsResultSink};

use crate::process::ProcessExecutor;

/// EDAS - run analytic jobs across a pool of workers and merge their results
#[derive(Parser)]
#[command(name = "edas")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Server configuration file (JSON, or app.conf style properties)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  /// Directory for the debug log file (default: ~/.edas/logs)
  #[arg(long, global = true)]
  log_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a job, using an external program as the workflow
  Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
  /// Name of the requested process
  #[arg(long)]
  process: String,

  /// Request id (default: <process>-<random suffix>)
  #[arg(long)]
  id: Option<String>,

  /// Run argument as key=value, may be repeated
  #[arg(long = "arg", value_parser = parse_key_value)]
  run_args: Vec<(String, String)>,

  /// Number of workers the job is split across
  #[arg(long, default_value_t = 1)]
  workers: usize,

  /// Size of the local worker pool
  #[arg(long, conflicts_with = "scheduler")]
  pool_workers: Option<usize>,

  /// Remote scheduler address (host:port)
  #[arg(long)]
  scheduler: Option<String>,

  /// Give up waiting after this many seconds
  #[arg(long)]
  timeout: Option<u64>,

  /// Persist the result to the cache instead of printing it
  #[arg(long)]
  save: bool,

  /// Cache directory (default: ~/.edas/cache)
  #[arg(long)]
  cache_dir: Option<PathBuf>,

  /// Client id reported with deliveries
  #[arg(long, default_value = "cli")]
  client: String,

  /// Workflow program and its arguments
  #[arg(last = true, required = true)]
  command: Vec<String>,
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let mut config = match &cli.config {
    Some(path) => ServerConfig::load(path)
      .with_context(|| format!("failed to load config: {}", path.display()))?,
    None => ServerConfig::default(),
  };
  if let Some(dir) = cli.log_dir {
    config.log_dir = Some(dir);
  }

  let logger = Logger::init(&LogConfig {
    filter: None,
    log_dir: config.log_dir.clone().or_else(default_log_dir),
    ansi: std::io::stderr().is_terminal(),
  })
  .context("failed to initialize logging")?;
  logger
    .install_global()
    .context("failed to install logger")?;

  match cli.command {
    Some(Commands::Run(args)) => run(config, args, logger),
    None => {
      println!("edas - use --help to see available commands");
      Ok(())
    }
  }
}

fn run(mut config: ServerConfig, args: RunArgs, logger: Logger) -> Result<()> {
  if let Some(address) = args.scheduler {
    config.pool = PoolConfig::Remote {
      scheduler_address: address,
    };
  } else if let Some(workers) = args.pool_workers {
    config.pool = PoolConfig::Local {
      workers: Some(workers),
    };
  }
  if let Some(dir) = args.cache_dir {
    config.cache_dir = Some(dir);
  }

  let mut builder = Job::builder(&args.process)
    .run_args(args.run_args)
    .workers(args.workers);
  if let Some(id) = args.id {
    builder = builder.request_id(id);
  }
  let job = Arc::new(builder.build().context("invalid job")?);

  let (program, program_args) = args
    .command
    .split_first()
    .ok_or_else(|| anyhow!("no workflow program given"))?;
  let executor = Arc::new(ProcessExecutor::new(program, program_args.to_vec()));

  let coordinator = ExecutionCoordinator::new(config.clone(), executor, logger.clone())
    .context("failed to connect to worker pool")?;
  let timeout = args.timeout.map(Duration::from_secs);

  let outcome = if args.save {
    save_result(&coordinator, &config, &args.client, job, timeout, logger)
  } else {
    print_result(&coordinator, &args.client, job, timeout, logger)
  };

  coordinator.terminate();
  outcome
}

fn print_result(
  coordinator: &ExecutionCoordinator,
  client: &str,
  job: Arc<Job>,
  timeout: Option<Duration>,
  logger: Logger,
) -> Result<()> {
  let handle = ExecutionHandle::new(client, job.clone(), None, logger);
  coordinator.submit(job, &handle);

  match handle.get_result(timeout, true) {
    Ok(Some(result)) => {
      println!("{}", serde_json::to_string_pretty(&result)?);
      Ok(())
    }
    Ok(None) => bail!("timed out waiting for job {}", handle.job_id()),
    Err(report) => Err(report).with_context(|| format!("job {} failed", handle.job_id())),
  }
}

fn save_result(
  coordinator: &ExecutionCoordinator,
  config: &ServerConfig,
  client: &str,
  job: Arc<Job>,
  timeout: Option<Duration>,
  logger: Logger,
) -> Result<()> {
  let cache = match &config.cache_dir {
    Some(dir) => CacheDir::new(dir),
    None => CacheDir::home()?,
  };
  let sink = Arc::new(FsResultSink::new(cache));
  let handle = ExecutionHandle::new(
    client,
    job.clone(),
    Some(sink.clone() as Arc<dyn ResultSink>),
    logger,
  );
  coordinator.submit(job, &handle);

  let status = match timeout {
    Some(timeout) => handle.wait(Some(timeout)),
    None => coordinator.wait_until_complete(&handle),
  };

  match status {
    Status::Completed => {
      let delivery = sink
        .deliveries()?
        .into_iter()
        .rev()
        .find(|d| d.job_id == handle.job_id())
        .ok_or_else(|| anyhow!("no delivery recorded for job {}", handle.job_id()))?;
      if delivery.is_failed() {
        bail!("job {} completed but its result could not be saved", handle.job_id());
      }
      info!(job_id = %handle.job_id(), location = %delivery.location, "result saved");
      println!("{}", delivery.location);
      Ok(())
    }
    Status::Error => {
      let report = handle
        .last_error()
        .ok_or_else(|| anyhow!("job {} failed", handle.job_id()))?;
      Err(report).with_context(|| format!("job {} failed", handle.job_id()))
    }
    Status::Idle | Status::Executing => {
      bail!("timed out waiting for job {}", handle.job_id())
    }
  }
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
  let (key, value) = s
    .split_once('=')
    .ok_or_else(|| format!("expected key=value, got `{}`", s))?;
  let key = key.trim();
  if key.is_empty() {
    return Err(format!("empty key in `{}`", s));
  }
  Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_key_value() {
    assert_eq!(
      parse_key_value("domain=d0").unwrap(),
      ("domain".to_string(), "d0".to_string())
    );
    assert_eq!(
      parse_key_value("expr=a=b").unwrap(),
      ("expr".to_string(), "a=b".to_string())
    );
    assert!(parse_key_value("novalue").is_err());
    assert!(parse_key_value("=x").is_err());
  }

  #[test]
  fn test_cli_parses_run() {
    let cli = Cli::try_parse_from([
      "edas", "run", "--process", "ave", "--arg", "variable=tas", "--workers", "2", "--", "sh",
      "-c", "true",
    ])
    .unwrap();

    let Some(Commands::Run(args)) = cli.command else {
      panic!("expected run command");
    };
    assert_eq!(args.process, "ave");
    assert_eq!(args.workers, 2);
    assert_eq!(args.run_args, vec![("variable".to_string(), "tas".to_string())]);
    assert_eq!(args.command, vec!["sh", "-c", "true"]);
  }
}

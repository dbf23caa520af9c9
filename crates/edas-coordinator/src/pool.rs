use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use edas_config::PoolConfig;
use edas_execution::ConnectionError;
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{debug, info, warn};

/// Which kind of pool the coordinator is attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolKind {
  Local,
  Remote { address: SocketAddr },
}

/// The worker pool connection.
///
/// Units always run on an in-process blocking pool bounded by the worker
/// count. A remote pool additionally holds the scheduler connection open for
/// as long as the pool is up.
pub(crate) struct WorkerPool {
  kind: PoolKind,
  workers: usize,
  runtime: Mutex<Option<Runtime>>,
  scheduler: Mutex<Option<TcpStream>>,
}

impl WorkerPool {
  pub(crate) fn connect(config: &PoolConfig, timeout: Duration) -> Result<Self, ConnectionError> {
    let (kind, workers, scheduler) = match config {
      PoolConfig::Local { workers } => {
        let workers = workers.unwrap_or_else(available_parallelism).max(1);
        (PoolKind::Local, workers, None)
      }
      PoolConfig::Remote { scheduler_address } => {
        let address = resolve(scheduler_address)?;
        let stream = TcpStream::connect_timeout(&address, timeout).map_err(|source| {
          ConnectionError::Connect {
            address: scheduler_address.clone(),
            source,
          }
        })?;
        info!(%address, "connected to scheduler");
        (
          PoolKind::Remote { address },
          available_parallelism(),
          Some(stream),
        )
      }
    };

    let runtime = Builder::new_multi_thread()
      .worker_threads(1)
      .max_blocking_threads(workers)
      .thread_name("edas-worker")
      .enable_all()
      .build()
      .map_err(|source| ConnectionError::LocalPool { source })?;

    debug!(?kind, workers, "worker pool started");

    Ok(Self {
      kind,
      workers,
      runtime: Mutex::new(Some(runtime)),
      scheduler: Mutex::new(scheduler),
    })
  }

  pub(crate) fn kind(&self) -> &PoolKind {
    &self.kind
  }

  pub(crate) fn workers(&self) -> usize {
    self.workers
  }

  /// A handle for spawning onto the pool, or `None` once closed.
  pub(crate) fn handle(&self) -> Option<Handle> {
    lock(&self.runtime).as_ref().map(|rt| rt.handle().clone())
  }

  pub(crate) fn is_closed(&self) -> bool {
    lock(&self.runtime).is_none()
  }

  /// Close the pool without waiting for running units. Units still queued are
  /// dropped. Returns false if the pool was already closed.
  pub(crate) fn close(&self) -> bool {
    if let Some(stream) = lock(&self.scheduler).take() {
      if let Err(e) = stream.shutdown(Shutdown::Both) {
        warn!(error = %e, "error closing scheduler connection");
      }
    }

    match lock(&self.runtime).take() {
      Some(runtime) => {
        runtime.shutdown_background();
        true
      }
      None => false,
    }
  }
}

fn resolve(address: &str) -> Result<SocketAddr, ConnectionError> {
  address
    .to_socket_addrs()
    .ok()
    .and_then(|mut addrs| addrs.next())
    .ok_or_else(|| ConnectionError::InvalidAddress {
      address: address.to_string(),
    })
}

fn available_parallelism() -> usize {
  thread::available_parallelism()
    .map(NonZeroUsize::get)
    .unwrap_or(1)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::net::TcpListener;

  #[test]
  fn test_local_pool_uses_configured_workers() {
    let pool = WorkerPool::connect(&PoolConfig::Local { workers: Some(3) }, Duration::from_secs(1))
      .unwrap();
    assert_eq!(pool.kind(), &PoolKind::Local);
    assert_eq!(pool.workers(), 3);
    assert!(pool.handle().is_some());
    pool.close();
  }

  #[test]
  fn test_local_pool_defaults_to_available_parallelism() {
    let pool =
      WorkerPool::connect(&PoolConfig::Local { workers: None }, Duration::from_secs(1)).unwrap();
    assert_eq!(pool.workers(), available_parallelism());
    pool.close();
  }

  #[test]
  fn test_close_is_idempotent() {
    let pool = WorkerPool::connect(&PoolConfig::Local { workers: Some(1) }, Duration::from_secs(1))
      .unwrap();
    assert!(pool.close());
    assert!(!pool.close());
    assert!(pool.is_closed());
    assert!(pool.handle().is_none());
  }

  #[test]
  fn test_remote_pool_connects() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap();

    let pool = WorkerPool::connect(
      &PoolConfig::Remote {
        scheduler_address: address.to_string(),
      },
      Duration::from_secs(2),
    )
    .unwrap();

    assert_eq!(pool.kind(), &PoolKind::Remote { address });
    pool.close();
  }

  #[test]
  fn test_invalid_address() {
    let err = WorkerPool::connect(
      &PoolConfig::Remote {
        scheduler_address: "no port here".to_string(),
      },
      Duration::from_secs(1),
    )
    .err()
    .unwrap();
    assert!(matches!(err, ConnectionError::InvalidAddress { .. }));
  }

  #[test]
  fn test_refused_connection_fails() {
    let address = {
      let listener = TcpListener::bind("127.0.0.1:0").unwrap();
      listener.local_addr().unwrap()
    };

    let err = WorkerPool::connect(
      &PoolConfig::Remote {
        scheduler_address: address.to_string(),
      },
      Duration::from_secs(1),
    )
    .err()
    .unwrap();
    assert!(matches!(err, ConnectionError::Connect { .. }));
  }
}

//! Loading server configuration from disk.

use std::path::PathBuf;

use edas_config::{ConfigError, PoolConfig, ServerConfig};

#[test]
fn test_load_properties_file() {
  let dir = tempfile::tempdir().expect("failed to create temp dir");
  let path = dir.path().join("app.conf");
  std::fs::write(
    &path,
    "# edas server\ndask.nworkers=3\ncache.dir=/data/edas/cache\npoll.interval.ms=250\n",
  )
  .unwrap();

  let config = ServerConfig::load(&path).expect("failed to load config");

  assert_eq!(config.pool, PoolConfig::Local { workers: Some(3) });
  assert_eq!(config.cache_dir, Some(PathBuf::from("/data/edas/cache")));
  assert_eq!(config.poll_interval_ms, 250);
  assert_eq!(config.log_dir, None);
}

#[test]
fn test_load_json_file() {
  let dir = tempfile::tempdir().expect("failed to create temp dir");
  let path = dir.path().join("server.json");
  std::fs::write(
    &path,
    r#"{ "pool": { "type": "local", "workers": 2 }, "log_dir": "/var/log/edas" }"#,
  )
  .unwrap();

  let config = ServerConfig::load(&path).expect("failed to load config");

  assert_eq!(config.pool, PoolConfig::Local { workers: Some(2) });
  assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/edas")));
}

#[test]
fn test_load_missing_file() {
  let err = ServerConfig::load(&PathBuf::from("/nonexistent/edas/app.conf")).unwrap_err();
  assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
fn test_load_json_rejects_zero_poll_interval() {
  let dir = tempfile::tempdir().expect("failed to create temp dir");
  let path = dir.path().join("server.json");
  std::fs::write(&path, r#"{ "poll_interval_ms": 0 }"#).unwrap();

  let err = ServerConfig::load(&path).unwrap_err();
  assert!(matches!(err, ConfigError::InvalidValue { .. }));
}

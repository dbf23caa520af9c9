use std::fs;
use std::path::{Path, PathBuf};

use edas_job::{DEFAULT_ID_LENGTH, random_id};

use crate::StoreError;

/// Extension used for cache files when none is given.
pub const DEFAULT_EXTENSION: &str = "nc";

/// `~/.edas/cache`, if a home directory is known.
pub fn default_cache_dir() -> Option<PathBuf> {
  dirs::home_dir().map(|home| home.join(".edas").join("cache"))
}

/// The cache directory workflows and sinks write into.
///
/// Layout:
///
/// ```text
/// {root}/{id}.{ext}
/// {root}/experiments/{project}/{experiment}/{name}-{id}.{ext}
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheDir {
  root: PathBuf,
}

impl CacheDir {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  /// The cache under the user's home directory.
  pub fn home() -> Result<Self, StoreError> {
    default_cache_dir().map(Self::new).ok_or(StoreError::NoHomeDir)
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Create the cache root if it does not exist.
  pub fn ensure(&self) -> Result<&Path, StoreError> {
    ensure_dir(&self.root)?;
    Ok(&self.root)
  }

  /// A fresh file path in the cache root: `{id}.{ext}`, `nc` by default.
  ///
  /// The file is not created.
  pub fn unique_file(&self, extension: Option<&str>) -> PathBuf {
    let ext = extension.unwrap_or(DEFAULT_EXTENSION);
    self
      .root
      .join(format!("{}.{}", random_id(DEFAULT_ID_LENGTH), ext))
  }

  /// The directory for one experiment of a project, created on demand.
  pub fn experiment_dir(&self, project: &str, experiment: &str) -> Result<PathBuf, StoreError> {
    let dir = self.root.join("experiments").join(project).join(experiment);
    ensure_dir(&dir)?;
    Ok(dir)
  }

  /// A fresh file path in an experiment directory: `{name}-{id}.{ext}`.
  pub fn experiment_file(
    &self,
    project: &str,
    experiment: &str,
    name: &str,
    extension: Option<&str>,
  ) -> Result<PathBuf, StoreError> {
    let dir = self.experiment_dir(project, experiment)?;
    let ext = extension.unwrap_or(DEFAULT_EXTENSION);
    Ok(dir.join(format!("{}-{}.{}", name, random_id(DEFAULT_ID_LENGTH), ext)))
  }
}

fn ensure_dir(dir: &Path) -> Result<(), StoreError> {
  fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_unique_file_names() {
    let cache = CacheDir::new("/tmp/edas-cache");
    let a = cache.unique_file(None);
    let b = cache.unique_file(None);

    assert_ne!(a, b);
    assert_eq!(a.parent(), Some(Path::new("/tmp/edas-cache")));
    assert_eq!(a.extension().and_then(|e| e.to_str()), Some("nc"));

    let stem = a.file_stem().and_then(|s| s.to_str()).unwrap();
    assert_eq!(stem.len(), DEFAULT_ID_LENGTH);
    assert!(stem.chars().all(|c| c.is_ascii_alphanumeric()));
  }

  #[test]
  fn test_unique_file_with_extension() {
    let cache = CacheDir::new("cache");
    let path = cache.unique_file(Some("json"));
    assert_eq!(path.extension().and_then(|e| e.to_str()), Some("json"));
  }

  #[test]
  fn test_ensure_creates_root() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = CacheDir::new(tmp.path().join("a").join("b"));

    let root = cache.ensure().unwrap();
    assert!(root.is_dir());
    // idempotent
    cache.ensure().unwrap();
  }

  #[test]
  fn test_experiment_layout() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = CacheDir::new(tmp.path());

    let dir = cache.experiment_dir("cmip6", "historical").unwrap();
    assert_eq!(dir, tmp.path().join("experiments").join("cmip6").join("historical"));
    assert!(dir.is_dir());

    let file = cache
      .experiment_file("cmip6", "historical", "tas_ave", None)
      .unwrap();
    assert_eq!(file.parent(), Some(dir.as_path()));
    let name = file.file_name().and_then(|n| n.to_str()).unwrap();
    assert!(name.starts_with("tas_ave-"));
    assert!(name.ends_with(".nc"));
    assert_eq!(name.len(), "tas_ave-".len() + DEFAULT_ID_LENGTH + ".nc".len());
  }
}

//! `key=value` properties files.

use std::collections::BTreeMap;

use crate::error::ConfigError;

/// Parsed contents of a properties file.
///
/// Blank lines and lines starting with `#` or `!` are skipped. Keys and
/// values are trimmed; the first `=` separates them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
  entries: BTreeMap<String, String>,
}

impl Properties {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn parse(content: &str) -> Result<Self, ConfigError> {
    let mut entries = BTreeMap::new();

    for (index, raw) in content.lines().enumerate() {
      let line = raw.trim();
      if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
        continue;
      }

      let (key, value) = line.split_once('=').ok_or_else(|| ConfigError::Syntax {
        line: index + 1,
        content: line.to_string(),
      })?;

      let key = key.trim();
      if key.is_empty() {
        return Err(ConfigError::Syntax {
          line: index + 1,
          content: line.to_string(),
        });
      }
      entries.insert(key.to_string(), value.trim().to_string());
    }

    Ok(Self { entries })
  }

  pub fn get(&self, key: &str) -> Option<&str> {
    self.entries.get(key).map(String::as_str)
  }

  pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
    self.entries.insert(key.into(), value.into());
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

impl FromIterator<(String, String)> for Properties {
  fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
    Self {
      entries: iter.into_iter().collect(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_skips_comments_and_blanks() {
    let props = Properties::parse(
      "# workers\n\ndask.nworkers = 4\n! legacy comment\ncache.dir=/tmp/edas\n",
    )
    .unwrap();

    assert_eq!(props.len(), 2);
    assert_eq!(props.get("dask.nworkers"), Some("4"));
    assert_eq!(props.get("cache.dir"), Some("/tmp/edas"));
  }

  #[test]
  fn test_value_may_contain_equals() {
    let props = Properties::parse("trusted.servers=https://a?x=1").unwrap();
    assert_eq!(props.get("trusted.servers"), Some("https://a?x=1"));
  }

  #[test]
  fn test_missing_separator_is_error() {
    let err = Properties::parse("ok=1\nbroken line").unwrap_err();
    assert!(matches!(err, ConfigError::Syntax { line: 2, .. }));
  }

  #[test]
  fn test_empty_key_is_error() {
    let err = Properties::parse(" = value").unwrap_err();
    assert!(matches!(err, ConfigError::Syntax { line: 1, .. }));
  }
}

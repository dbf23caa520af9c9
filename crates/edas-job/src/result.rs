//! Job results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Attribute holding the merge directive (`"<min|max>:<parameter>"`).
pub const MERGE_ATTR: &str = "merge";

/// Attribute holding the result id.
pub const ID_ATTR: &str = "id";

/// A named output produced by a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
  pub name: String,
  pub data: serde_json::Value,
}

/// The output of executing a job, possibly one of several partial results.
///
/// Artifacts keep the order the workflow produced them in. Attributes are
/// scalar metadata; `merge` and `id` are reserved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
  #[serde(default)]
  pub artifacts: Vec<Artifact>,
  #[serde(default)]
  pub attrs: BTreeMap<String, String>,
}

impl JobResult {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_artifact(mut self, name: impl Into<String>, data: serde_json::Value) -> Self {
    self.artifacts.push(Artifact {
      name: name.into(),
      data,
    });
    self
  }

  pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.attrs.insert(key.into(), value.into());
    self
  }

  pub fn attr(&self, key: &str) -> Option<&str> {
    self.attrs.get(key).map(String::as_str)
  }

  /// The result id, if the workflow assigned one.
  pub fn id(&self) -> Option<&str> {
    self.attr(ID_ATTR)
  }

  /// The merge directive, if present and non-blank.
  pub fn merge_directive(&self) -> Option<&str> {
    self.attr(MERGE_ATTR).filter(|d| !d.trim().is_empty())
  }

  pub fn artifact(&self, name: &str) -> Option<&Artifact> {
    self.artifacts.iter().find(|a| a.name == name)
  }

  /// True when the result carries neither artifacts nor attributes.
  pub fn is_empty(&self) -> bool {
    self.artifacts.is_empty() && self.attrs.is_empty()
  }
}

//! Reducing partial results to one final result.
//!
//! The first result's `merge` attribute selects the policy:
//! - absent: union merge (artifacts concatenated, attributes first-seen-wins)
//! - `"min:<parameter>"` / `"max:<parameter>"`: keep the single result with
//!   the smallest / largest numeric value of `<parameter>`

use std::fmt;

use edas_job::JobResult;

use crate::error::MergeError;

/// Comparison used by a best-of merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMethod {
  Min,
  Max,
}

impl MergeMethod {
  fn parse(method: &str) -> Result<Self, MergeError> {
    match method.trim().to_lowercase().as_str() {
      "min" => Ok(MergeMethod::Min),
      "max" => Ok(MergeMethod::Max),
      other => Err(MergeError::UnknownMergeMethod {
        method: other.to_string(),
      }),
    }
  }

  /// Strict comparison, so ties keep the incumbent.
  fn improves(self, candidate: f64, best: f64) -> bool {
    match self {
      MergeMethod::Min => candidate < best,
      MergeMethod::Max => candidate > best,
    }
  }
}

impl fmt::Display for MergeMethod {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      MergeMethod::Min => f.write_str("min"),
      MergeMethod::Max => f.write_str("max"),
    }
  }
}

/// How a sequence of partial results is reduced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergePolicy {
  Union,
  Best {
    method: MergeMethod,
    parameter: String,
  },
}

impl MergePolicy {
  /// Parse a `"<method>:<parameter>"` directive. The parameter name is
  /// trimmed and lowercased.
  pub fn parse(directive: &str) -> Result<Self, MergeError> {
    let (method, parameter) =
      directive
        .split_once(':')
        .ok_or_else(|| MergeError::MalformedDirective {
          directive: directive.to_string(),
        })?;

    let parameter = parameter.trim().to_lowercase();
    if parameter.is_empty() {
      return Err(MergeError::MalformedDirective {
        directive: directive.to_string(),
      });
    }

    Ok(MergePolicy::Best {
      method: MergeMethod::parse(method)?,
      parameter,
    })
  }

  /// The policy requested by the first result of a sequence.
  pub fn for_results(results: &[JobResult]) -> Result<Self, MergeError> {
    let first = results.first().ok_or(MergeError::NoResults)?;
    match first.merge_directive() {
      Some(directive) => Self::parse(directive),
      None => Ok(MergePolicy::Union),
    }
  }

  pub fn apply(&self, results: &[JobResult]) -> Result<JobResult, MergeError> {
    match self {
      MergePolicy::Union => union_merge(results),
      MergePolicy::Best { method, parameter } => best_of(results, *method, parameter),
    }
  }
}

/// Merge `results` according to the directive carried by the first one.
pub fn merge_results(results: &[JobResult]) -> Result<JobResult, MergeError> {
  MergePolicy::for_results(results)?.apply(results)
}

fn union_merge(results: &[JobResult]) -> Result<JobResult, MergeError> {
  let (first, rest) = results.split_first().ok_or(MergeError::NoResults)?;
  let mut merged = first.clone();

  for result in rest {
    merged.artifacts.extend(result.artifacts.iter().cloned());
    for (key, value) in &result.attrs {
      merged
        .attrs
        .entry(key.clone())
        .or_insert_with(|| value.clone());
    }
  }

  Ok(merged)
}

fn best_of(
  results: &[JobResult],
  method: MergeMethod,
  parameter: &str,
) -> Result<JobResult, MergeError> {
  let mut best: Option<(&JobResult, f64)> = None;

  for (index, result) in results.iter().enumerate() {
    let value = numeric_attr(result, parameter, index)?;
    let replace = match best {
      None => true,
      Some((_, best_value)) => method.improves(value, best_value),
    };
    if replace {
      best = Some((result, value));
    }
  }

  best
    .map(|(result, _)| result.clone())
    .ok_or(MergeError::NoResults)
}

fn numeric_attr(result: &JobResult, parameter: &str, index: usize) -> Result<f64, MergeError> {
  let raw = result
    .attr(parameter)
    .filter(|v| !v.trim().is_empty())
    .ok_or_else(|| MergeError::MissingParameter {
      parameter: parameter.to_string(),
      index,
    })?;

  raw
    .trim()
    .parse::<f64>()
    .map_err(|_| MergeError::NonNumericParameter {
      parameter: parameter.to_string(),
      index,
      value: raw.to_string(),
    })
}

//! Random alphanumeric identifiers.

use rand::Rng;
use rand::distr::Alphanumeric;

/// Length of generated request suffixes and cache file stems.
pub const DEFAULT_ID_LENGTH: usize = 6;

/// Generate a random identifier of `length` ASCII letters and digits.
pub fn random_id(length: usize) -> String {
  rand::rng()
    .sample_iter(Alphanumeric)
    .take(length)
    .map(char::from)
    .collect()
}

/// Append `uid` to `base` as `<base>-<uid>`, unless `base` already ends with it.
pub fn with_suffix(base: &str, uid: &str) -> String {
  if base.ends_with(uid) {
    base.to_string()
  } else {
    format!("{}-{}", base, uid)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_random_id_length_and_charset() {
    let id = random_id(DEFAULT_ID_LENGTH);
    assert_eq!(id.len(), DEFAULT_ID_LENGTH);
    assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
  }

  #[test]
  fn test_random_ids_differ() {
    assert_ne!(random_id(16), random_id(16));
  }

  #[test]
  fn test_with_suffix() {
    assert_eq!(with_suffix("ave", "a1B2c3"), "ave-a1B2c3");
    assert_eq!(with_suffix("ave-a1B2c3", "a1B2c3"), "ave-a1B2c3");
  }
}

//! Small utility helpers used across modules.

use chrono::NaiveDate;

use crate::error::{EngineError, EngineResult};

const DAY_FORMAT: &str = "%Y-%m-%d";

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_day(s: &str) -> EngineResult<NaiveDate> {
  NaiveDate::parse_from_str(s, DAY_FORMAT)
    .map_err(|e| EngineError::invalid(format!("malformed date '{}': {}", trunc_for_log(s, 32), e)))
}

pub fn format_day(d: NaiveDate) -> String {
  d.format(DAY_FORMAT).to_string()
}

/// FNV-1a over the given parts, separated by a NUL byte.
/// Stable across builds, unlike `DefaultHasher`, so it can seed per-day generation.
pub fn stable_hash(parts: &[&str]) -> u64 {
  const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
  const PRIME: u64 = 0x0000_0100_0000_01b3;
  let mut h = OFFSET;
  for (i, p) in parts.iter().enumerate() {
    if i > 0 {
      // NUL separator: xor with 0 is a no-op, only the multiply remains.
      h = h.wrapping_mul(PRIME);
    }
    for b in p.as_bytes() {
      h ^= u64::from(*b);
      h = h.wrapping_mul(PRIME);
    }
  }
  h
}

/// Log-safe truncation for caller-provided strings.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut end = max;
  while !s.is_char_boundary(end) {
    end -= 1;
  }
  format!("{}… ({} bytes total)", &s[..end], s.len())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn day_round_trip_and_rejects_garbage() {
    let d = parse_day("2024-02-29").unwrap();
    assert_eq!(format_day(d), "2024-02-29");
    assert!(parse_day("2023-02-29").is_err());
    assert!(parse_day("yesterday").is_err());
    assert!(parse_day("").is_err());
  }

  #[test]
  fn stable_hash_separates_parts() {
    assert_eq!(stable_hash(&["a", "b"]), stable_hash(&["a", "b"]));
    assert_ne!(stable_hash(&["ab", ""]), stable_hash(&["a", "b"]));
  }

  #[test]
  fn truncation_respects_char_boundaries() {
    assert_eq!(trunc_for_log("short", 10), "short");
    let t = trunc_for_log("日本語のテキスト", 4);
    assert!(t.starts_with("日"));
  }
}

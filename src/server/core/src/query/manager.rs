/* src/server/core/src/query/manager.rs */

use std::collections::HashMap;
use std::sync::Mutex;

const FNV_OFFSET: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

/// Standard FNV-1a 32-bit hash.
fn fnv1a_32(input: &str) -> u32 {
  let mut hash = FNV_OFFSET;
  for byte in input.bytes() {
    hash ^= byte as u32;
    hash = hash.wrapping_mul(FNV_PRIME);
  }
  hash
}

/// Query text -> 8 hex chars (full 32-bit FNV-1a).
pub fn query_hash(text: &str) -> String {
  format!("{:08x}", fnv1a_32(text))
}

/// Content-addresses raw query text. The hash is a pure function of the
/// text, never of registration order, so compile passes at different times
/// agree on every identifier.
pub struct QueryManager {
  queries: Mutex<HashMap<String, String>>,
}

impl QueryManager {
  pub fn new() -> Self {
    Self { queries: Mutex::new(HashMap::new()) }
  }

  pub fn register_query(&self, text: &str) -> String {
    let hash = query_hash(text);
    if let Ok(mut queries) = self.queries.lock() {
      queries.insert(hash.clone(), text.to_string());
    }
    hash
  }

  /// Unknown hashes return `None`; callers surface the "not found"
  /// condition themselves.
  pub fn get_query(&self, hash: &str) -> Option<String> {
    self.queries.lock().ok()?.get(hash).cloned()
  }
}

impl Default for QueryManager {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fnv1a_deterministic() {
    assert_eq!(fnv1a_32("hello"), fnv1a_32("hello"));
  }

  #[test]
  fn fnv1a_different_inputs() {
    assert_ne!(fnv1a_32("hello"), fnv1a_32("world"));
  }

  #[test]
  fn fnv1a_empty_string() {
    assert_eq!(fnv1a_32(""), FNV_OFFSET);
  }

  #[test]
  fn query_hash_length() {
    let h = query_hash("films.json");
    assert_eq!(h.len(), 8);
    assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
  }

  #[test]
  fn register_roundtrip() {
    let manager = QueryManager::new();
    let hash = manager.register_query("films/{slug}.json");
    assert_eq!(manager.get_query(&hash).as_deref(), Some("films/{slug}.json"));
  }

  #[test]
  fn register_twice_same_hash() {
    let manager = QueryManager::new();
    let first = manager.register_query("films.json");
    let second = manager.register_query("films.json");
    assert_eq!(first, second);
  }

  #[test]
  fn unknown_hash_is_none() {
    let manager = QueryManager::new();
    assert_eq!(manager.get_query("00000000"), None);
  }
}

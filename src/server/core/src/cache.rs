/* src/server/core/src/cache.rs */

use std::collections::HashMap;
use std::sync::Mutex;

/// Canonical form of a secondary cache key. `serde_json::Map` is backed by
/// a `BTreeMap`, so object keys serialize in sorted order and two
/// structurally equal values always produce the same string.
pub fn canonical_key(params: &serde_json::Value) -> String {
  serde_json::to_string(params).unwrap_or_default()
}

/// Two-level keyed cache: primary key times canonicalized secondary key.
/// No eviction; entries live as long as the cache instance.
pub struct CacheClient<V> {
  entries: Mutex<HashMap<(String, String), V>>,
}

impl<V: Clone> CacheClient<V> {
  pub fn new() -> Self {
    Self { entries: Mutex::new(HashMap::new()) }
  }

  pub fn get(&self, primary: &str, secondary: &serde_json::Value) -> Option<V> {
    let key = (primary.to_string(), canonical_key(secondary));
    self.entries.lock().ok()?.get(&key).cloned()
  }

  pub fn set(&self, primary: &str, secondary: &serde_json::Value, value: V) {
    let key = (primary.to_string(), canonical_key(secondary));
    if let Ok(mut entries) = self.entries.lock() {
      entries.insert(key, value);
    }
  }

  pub fn delete(&self, primary: &str, secondary: &serde_json::Value) {
    let key = (primary.to_string(), canonical_key(secondary));
    if let Ok(mut entries) = self.entries.lock() {
      entries.remove(&key);
    }
  }

  /// Atomic check-then-insert. Returns the entry and whether this call
  /// created it. The whole sequence runs under one lock so concurrent
  /// callers for the same pair observe exactly one insertion.
  pub fn get_or_insert_with(
    &self,
    primary: &str,
    secondary: &serde_json::Value,
    make: impl FnOnce() -> V,
  ) -> (V, bool) {
    let key = (primary.to_string(), canonical_key(secondary));
    let mut entries = match self.entries.lock() {
      Ok(entries) => entries,
      Err(poisoned) => poisoned.into_inner(),
    };
    if let Some(existing) = entries.get(&key) {
      return (existing.clone(), false);
    }
    let value = make();
    entries.insert(key, value.clone());
    (value, true)
  }
}

impl<V: Clone> Default for CacheClient<V> {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn get_set_delete_roundtrip() {
    let cache: CacheClient<i32> = CacheClient::new();
    assert_eq!(cache.get("a", &json!({"x": 1})), None);
    cache.set("a", &json!({"x": 1}), 42);
    assert_eq!(cache.get("a", &json!({"x": 1})), Some(42));
    cache.delete("a", &json!({"x": 1}));
    assert_eq!(cache.get("a", &json!({"x": 1})), None);
  }

  #[test]
  fn structurally_equal_keys_share_an_entry() {
    let cache: CacheClient<&str> = CacheClient::new();
    cache.set("q", &json!({"a": 1, "b": 2}), "hit");
    // Distinct value, same structure, different construction order
    let other = json!({"b": 2, "a": 1});
    assert_eq!(cache.get("q", &other), Some("hit"));
  }

  #[test]
  fn primary_keys_are_disjoint() {
    let cache: CacheClient<&str> = CacheClient::new();
    cache.set("a", &json!({}), "one");
    cache.set("b", &json!({}), "two");
    assert_eq!(cache.get("a", &json!({})), Some("one"));
    assert_eq!(cache.get("b", &json!({})), Some("two"));
  }

  #[test]
  fn get_or_insert_is_once() {
    let cache: CacheClient<i32> = CacheClient::new();
    let (v, created) = cache.get_or_insert_with("a", &json!(null), || 1);
    assert_eq!((v, created), (1, true));
    let (v, created) = cache.get_or_insert_with("a", &json!(null), || 2);
    assert_eq!((v, created), (1, false));
  }

  #[test]
  fn canonical_key_sorts_object_keys() {
    assert_eq!(canonical_key(&json!({"b": 2, "a": 1})), r#"{"a":1,"b":2}"#);
  }
}

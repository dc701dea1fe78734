/* src/server/core/src/query/client.rs */

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::cache::canonical_key;
use crate::errors::WeftError;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Resolver bound to a query hash on the SSR side.
pub type QueryFn =
  Arc<dyn Fn(serde_json::Value) -> BoxFuture<Result<serde_json::Value, WeftError>> + Send + Sync>;

/// Common capability of the client family: resolve a query identified by
/// its content hash, with request coalescing and a durable result cache.
pub trait StaticClient: Send + Sync {
  fn query(
    &self,
    hash: &str,
    params: serde_json::Value,
  ) -> BoxFuture<Result<serde_json::Value, WeftError>>;
}

/// Transport used by `WebStaticClient`. Injected so the HTTP stack stays
/// out of the runtime core (and out of tests).
pub trait Fetcher: Send + Sync {
  fn fetch(&self, url: &str) -> BoxFuture<Result<serde_json::Value, WeftError>>;
}

/// Data-endpoint URL for a `(hash, params)` pair. The params segment is the
/// percent-encoded canonical serialization, so the URL doubles as the
/// on-disk artifact key during static generation.
pub fn data_url(prefix: &str, hash: &str, params: &serde_json::Value) -> String {
  let encoded = urlencoding::encode(&canonical_key(params)).into_owned();
  format!("{prefix}/data/{hash}/{encoded}.json")
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn data_url_shape() {
    let url = data_url("/_weft", "4f9f2cab", &json!({}));
    assert_eq!(url, "/_weft/data/4f9f2cab/%7B%7D.json");
  }

  #[test]
  fn data_url_is_stable_across_key_order() {
    let a = data_url("/_weft", "ab", &json!({"x": 1, "y": 2}));
    let b = data_url("/_weft", "ab", &json!({"y": 2, "x": 1}));
    assert_eq!(a, b);
  }
}

/* src/server/core/src/query/web.rs */

use std::sync::Arc;

use futures_util::future::Shared;
use futures_util::FutureExt;

use crate::cache::CacheClient;
use crate::errors::WeftError;

use super::client::{data_url, BoxFuture, Fetcher, StaticClient};

type SharedRequest = Shared<BoxFuture<Result<serde_json::Value, WeftError>>>;

/// Client-side static query client: resolves hashes over HTTP against the
/// dev server's data endpoint. Concurrent callers for the same
/// `(hash, params)` pair share one in-flight future; the in-flight entry is
/// dropped when the request settles while the resolved result is retained,
/// so abandoned requests cannot accumulate.
#[derive(Clone)]
pub struct WebStaticClient {
  inner: Arc<Inner>,
}

struct Inner {
  fetcher: Arc<dyn Fetcher>,
  prefix: String,
  cache: CacheClient<serde_json::Value>,
  requests: CacheClient<SharedRequest>,
}

impl WebStaticClient {
  pub fn new(fetcher: Arc<dyn Fetcher>, prefix: impl Into<String>) -> Self {
    Self {
      inner: Arc::new(Inner {
        fetcher,
        prefix: prefix.into(),
        cache: CacheClient::new(),
        requests: CacheClient::new(),
      }),
    }
  }

  fn fetch(&self, hash: &str, params: &serde_json::Value) -> SharedRequest {
    let inner = &self.inner;
    let (request, _created) = inner.requests.get_or_insert_with(hash, params, || {
      let url = data_url(&inner.prefix, hash, params);
      let fetcher = inner.fetcher.clone();
      let cleanup = self.inner.clone();
      let hash = hash.to_string();
      let params = params.clone();
      let future: BoxFuture<Result<serde_json::Value, WeftError>> = Box::pin(async move {
        let result = fetcher.fetch(&url).await;
        cleanup.requests.delete(&hash, &params);
        result
      });
      future.shared()
    });
    request
  }
}

impl StaticClient for WebStaticClient {
  fn query(
    &self,
    hash: &str,
    params: serde_json::Value,
  ) -> BoxFuture<Result<serde_json::Value, WeftError>> {
    let client = self.clone();
    let hash = hash.to_string();
    Box::pin(async move {
      if let Some(cached) = client.inner.cache.get(&hash, &params) {
        return Ok(cached);
      }
      let result = client.fetch(&hash, &params).await?;
      client.inner.cache.set(&hash, &params, result.clone());
      Ok(result)
    })
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::time::Duration;

  use serde_json::json;

  use super::*;

  struct CountingFetcher {
    calls: AtomicUsize,
    delay: Duration,
  }

  impl CountingFetcher {
    fn new(delay: Duration) -> Arc<Self> {
      Arc::new(Self { calls: AtomicUsize::new(0), delay })
    }
  }

  impl Fetcher for CountingFetcher {
    fn fetch(&self, url: &str) -> BoxFuture<Result<serde_json::Value, WeftError>> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      let url = url.to_string();
      let delay = self.delay;
      Box::pin(async move {
        tokio::time::sleep(delay).await;
        Ok(json!({ "url": url }))
      })
    }
  }

  #[tokio::test]
  async fn concurrent_queries_share_one_fetch() {
    let fetcher = CountingFetcher::new(Duration::from_millis(20));
    let client = WebStaticClient::new(fetcher.clone(), "/_weft");

    let a = client.query("ab12cd34", json!({"page": 1}));
    let b = client.query("ab12cd34", json!({"page": 1}));
    let (a, b) = tokio::join!(a, b);

    assert_eq!(a.as_ref().ok(), b.as_ref().ok());
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn cached_result_skips_the_fetcher() {
    let fetcher = CountingFetcher::new(Duration::ZERO);
    let client = WebStaticClient::new(fetcher.clone(), "/_weft");

    client.query("ab12cd34", json!({})).await.expect("first query");
    client.query("ab12cd34", json!({})).await.expect("second query");

    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn distinct_params_fetch_separately() {
    let fetcher = CountingFetcher::new(Duration::ZERO);
    let client = WebStaticClient::new(fetcher.clone(), "/_weft");

    client.query("ab12cd34", json!({"page": 1})).await.expect("page 1");
    client.query("ab12cd34", json!({"page": 2})).await.expect("page 2");

    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
  }

  struct FailingFetcher;

  impl Fetcher for FailingFetcher {
    fn fetch(&self, _url: &str) -> BoxFuture<Result<serde_json::Value, WeftError>> {
      Box::pin(async { Err(WeftError::data_fetch("connection refused")) })
    }
  }

  #[tokio::test]
  async fn failed_fetch_is_not_cached() {
    let client = WebStaticClient::new(Arc::new(FailingFetcher), "/_weft");
    let err = client.query("ab12cd34", json!({})).await.expect_err("should fail");
    assert_eq!(err.code(), "DATA_FETCH");
    // The in-flight entry was dropped on settle, so a retry issues a new
    // request instead of replaying the failure.
    let err = client.query("ab12cd34", json!({})).await.expect_err("still fails");
    assert_eq!(err.code(), "DATA_FETCH");
  }
}

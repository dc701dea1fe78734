/* src/server/core/src/query/ssr.rs */

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use futures_util::future::Shared;
use futures_util::FutureExt;

use crate::cache::CacheClient;
use crate::errors::WeftError;
use crate::manifest::{PreloadHint, PreloadKind};

use super::client::{data_url, BoxFuture, QueryFn, StaticClient};
use super::replay::{FetchedRequest, ReplayLog};

type SharedRequest = Shared<BoxFuture<Result<serde_json::Value, WeftError>>>;

/// Server-side static query client. Hashes resolve against a locally
/// registered resolver map instead of crossing the network. First
/// resolution of a `(hash, params)` pair populates the durable cache and
/// appends a `FetchedRequest` to the replay log; every requested pair is
/// also recorded in a per-view set that feeds the page's preload hints.
///
/// `clone_for_page` derives a per-render view sharing the durable cache,
/// the in-flight cache and the replay log, with a fresh request set. The
/// in-flight cache is deliberately shared so two pages rendered
/// concurrently in one batch cannot double-fetch a shared pair.
#[derive(Clone)]
pub struct SsrStaticClient {
  inner: Arc<Inner>,
  fetched: Arc<Mutex<BTreeSet<String>>>,
}

struct Inner {
  prefix: String,
  resolvers: Mutex<HashMap<String, QueryFn>>,
  cache: CacheClient<serde_json::Value>,
  requests: CacheClient<SharedRequest>,
  log: ReplayLog,
}

impl SsrStaticClient {
  pub fn new(prefix: impl Into<String>) -> Self {
    Self {
      inner: Arc::new(Inner {
        prefix: prefix.into(),
        resolvers: Mutex::new(HashMap::new()),
        cache: CacheClient::new(),
        requests: CacheClient::new(),
        log: ReplayLog::new(),
      }),
      fetched: Arc::new(Mutex::new(BTreeSet::new())),
    }
  }

  pub fn register_query(&self, hash: impl Into<String>, resolver: QueryFn) {
    if let Ok(mut resolvers) = self.inner.resolvers.lock() {
      resolvers.insert(hash.into(), resolver);
    }
  }

  pub fn is_registered(&self, hash: &str) -> bool {
    self.inner.resolvers.lock().map(|r| r.contains_key(hash)).unwrap_or(false)
  }

  /// Per-render view: shared durable cache, shared in-flight cache, shared
  /// resolver map and replay log; its own fetched-request set.
  pub fn clone_for_page(&self) -> Self {
    Self { inner: self.inner.clone(), fetched: Arc::new(Mutex::new(BTreeSet::new())) }
  }

  /// Preload hints for every data URL this view requested, in stable order.
  pub fn preloads(&self) -> Vec<PreloadHint> {
    let Ok(fetched) = self.fetched.lock() else { return Vec::new() };
    fetched
      .iter()
      .map(|href| PreloadHint {
        href: href.clone(),
        kind: PreloadKind::Fetch,
        crossorigin: true,
      })
      .collect()
  }

  pub fn subscribe_log(
    &self,
  ) -> Result<tokio::sync::mpsc::UnboundedReceiver<FetchedRequest>, WeftError> {
    self.inner.log.subscribe()
  }

  /// Seals the replay log once rendering has finished.
  pub fn close(&self) -> Result<(), WeftError> {
    self.inner.log.close()
  }

  fn resolver(&self, hash: &str) -> Option<QueryFn> {
    self.inner.resolvers.lock().ok()?.get(hash).cloned()
  }

  fn resolve(&self, hash: &str, params: &serde_json::Value, resolver: QueryFn) -> SharedRequest {
    let inner = &self.inner;
    let (request, _created) = inner.requests.get_or_insert_with(hash, params, || {
      let settle = inner.clone();
      let hash = hash.to_string();
      let params = params.clone();
      let future: BoxFuture<Result<serde_json::Value, WeftError>> = Box::pin(async move {
        let outcome = resolver(params.clone()).await;
        settle.requests.delete(&hash, &params);
        let result = outcome?;
        settle.cache.set(&hash, &params, result.clone());
        settle.log.publish(FetchedRequest { hash, params, result: result.clone() });
        Ok(result)
      });
      future.shared()
    });
    request
  }
}

impl StaticClient for SsrStaticClient {
  fn query(
    &self,
    hash: &str,
    params: serde_json::Value,
  ) -> BoxFuture<Result<serde_json::Value, WeftError>> {
    let client = self.clone();
    let hash = hash.to_string();
    Box::pin(async move {
      let Some(resolver) = client.resolver(&hash) else {
        return Err(WeftError::query_not_registered(&hash));
      };

      // Recorded on every request, cache hit or not, so each page's
      // preload list covers all the data its render touched.
      if let Ok(mut fetched) = client.fetched.lock() {
        fetched.insert(data_url(&client.inner.prefix, &hash, &params));
      }

      if let Some(cached) = client.inner.cache.get(&hash, &params) {
        return Ok(cached);
      }

      client.resolve(&hash, &params, resolver).await
    })
  }
}

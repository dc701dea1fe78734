/* src/server/core/src/router.rs */

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::try_join_all;
use regex::Regex;
use tokio::sync::OnceCell;

use crate::errors::WeftError;
use crate::query::client::{BoxFuture, StaticClient};
use crate::renderer::RenderFn;

/// The navigable unit. Params are never stored here; they are recomputed
/// from the matched route's pattern on every navigation.
#[derive(Debug, Clone)]
pub struct Location {
  pub pathname: String,
  pub search: String,
  pub state: Option<serde_json::Value>,
}

impl Location {
  pub fn from_pathname(pathname: impl Into<String>) -> Self {
    Self { pathname: pathname.into(), search: String::new(), state: None }
  }
}

/// Location plus the path parameters extracted by the matched route.
#[derive(Debug, Clone)]
pub struct CurrentLocation {
  pub pathname: String,
  pub search: String,
  pub state: Option<serde_json::Value>,
  pub params: HashMap<String, String>,
}

pub type PreloadFn = Arc<
  dyn Fn(CurrentLocation, Arc<dyn StaticClient>) -> BoxFuture<Result<(), WeftError>> + Send + Sync,
>;

/// Loaded route code: an optional data-preload hook plus the render
/// function. Loading a module runs its query-registration side effects.
pub struct RouteModule {
  pub preload: Option<PreloadFn>,
  pub render: RenderFn,
}

pub type LoadFn = Arc<dyn Fn() -> BoxFuture<Result<Arc<RouteModule>, WeftError>> + Send + Sync>;

/// A pathname pattern bound to a lazily loaded module. The resolved module
/// is cached for the lifetime of the route table; a regenerated table
/// starts from empty cells.
pub struct Route {
  pub path: Regex,
  pub id: String,
  load: LoadFn,
  resolved: OnceCell<Arc<RouteModule>>,
}

impl std::fmt::Debug for Route {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Route")
      .field("path", &self.path)
      .field("id", &self.id)
      .field("resolved", &self.resolved.get().is_some())
      .finish_non_exhaustive()
  }
}

impl Route {
  pub fn new(path: Regex, id: impl Into<String>, load: LoadFn) -> Self {
    Self { path, id: id.into(), load, resolved: OnceCell::new() }
  }

  /// Loads the module exactly once, caching it on the route record.
  pub async fn module(&self) -> Result<Arc<RouteModule>, WeftError> {
    self.resolved.get_or_try_init(|| (self.load)()).await.cloned()
  }

  pub fn resolved(&self) -> Option<Arc<RouteModule>> {
    self.resolved.get().cloned()
  }
}

fn match_path(pathname: &str) -> &str {
  match pathname.find(['?', '#']) {
    Some(idx) => &pathname[..idx],
    None => pathname,
  }
}

/// First route whose pattern matches the pathname (query/fragment
/// stripped). No match is a valid "not found" outcome, not an error.
pub fn route_from_location<'a>(routes: &'a [Route], location: &Location) -> Option<&'a Route> {
  let path = match_path(&location.pathname);
  routes.iter().find(|route| route.path.is_match(path))
}

/// Named capture groups of the route's pattern applied to the pathname.
pub fn params_for(route: &Route, location: &Location) -> HashMap<String, String> {
  let path = match_path(&location.pathname);
  let Some(captures) = route.path.captures(path) else { return HashMap::new() };
  route
    .path
    .capture_names()
    .flatten()
    .filter_map(|name| captures.name(name).map(|m| (name.to_string(), m.as_str().to_string())))
    .collect()
}

/// Resolves the matching route, loads its code once, and awaits its
/// preload hook before returning. After this resolves, every piece of data
/// the route's initial render needs is cached on `client`.
pub async fn preload<'a>(
  routes: &'a [Route],
  location: &Location,
  client: Arc<dyn StaticClient>,
) -> Result<Option<&'a Route>, WeftError> {
  let Some(route) = route_from_location(routes, location) else {
    return Ok(None);
  };
  let module = route.module().await?;
  if let Some(hook) = &module.preload {
    let current = CurrentLocation {
      pathname: location.pathname.clone(),
      search: location.search.clone(),
      state: location.state.clone(),
      params: params_for(route, location),
    };
    hook(current, client).await?;
  }
  Ok(Some(route))
}

/// Eagerly loads every route's module, without preloading, so each
/// module's query registrations have run. Registration happening outside
/// route loading is missed; that is an accepted approximation.
pub async fn load_all_routes(routes: &[Route]) -> Result<(), WeftError> {
  try_join_all(routes.iter().map(|route| route.module())).await?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Mutex;

  use serde_json::json;

  use super::*;
  use crate::renderer::RenderResult;

  fn module(render_body: &'static str) -> Arc<RouteModule> {
    Arc::new(RouteModule {
      preload: None,
      render: Arc::new(move |_ctx| {
        Box::pin(async move {
          Ok(RenderResult {
            html: render_body.to_string(),
            head: String::new(),
            css: String::new(),
          })
        })
      }),
    })
  }

  fn counting_route(pattern: &str, id: &str, loads: Arc<AtomicUsize>) -> Route {
    Route::new(
      Regex::new(pattern).expect("pattern"),
      id,
      Arc::new(move || {
        loads.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Ok(module("body")) })
      }),
    )
  }

  fn table(loads: &Arc<AtomicUsize>) -> Vec<Route> {
    vec![
      counting_route("^/$", "home", loads.clone()),
      counting_route("^/(?<slug>.+)$", "detail", loads.clone()),
    ]
  }

  struct NoopClient;

  impl StaticClient for NoopClient {
    fn query(
      &self,
      _hash: &str,
      _params: serde_json::Value,
    ) -> BoxFuture<Result<serde_json::Value, WeftError>> {
      Box::pin(async { Ok(json!(null)) })
    }
  }

  #[test]
  fn root_matches_home_with_no_params() {
    let loads = Arc::new(AtomicUsize::new(0));
    let routes = table(&loads);
    let location = Location::from_pathname("/");
    let route = route_from_location(&routes, &location).expect("match");
    assert_eq!(route.id, "home");
    assert!(params_for(route, &location).is_empty());
  }

  #[test]
  fn pathname_matches_detail_with_slug_param() {
    let loads = Arc::new(AtomicUsize::new(0));
    let routes = table(&loads);
    let location = Location::from_pathname("/abc");
    let route = route_from_location(&routes, &location).expect("match");
    assert_eq!(route.id, "detail");
    assert_eq!(params_for(route, &location).get("slug").map(String::as_str), Some("abc"));
  }

  #[test]
  fn query_and_fragment_are_stripped_before_matching() {
    let loads = Arc::new(AtomicUsize::new(0));
    let routes = table(&loads);
    let route =
      route_from_location(&routes, &Location::from_pathname("/abc?page=2#top")).expect("match");
    assert_eq!(route.id, "detail");
    let params = params_for(route, &Location::from_pathname("/abc?page=2#top"));
    assert_eq!(params.get("slug").map(String::as_str), Some("abc"));
  }

  #[test]
  fn no_match_is_none() {
    let routes = vec![counting_route("^/$", "home", Arc::new(AtomicUsize::new(0)))];
    assert!(route_from_location(&routes, &Location::from_pathname("/missing")).is_none());
  }

  #[tokio::test]
  async fn module_loads_exactly_once() {
    let loads = Arc::new(AtomicUsize::new(0));
    let route = counting_route("^/$", "home", loads.clone());
    route.module().await.expect("first load");
    route.module().await.expect("second load");
    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert!(route.resolved().is_some());
  }

  #[tokio::test]
  async fn preload_passes_params_to_the_hook() {
    let seen = Arc::new(Mutex::new(None));
    let seen_in_hook = seen.clone();
    let route = Route::new(
      Regex::new("^/(?<slug>.+)$").expect("pattern"),
      "detail",
      Arc::new(move || {
        let seen = seen_in_hook.clone();
        Box::pin(async move {
          Ok(Arc::new(RouteModule {
            preload: Some(Arc::new(move |current, _client| {
              *seen.lock().expect("lock") = current.params.get("slug").cloned();
              Box::pin(async { Ok(()) })
            })),
            render: module("x").render.clone(),
          }))
        })
      }),
    );

    let routes = vec![route];
    let found = preload(&routes, &Location::from_pathname("/abc"), Arc::new(NoopClient))
      .await
      .expect("preload");
    assert!(found.is_some());
    assert_eq!(seen.lock().expect("lock").as_deref(), Some("abc"));
  }

  #[tokio::test]
  async fn preload_without_match_is_ok_none() {
    let routes = vec![counting_route("^/$", "home", Arc::new(AtomicUsize::new(0)))];
    let found = preload(&routes, &Location::from_pathname("/nope"), Arc::new(NoopClient))
      .await
      .expect("preload");
    assert!(found.is_none());
  }

  #[tokio::test]
  async fn load_all_routes_loads_every_module() {
    let loads = Arc::new(AtomicUsize::new(0));
    let routes = table(&loads);
    load_all_routes(&routes).await.expect("load all");
    assert_eq!(loads.load(Ordering::SeqCst), 2);
    assert!(routes.iter().all(|r| r.resolved().is_some()));
  }
}

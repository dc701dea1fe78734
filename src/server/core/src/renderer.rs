/* src/server/core/src/renderer.rs */

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::errors::WeftError;
use crate::manifest::{render_preload_links, AssetManifest};
use crate::query::client::{BoxFuture, StaticClient};
use crate::query::ssr::SsrStaticClient;
use crate::router::{load_all_routes, params_for, preload, CurrentLocation, Location, Route};

/// What a route module's render produces: body markup plus the head and
/// style fragments to splice into the page template.
#[derive(Debug, Clone, Default)]
pub struct RenderResult {
  pub html: String,
  pub head: String,
  pub css: String,
}

impl RenderResult {
  fn not_found(pathname: &str) -> Self {
    Self {
      html: format!("<h1>Not found</h1><p>No route matches {pathname}.</p>"),
      head: "<title>Not found</title>".to_string(),
      css: String::new(),
    }
  }
}

/// Everything a render call site receives. The client is threaded
/// explicitly; there is no ambient "current client" context.
pub struct RenderContext {
  pub location: CurrentLocation,
  pub client: Arc<dyn StaticClient>,
}

pub type RenderFn =
  Arc<dyn Fn(RenderContext) -> BoxFuture<Result<RenderResult, WeftError>> + Send + Sync>;

pub struct RendererOptions {
  pub template: String,
  pub manifest: AssetManifest,
  pub routes: Arc<Vec<Route>>,
  pub client: SsrStaticClient,
  /// Module id of the client entry in the asset manifest.
  pub entry_id: String,
  /// URL base under which compiled chunks are served.
  pub static_base: String,
}

/// Bound to one template, one asset manifest and one route-table version.
/// Never mutated; the dev server and the generator replace the whole
/// renderer on every reload.
pub struct Renderer {
  options: RendererOptions,
}

impl Renderer {
  pub fn new(options: RendererOptions) -> Self {
    Self { options }
  }

  /// The build-scoped base client; derive per-page views from it with
  /// `clone_for_page`.
  pub fn client(&self) -> &SsrStaticClient {
    &self.options.client
  }

  pub fn routes(&self) -> &[Route] {
    &self.options.routes
  }

  /// Renders one location through the given per-page client view. Routes
  /// are loaded first so query registrations have run; the matched route's
  /// preload hook resolves (and caches) its data before render executes.
  pub async fn render(
    &self,
    location: &Location,
    view: &SsrStaticClient,
  ) -> Result<String, WeftError> {
    let options = &self.options;
    load_all_routes(&options.routes).await?;

    let client: Arc<dyn StaticClient> = Arc::new(view.clone());
    let route = preload(&options.routes, location, client.clone()).await?;

    let (result, route_id) = match route {
      Some(route) => {
        let module = route.module().await?;
        let current = CurrentLocation {
          pathname: location.pathname.clone(),
          search: location.search.clone(),
          state: location.state.clone(),
          params: params_for(route, location),
        };
        let result = (module.render)(RenderContext { location: current, client }).await?;
        (result, Some(route.id.as_str()))
      }
      None => (RenderResult::not_found(&location.pathname), None),
    };

    let mut script_ids = vec![options.entry_id.as_str()];
    script_ids.extend(route_id);
    let mut hints = options.manifest.script_preloads(&script_ids, &options.static_base);
    hints.extend(view.preloads());
    let links = render_preload_links(&hints);

    let scripts = match options.manifest.entry_chunk(&options.entry_id) {
      Some(chunk) => format!(
        r#"<script type="module" src="{}/{chunk}"></script>"#,
        options.static_base.trim_end_matches('/')
      ),
      None => String::new(),
    };

    Ok(
      options
        .template
        .replace("%weft.htmlAttributes%", r#"lang="en""#)
        .replace("%weft.head%", &format!("{links}{}", result.head))
        .replace("%weft.styles%", &result.css)
        .replace("%weft.content%", &result.html)
        .replace("%weft.scripts%", &scripts),
    )
  }
}

/// Versioned slot for the active renderer. Every reload installs a fresh
/// renderer under a new version; old slots drop when the last reference
/// goes away. This replaces module-cache invalidation from dynamic
/// runtimes with an explicit swap.
pub struct RendererRegistry {
  current: RwLock<Option<Arc<Renderer>>>,
  version: AtomicU64,
}

impl RendererRegistry {
  pub fn new() -> Self {
    Self { current: RwLock::new(None), version: AtomicU64::new(0) }
  }

  /// Replaces the active renderer wholesale and returns the new version.
  pub fn install(&self, renderer: Renderer) -> u64 {
    let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
    if let Ok(mut current) = self.current.write() {
      *current = Some(Arc::new(renderer));
    }
    version
  }

  /// Requests read the slot at dispatch time; a swap never affects a
  /// render already in flight.
  pub fn current(&self) -> Option<Arc<Renderer>> {
    self.current.read().ok()?.clone()
  }

  pub fn version(&self) -> u64 {
    self.version.load(Ordering::SeqCst)
  }
}

impl Default for RendererRegistry {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use regex::Regex;
  use serde_json::json;

  use super::*;
  use crate::query::client::QueryFn;
  use crate::router::RouteModule;

  const TEMPLATE: &str = "<html %weft.htmlAttributes%><head>%weft.head%<style>%weft.styles%</style>\
                          </head><body>%weft.content%%weft.scripts%</body></html>";

  fn manifest() -> AssetManifest {
    serde_json::from_value(json!({
      "entry-client.js": ["entry-client.js", "shared.js"],
      "home": ["home.js", "shared.js"],
    }))
    .expect("manifest fixture")
  }

  fn home_route(client: &SsrStaticClient, hash: &str) -> Route {
    let hash = hash.to_string();
    let register_on = client.clone();
    Route::new(
      Regex::new("^/$").expect("pattern"),
      "home",
      Arc::new(move || {
        let resolver: QueryFn =
          Arc::new(|_params| Box::pin(async { Ok(json!({"title": "Home"})) }));
        register_on.register_query(hash.clone(), resolver);
        let preload_hash = hash.clone();
        let render_hash = hash.clone();
        Box::pin(async move {
          Ok(Arc::new(RouteModule {
            preload: Some(Arc::new(move |_current, client| {
              let hash = preload_hash.clone();
              Box::pin(async move {
                client.query(&hash, json!({})).await?;
                Ok(())
              })
            })),
            render: Arc::new(move |ctx| {
              let hash = render_hash.clone();
              Box::pin(async move {
                let data = ctx.client.query(&hash, json!({})).await?;
                Ok(RenderResult {
                  html: format!("<h1>{}</h1>", data["title"].as_str().unwrap_or("")),
                  head: "<title>Home</title>".to_string(),
                  css: "h1{color:red}".to_string(),
                })
              })
            }),
          }))
        })
      }),
    )
  }

  fn renderer(client: SsrStaticClient, routes: Vec<Route>) -> Renderer {
    Renderer::new(RendererOptions {
      template: TEMPLATE.to_string(),
      manifest: manifest(),
      routes: Arc::new(routes),
      client,
      entry_id: "entry-client.js".to_string(),
      static_base: "/static".to_string(),
    })
  }

  #[tokio::test]
  async fn render_splices_every_template_slot() {
    let client = SsrStaticClient::new("/_weft");
    let routes = vec![home_route(&client, "aa11bb22")];
    let renderer = renderer(client.clone(), routes);

    let view = client.clone_for_page();
    let html = renderer.render(&Location::from_pathname("/"), &view).await.expect("render");

    assert!(html.contains(r#"<html lang="en">"#));
    assert!(html.contains("<h1>Home</h1>"));
    assert!(html.contains("<title>Home</title>"));
    assert!(html.contains("h1{color:red}"));
    assert!(html.contains(r#"<script type="module" src="/static/entry-client.js"></script>"#));
  }

  #[tokio::test]
  async fn render_emits_script_and_data_preloads() {
    let client = SsrStaticClient::new("/_weft");
    let routes = vec![home_route(&client, "aa11bb22")];
    let renderer = renderer(client.clone(), routes);

    let view = client.clone_for_page();
    let html = renderer.render(&Location::from_pathname("/"), &view).await.expect("render");

    assert!(html.contains(r#"href="/static/entry-client.js" as="script""#));
    assert!(html.contains(r#"href="/static/home.js" as="script""#));
    assert!(html.contains(r#"href="/static/shared.js" as="script""#));
    assert!(html.contains(r#"/_weft/data/aa11bb22/"#));
    assert!(html.contains(r#"as="fetch""#));
  }

  #[tokio::test]
  async fn unmatched_location_renders_not_found() {
    let client = SsrStaticClient::new("/_weft");
    let routes = vec![home_route(&client, "aa11bb22")];
    let renderer = renderer(client.clone(), routes);

    let view = client.clone_for_page();
    let html = renderer.render(&Location::from_pathname("/missing"), &view).await.expect("render");

    assert!(html.contains("<h1>Not found</h1>"));
  }

  #[test]
  fn registry_swaps_whole_renderers() {
    let registry = RendererRegistry::new();
    assert!(registry.current().is_none());
    assert_eq!(registry.version(), 0);

    let client = SsrStaticClient::new("/_weft");
    let v1 = registry.install(renderer(client.clone(), Vec::new()));
    let first = registry.current().expect("installed");
    let v2 = registry.install(renderer(client, Vec::new()));
    let second = registry.current().expect("swapped");

    assert_eq!((v1, v2), (1, 2));
    assert!(!Arc::ptr_eq(&first, &second));
  }
}

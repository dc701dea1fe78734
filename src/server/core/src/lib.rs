/* src/server/core/src/lib.rs */

pub mod cache;
pub mod errors;
pub mod injector;
pub mod manifest;
pub mod query;
pub mod renderer;
pub mod router;

// Re-exports for ergonomic use
pub use cache::{canonical_key, CacheClient};
pub use errors::WeftError;
pub use manifest::{render_preload_links, AssetManifest, PreloadHint, PreloadKind};
pub use query::client::{data_url, BoxFuture, Fetcher, QueryFn, StaticClient};
pub use query::manager::{query_hash, QueryManager};
pub use query::replay::{FetchedRequest, ReplayLog};
pub use query::ssr::SsrStaticClient;
pub use query::web::WebStaticClient;
pub use renderer::{RenderContext, RenderFn, RenderResult, Renderer, RendererOptions, RendererRegistry};
pub use router::{
  load_all_routes, params_for, preload, route_from_location, CurrentLocation, LoadFn, Location,
  PreloadFn, Route, RouteModule,
};

/* src/cli/core/src/dev/server.rs */

// Dev HTTP server: static assets with an SSR fallback, the query data
// endpoint, and the live-reload event stream. Page/asset requests queue
// FIFO until the pipeline's first Ready; the renderer hot-swaps on every
// later event without restarting the listener.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::{Path as AxumPath, State};
use axum::http::{header, Request, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::sync::{broadcast, oneshot};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tower_http::compression::CompressionLayer;

use weft_server::renderer::{Renderer, RendererRegistry};
use weft_server::router::Location;
use weft_server::StaticClient;

use crate::ui;

pub const WEFT_PREFIX: &str = "/_weft";

/// Browser side of the live-reload channel: full page reload on
/// ready/reload, no navigation on compile/error.
const DEV_CLIENT_JS: &str = r#"let source;
function connect() {
  if (source || !window.EventSource) return;
  source = new EventSource("/_weft/livereload");
  let connected = false;
  source.onopen = function () {
    connected = true;
    console.log("[weft] dev client connected");
  };
  source.onerror = function () {
    if (connected) {
      console.log("[weft] dev client disconnected");
      connected = false;
    }
  };
  source.onmessage = function (event) {
    const data = JSON.parse(event.data);
    if (!data) return;
    if (["ready", "reload"].indexOf(data.action) > -1) {
      window.location.reload();
    }
  };
}
connect();
"#;

/// FIFO request gate. Requests submitted before the first Ready park on a
/// oneshot; `open` drains the queue in submission order, exactly once.
struct Gate {
  inner: Mutex<GateState>,
}

struct GateState {
  ready: bool,
  waiters: VecDeque<oneshot::Sender<()>>,
}

impl Gate {
  fn new() -> Self {
    Self { inner: Mutex::new(GateState { ready: false, waiters: VecDeque::new() }) }
  }

  fn is_ready(&self) -> bool {
    self.inner.lock().map(|state| state.ready).unwrap_or(false)
  }

  async fn wait(&self) {
    let receiver = {
      let Ok(mut state) = self.inner.lock() else { return };
      if state.ready {
        return;
      }
      let (tx, rx) = oneshot::channel();
      state.waiters.push_back(tx);
      rx
    };
    // A dropped sender still releases the request rather than hanging it.
    let _ = receiver.await;
  }

  fn open(&self) {
    let waiters = {
      let Ok(mut state) = self.inner.lock() else { return };
      if state.ready {
        return;
      }
      state.ready = true;
      std::mem::take(&mut state.waiters)
    };
    for waiter in waiters {
      let _ = waiter.send(());
    }
  }
}

struct ServerState {
  gate: Gate,
  registry: RendererRegistry,
  events: broadcast::Sender<String>,
  static_dir: PathBuf,
  static_base: String,
}

#[derive(Clone)]
pub struct DevServer {
  state: Arc<ServerState>,
}

impl DevServer {
  pub fn new(static_dir: PathBuf, static_base: impl Into<String>) -> Self {
    let (events, _) = broadcast::channel(64);
    Self {
      state: Arc::new(ServerState {
        gate: Gate::new(),
        registry: RendererRegistry::new(),
        events,
        static_dir,
        static_base: static_base.into(),
      }),
    }
  }

  pub fn is_ready(&self) -> bool {
    self.state.gate.is_ready()
  }

  /// First Ready: install the renderer and drain the request queue.
  pub fn ready(&self, renderer: Renderer) {
    self.state.registry.install(renderer);
    self.state.gate.open();
  }

  /// Replace the renderer wholesale; the gate is untouched.
  pub fn set_renderer(&self, renderer: Renderer) {
    self.state.registry.install(renderer);
  }

  pub fn renderer(&self) -> Option<Arc<Renderer>> {
    self.state.registry.current()
  }

  /// Broadcast one event to every connected live-reload client.
  pub fn send(&self, message: &serde_json::Value) {
    let _ = self.state.events.send(message.to_string());
  }

  /// Test/introspection hook: a receiver on the broadcast set.
  pub fn subscribe(&self) -> broadcast::Receiver<String> {
    self.state.events.subscribe()
  }

  pub fn router(&self) -> Router {
    Router::new()
      .route(&format!("{WEFT_PREFIX}/livereload"), get(handle_livereload))
      .route(&format!("{WEFT_PREFIX}/dev-client.js"), get(handle_dev_client))
      .route(&format!("{WEFT_PREFIX}/data/{{hash}}/{{params}}"), get(handle_data))
      .fallback(handle_page)
      .layer(CompressionLayer::new())
      .with_state(self.state.clone())
  }

  pub async fn serve(&self, listener: tokio::net::TcpListener) -> Result<()> {
    axum::serve(listener, self.router()).await.context("dev server failed")?;
    Ok(())
  }
}

async fn handle_dev_client() -> impl IntoResponse {
  ([(header::CONTENT_TYPE, "text/javascript")], DEV_CLIENT_JS)
}

async fn handle_livereload(
  State(state): State<Arc<ServerState>>,
) -> Sse<impl futures_util::Stream<Item = Result<Event, Infallible>>> {
  let receiver = state.events.subscribe();
  let stream = BroadcastStream::new(receiver)
    .filter_map(|message| message.ok().map(|data| Ok(Event::default().data(data))));
  Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn handle_data(
  State(state): State<Arc<ServerState>>,
  AxumPath((hash, params)): AxumPath<(String, String)>,
) -> Response {
  let Some(renderer) = state.registry.current() else {
    return (StatusCode::SERVICE_UNAVAILABLE, "no build is ready yet").into_response();
  };

  let raw = params.strip_suffix(".json").unwrap_or(&params);
  let params: serde_json::Value = match serde_json::from_str(raw) {
    Ok(value) => value,
    Err(e) => return (StatusCode::BAD_REQUEST, format!("invalid query params: {e}")).into_response(),
  };

  match renderer.client().query(&hash, params).await {
    Ok(value) => axum::Json(value).into_response(),
    Err(e) => {
      let status = StatusCode::from_u16(e.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
      (status, e.message().to_string()).into_response()
    }
  }
}

fn content_type(path: &Path) -> &'static str {
  match path.extension().and_then(|ext| ext.to_str()) {
    Some("html") => "text/html; charset=utf-8",
    Some("js" | "mjs") => "text/javascript",
    Some("css") => "text/css",
    Some("json") => "application/json",
    Some("svg") => "image/svg+xml",
    Some("png") => "image/png",
    Some("ico") => "image/x-icon",
    _ => "application/octet-stream",
  }
}

/// Resolve a request path inside the static dir, refusing traversal.
fn static_file(static_dir: &Path, request_path: &str) -> Option<PathBuf> {
  let trimmed = request_path.trim_start_matches('/');
  if trimmed.is_empty() || trimmed.split('/').any(|segment| segment == "..") {
    return None;
  }
  let candidate = static_dir.join(trimmed);
  candidate.is_file().then_some(candidate)
}

async fn handle_page(State(state): State<Arc<ServerState>>, request: Request<Body>) -> Response {
  state.gate.wait().await;

  let pathname = request.uri().path().to_string();

  // Compiled chunks and anything else present on disk win over SSR.
  let file_path = pathname
    .strip_prefix(state.static_base.as_str())
    .map(|rest| format!("static/{}", rest.trim_start_matches('/')))
    .unwrap_or_else(|| pathname.trim_start_matches('/').to_string());
  if let Some(file) = static_file(&state.static_dir, &file_path) {
    return match tokio::fs::read(&file).await {
      Ok(bytes) => ([(header::CONTENT_TYPE, content_type(&file))], bytes).into_response(),
      Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Oops").into_response(),
    };
  }

  let Some(renderer) = state.registry.current() else {
    return (StatusCode::SERVICE_UNAVAILABLE, "no build is ready yet").into_response();
  };

  let location = Location {
    pathname,
    search: request.uri().query().map(|q| format!("?{q}")).unwrap_or_default(),
    state: None,
  };
  let view = renderer.client().clone_for_page();
  match renderer.render(&location, &view).await {
    Ok(html) => ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], html).into_response(),
    Err(e) => {
      ui::fail(&format!("render {} failed: {e}", location.pathname));
      (StatusCode::INTERNAL_SERVER_ERROR, "Oops").into_response()
    }
  }
}

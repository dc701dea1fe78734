/* src/cli/core/src/dev/mod.rs */

mod network;
pub mod server;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::mpsc;

use weft_server::renderer::{Renderer, RendererOptions};
use weft_server::{AssetManifest, QueryManager, SsrStaticClient};

use crate::config::WeftConfig;
use crate::pipeline::bundle::{self, BundleOptions};
use crate::pipeline::routes::{self, RouteFile};
use crate::pipeline::template;
use crate::pipeline::{combine_events, entry, BuildEvent, SourceId};
use crate::site::{self, SiteOptions};
use crate::ui::{self, BOLD, CYAN, DIM, GREEN, MAGENTA, RESET};

use server::{DevServer, WEFT_PREFIX};

fn print_dev_banner(config: &WeftConfig, port: u16, watched: &[String]) {
  ui::banner("dev", Some(&config.project.name));
  println!("  {CYAN}routes{RESET}    {DIM}{}{RESET}", config.site.routes_dir);
  match config.build.bundler_command.as_deref() {
    Some(cmd) => println!("  {MAGENTA}bundler{RESET}   {DIM}{cmd}{RESET}"),
    None => println!("  {MAGENTA}bundler{RESET}   {DIM}built-in{RESET}"),
  }
  if !watched.is_empty() {
    println!("  {GREEN}watching{RESET}  {DIM}{}{RESET}", watched.join(", "));
  }
  println!();
  println!("  {GREEN}\u{2192}{RESET} {BOLD}http://localhost:{port}{RESET}");
  println!();
}

struct RendererInputs {
  site: SiteOptions,
  manifest_path: PathBuf,
  static_base: String,
  manager: Arc<QueryManager>,
}

/// One renderer per build: a fresh client (so route loading re-runs its
/// query registrations against the new table) bound to the latest
/// template, manifest and route files.
fn build_renderer(
  inputs: &RendererInputs,
  route_files: &[RouteFile],
  template: String,
) -> Result<Renderer> {
  let client = SsrStaticClient::new(WEFT_PREFIX);
  let routes = site::build_route_table(route_files, &inputs.site, &client, &inputs.manager)?;
  let manifest = AssetManifest::load(&inputs.manifest_path)
    .map_err(|e| anyhow::anyhow!("bundle manifest: {e}"))?;
  Ok(Renderer::new(RendererOptions {
    template,
    manifest,
    routes: Arc::new(routes),
    client,
    entry_id: "entry-client.js".to_string(),
    static_base: inputs.static_base.clone(),
  }))
}

pub async fn run_dev(config: &WeftConfig, base_dir: &Path) -> Result<()> {
  let weft_dir = base_dir.join(".weft");
  // Dev output lives beside production output, never inside it.
  let dev_root = weft_dir.join("dev-output");
  std::fs::create_dir_all(&dev_root)
    .with_context(|| format!("failed to create {}", dev_root.display()))?;

  let manager = Arc::new(QueryManager::new());
  let (src_tx, src_rx) = mpsc::channel(64);
  let (evt_tx, mut evt_rx) = mpsc::channel(64);

  let entries = entry::spawn(&weft_dir, &config.site.entry, true, src_tx.clone()).await?;
  let routes_source = routes::spawn_watch(
    base_dir.join(&config.site.routes_dir),
    weft_dir.clone(),
    src_tx.clone(),
  )
  .await?;

  let bundle_options = BundleOptions {
    base_dir: base_dir.to_path_buf(),
    client_entry: entries.client,
    ssr_entry: entries.ssr,
    out_dir: dev_root.join("static"),
    ssr_out_dir: weft_dir.join("build/server"),
    manifest_path: dev_root.join("manifest.json"),
    command: config.build.bundler_command.clone(),
    watch_dirs: vec![base_dir.join("src")],
    production: false,
  };
  let manifest_path = bundle_options.manifest_path.clone();
  let _bundle_source = bundle::spawn_watch(bundle_options, src_tx.clone()).await?;

  let template_source =
    template::spawn_watch(base_dir.join(&config.site.template), src_tx.clone()).await?;
  drop(src_tx);

  tokio::spawn(combine_events(
    vec![SourceId::Entry, SourceId::Routes, SourceId::Bundle, SourceId::Template],
    src_rx,
    evt_tx,
  ));

  let port = network::find_available_port(config.dev.port)?;
  let listener = tokio::net::TcpListener::bind((config.dev.host.as_str(), port))
    .await
    .with_context(|| format!("failed to bind {}:{port}", config.dev.host))?;

  let watched = vec![format!("{}/", config.site.routes_dir), "src/".to_string()];
  print_dev_banner(config, port, &watched);

  let server = DevServer::new(dev_root, config.build.static_base.clone());
  let mut serve_task = {
    let server = server.clone();
    tokio::spawn(async move { server.serve(listener).await })
  };

  let inputs = RendererInputs {
    site: SiteOptions {
      base_dir: base_dir.to_path_buf(),
      data_dir: base_dir.join(&config.site.data_dir),
      component_command: config.build.component_command.clone(),
    },
    manifest_path,
    static_base: config.build.static_base.clone(),
    manager,
  };

  loop {
    tokio::select! {
      _ = signal::ctrl_c() => {
        println!();
        println!("  {DIM}shutting down...{RESET}");
        break;
      }
      result = &mut serve_task => {
        match result {
          Ok(Err(e)) => ui::fail(&format!("dev server error: {e:#}")),
          Err(e) => ui::fail(&format!("dev server panicked: {e}")),
          Ok(Ok(())) => {}
        }
        break;
      }
      maybe_event = evt_rx.recv() => {
        let Some(event) = maybe_event else {
          ui::fail("build pipeline ended");
          break;
        };
        handle_event(&event, &server, &inputs, &routes_source, &template_source);
        server.send(&event_payload(&event));
      }
    }
  }

  Ok(())
}

fn handle_event(
  event: &BuildEvent,
  server: &DevServer,
  inputs: &RendererInputs,
  routes_source: &routes::RoutesSource,
  template_source: &template::TemplateSource,
) {
  match event {
    BuildEvent::Initialize => {}
    BuildEvent::Compile => println!("  {DIM}compiling...{RESET}"),
    BuildEvent::Ready | BuildEvent::Reload => {
      let route_files = routes_source.table.borrow().clone();
      let template = template_source.content.borrow().clone();
      match build_renderer(inputs, &route_files, template) {
        Ok(renderer) => {
          if matches!(event, BuildEvent::Ready) {
            server.ready(renderer);
            ui::ok("first build finished, serving queued requests");
          } else {
            server.set_renderer(renderer);
            ui::ok("rebuilt, reloading clients");
          }
        }
        Err(e) => ui::fail(&format!("renderer build failed: {e:#}")),
      }
    }
    BuildEvent::Error(message) => ui::fail(&format!("build error: {message}")),
  }
}

/// Live-reload payload; the browser client reloads on ready/reload and
/// leaves the page alone on compile/error.
fn event_payload(event: &BuildEvent) -> serde_json::Value {
  match event {
    BuildEvent::Error(message) => {
      serde_json::json!({ "action": event.action(), "message": message })
    }
    _ => serde_json::json!({ "action": event.action() }),
  }
}

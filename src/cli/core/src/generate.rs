/* src/cli/core/src/generate.rs */

// Static site generation: render every target location through the SSR
// renderer, and persist both the HTML pages and the query results captured
// on the replay log. The run only completes when the page stream and the
// data stream have both finished.

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use weft_server::renderer::{Renderer, RendererOptions};
use weft_server::router::{load_all_routes, Location};
use weft_server::{canonical_key, AssetManifest, FetchedRequest, QueryManager, SsrStaticClient};

use crate::config::WeftConfig;
use crate::dev::server::WEFT_PREFIX;
use crate::pipeline::bundle::{self, BundleOptions};
use crate::pipeline::routes::{scan_routes, write_route_table, RouteFile};
use crate::pipeline::{entry, template};
use crate::site::{build_route_table, SiteOptions};
use crate::ui;

fn clean_previous_output(out_dir: &Path, weft_build_dir: &Path) -> Result<()> {
  for dir in [out_dir, weft_build_dir] {
    if dir.exists() {
      std::fs::remove_dir_all(dir)
        .with_context(|| format!("failed to remove {}", dir.display()))?;
    }
  }
  Ok(())
}

fn target_locations(config: &WeftConfig, route_files: &[RouteFile]) -> Vec<String> {
  match &config.generate.routes {
    Some(routes) => routes.clone(),
    None => route_files.iter().filter_map(RouteFile::static_pathname).collect(),
  }
}

async fn write_data_artifact(data_root: &Path, request: &FetchedRequest) -> Result<()> {
  let encoded = urlencoding::encode(&canonical_key(&request.params)).into_owned();
  let dir = data_root.join(&request.hash);
  tokio::fs::create_dir_all(&dir)
    .await
    .with_context(|| format!("failed to create {}", dir.display()))?;
  let path = dir.join(format!("{encoded}.json"));
  let json = serde_json::to_string(&request.result)?;
  tokio::fs::write(&path, json)
    .await
    .with_context(|| format!("failed to write {}", path.display()))?;
  Ok(())
}

async fn write_page(out_dir: &Path, pathname: &str, html: &str) -> Result<()> {
  let page_dir = out_dir.join(pathname.trim_start_matches('/'));
  tokio::fs::create_dir_all(&page_dir)
    .await
    .with_context(|| format!("failed to create {}", page_dir.display()))?;
  let path = page_dir.join("index.html");
  tokio::fs::write(&path, html)
    .await
    .with_context(|| format!("failed to write {}", path.display()))?;
  Ok(())
}

pub async fn run_build(config: &WeftConfig, base_dir: &Path) -> Result<()> {
  ui::banner("build", Some(&config.project.name));

  let weft_dir = base_dir.join(".weft");
  let out_dir = base_dir.join(&config.build.out_dir);
  clean_previous_output(&out_dir, &weft_dir.join("build"))?;

  ui::step(1, 4, "Generating entries and route table");
  let entries = entry::write_entries(&weft_dir, &config.site.entry, false)?;
  let route_files = scan_routes(&base_dir.join(&config.site.routes_dir))?;
  write_route_table(&weft_dir, &route_files)?;
  ui::detail(&format!("{} route(s)", route_files.len()));

  ui::step(2, 4, "Bundling");
  let bundle_options = BundleOptions {
    base_dir: base_dir.to_path_buf(),
    client_entry: entries.client,
    ssr_entry: entries.ssr,
    out_dir: out_dir.join("static"),
    ssr_out_dir: weft_dir.join("build/server"),
    manifest_path: out_dir.join("manifest.json"),
    command: config.build.bundler_command.clone(),
    watch_dirs: Vec::new(),
    production: true,
  };
  {
    let options = bundle_options.clone();
    tokio::task::spawn_blocking(move || bundle::compile(&options))
      .await
      .context("bundler task panicked")??;
  }

  ui::step(3, 4, "Preparing renderer");
  let template = template::read_template(&base_dir.join(&config.site.template))?;
  let manager = Arc::new(QueryManager::new());
  let client = SsrStaticClient::new(WEFT_PREFIX);
  let site_options = SiteOptions {
    base_dir: base_dir.to_path_buf(),
    data_dir: base_dir.join(&config.site.data_dir),
    component_command: config.build.component_command.clone(),
  };
  let routes = Arc::new(build_route_table(&route_files, &site_options, &client, &manager)?);
  let manifest =
    AssetManifest::load(&bundle_options.manifest_path).map_err(|e| anyhow!("{e}"))?;
  let renderer = Renderer::new(RendererOptions {
    template,
    manifest,
    routes: routes.clone(),
    client: client.clone(),
    entry_id: "entry-client.js".to_string(),
    static_base: config.build.static_base.clone(),
  });

  let locations = target_locations(config, &route_files);
  if locations.is_empty() {
    bail!(
      "no locations to generate: every route is parameterized, list targets under [generate] routes"
    );
  }

  ui::step(4, 4, "Rendering pages");

  // Subscribe before any render so no captured request is missed; the
  // drain finishes only after the log closes, so trailing writes settle
  // before the run reports completion.
  let mut log = client.subscribe_log().map_err(|e| anyhow!("{e}"))?;
  let data_root = out_dir.join("_weft/data");
  let drain = tokio::spawn(async move {
    let mut written = 0usize;
    while let Some(request) = log.recv().await {
      write_data_artifact(&data_root, &request).await?;
      written += 1;
    }
    Ok::<usize, anyhow::Error>(written)
  });

  // Load every module up front so all query registrations have run.
  load_all_routes(&routes).await.map_err(|e| anyhow!("{e}"))?;

  let progress = ProgressBar::new(locations.len() as u64).with_style(
    ProgressStyle::with_template("  {bar:24} {pos}/{len} {msg}").unwrap_or_else(|_| ProgressStyle::default_bar()),
  );
  let mut total_bytes = 0u64;
  for pathname in &locations {
    progress.set_message(pathname.clone());
    let view = client.clone_for_page();
    let html = renderer
      .render(&Location::from_pathname(pathname.as_str()), &view)
      .await
      .map_err(|e| anyhow!("failed to render {pathname}: {e}"))?;
    total_bytes += html.len() as u64;
    write_page(&out_dir, pathname, &html).await?;
    progress.inc(1);
  }
  progress.finish_and_clear();

  client.close().map_err(|e| anyhow!("{e}"))?;
  let artifacts = drain.await.context("data writer panicked")??;

  ui::blank();
  ui::ok(&format!("{} page(s) ({})", locations.len(), ui::format_size(total_bytes)));
  ui::ok(&format!("{artifacts} data artifact(s)"));
  ui::ok(&format!("output in {}", out_dir.display()));
  Ok(())
}

/* src/cli/core/src/site/mod.rs */

// Site model: turns discovered route files into the runtime route table.
// Loading a route module compiles its component (external command or
// pass-through), registers its declared queries on the active
// SsrStaticClient, and wires the preload hook and render function.

mod frontmatter;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use regex::Regex;

use weft_server::injector;
use weft_server::query::client::QueryFn;
use weft_server::renderer::{RenderFn, RenderResult};
use weft_server::router::{LoadFn, PreloadFn, Route, RouteModule};
use weft_server::{QueryManager, SsrStaticClient, WeftError};

use crate::pipeline::routes::RouteFile;

use frontmatter::QueryDecl;

#[derive(Clone)]
pub struct SiteOptions {
  pub base_dir: PathBuf,
  pub data_dir: PathBuf,
  pub component_command: Option<String>,
}

/// `{name}` placeholders of a data-file path template.
fn placeholders(source: &str) -> Vec<String> {
  let mut names = Vec::new();
  let mut rest = source;
  while let Some(start) = rest.find('{') {
    let after = &rest[start + 1..];
    let Some(end) = after.find('}') else { break };
    names.push(after[..end].to_string());
    rest = &after[end + 1..];
  }
  names
}

fn substitute(source: &str, params: &serde_json::Value) -> Result<String, WeftError> {
  let mut out = source.to_string();
  for name in placeholders(source) {
    let value = params
      .get(&name)
      .ok_or_else(|| WeftError::validation(format!("missing query param \"{name}\"")))?;
    let text = match value {
      serde_json::Value::String(s) => s.clone(),
      other => other.to_string(),
    };
    out = out.replace(&format!("{{{name}}}"), &text);
  }
  Ok(out)
}

/// File-backed resolver: substitute placeholders, read the data file,
/// parse JSON. Failures surface as DATA_FETCH, never as a crash.
fn make_resolver(data_dir: PathBuf, source: String) -> QueryFn {
  Arc::new(move |params| {
    let data_dir = data_dir.clone();
    let source = source.clone();
    Box::pin(async move {
      let relative = substitute(&source, &params)?;
      if relative.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(WeftError::validation(format!("query source escapes data dir: {relative}")));
      }
      let path = data_dir.join(&relative);
      let text = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| WeftError::data_fetch(format!("failed to read {}: {e}", path.display())))?;
      serde_json::from_str(&text)
        .map_err(|e| WeftError::data_fetch(format!("invalid JSON in {}: {e}", path.display())))
    })
  })
}

struct BoundQuery {
  key: String,
  hash: String,
  placeholders: Vec<String>,
}

impl BoundQuery {
  /// Query params are exactly the route params the source references, so
  /// a placeholder-free source yields one shared `(hash, {})` pair across
  /// every page that declares it.
  fn params_from(&self, route_params: &HashMap<String, String>) -> Result<serde_json::Value, WeftError> {
    let mut params = serde_json::Map::new();
    for name in &self.placeholders {
      let value = route_params
        .get(name)
        .ok_or_else(|| WeftError::validation(format!("route provides no param \"{name}\"")))?;
      params.insert(name.clone(), serde_json::Value::String(value.clone()));
    }
    Ok(serde_json::Value::Object(params))
  }
}

fn compile_component(options: &SiteOptions, body: &str) -> Result<String, WeftError> {
  match &options.component_command {
    Some(command) => crate::shell::run_filter(&options.base_dir, command, "component compiler", body)
      .map_err(|e| WeftError::render(format!("{e:#}"))),
    None => Ok(body.to_string()),
  }
}

fn bind_queries(
  declared: Vec<QueryDecl>,
  options: &SiteOptions,
  client: &SsrStaticClient,
  manager: &QueryManager,
) -> Vec<BoundQuery> {
  declared
    .into_iter()
    .map(|decl| {
      let hash = manager.register_query(&decl.source);
      client.register_query(&hash, make_resolver(options.data_dir.clone(), decl.source.clone()));
      BoundQuery { key: decl.key, hash, placeholders: placeholders(&decl.source) }
    })
    .collect()
}

fn make_load(
  file: PathBuf,
  options: SiteOptions,
  client: SsrStaticClient,
  manager: Arc<QueryManager>,
) -> LoadFn {
  Arc::new(move || {
    let file = file.clone();
    let options = options.clone();
    let client = client.clone();
    let manager = manager.clone();
    Box::pin(async move {
      let source = tokio::fs::read_to_string(&file)
        .await
        .map_err(|e| WeftError::internal(format!("failed to read {}: {e}", file.display())))?;
      let (fm, body) =
        frontmatter::split(&source).map_err(|e| WeftError::render(format!("{e:#}")))?;

      let markup = {
        let options = options.clone();
        let body = body.to_string();
        tokio::task::spawn_blocking(move || compile_component(&options, &body))
          .await
          .map_err(|e| WeftError::internal(format!("component compiler panicked: {e}")))??
      };

      let bound = Arc::new(bind_queries(fm.queries, &options, &client, &manager));

      let preload = if bound.is_empty() {
        None
      } else {
        let bound = bound.clone();
        let hook: PreloadFn = Arc::new(move |current, client| {
          let bound = bound.clone();
          Box::pin(async move {
            for query in bound.iter() {
              let params = query.params_from(&current.params)?;
              client.query(&query.hash, params).await?;
            }
            Ok(())
          })
        });
        Some(hook)
      };

      let title = fm.title;
      let render: RenderFn = Arc::new(move |ctx| {
        let bound = bound.clone();
        let markup = markup.clone();
        let title = title.clone();
        Box::pin(async move {
          let mut data = serde_json::Map::new();
          for query in bound.iter() {
            let params = query.params_from(&ctx.location.params)?;
            let value = ctx.client.query(&query.hash, params).await?;
            data.insert(query.key.clone(), value);
          }
          let html = injector::inject(&markup, &serde_json::Value::Object(data));
          let head = title.map(|t| format!("<title>{t}</title>")).unwrap_or_default();
          Ok(RenderResult { html, head, css: String::new() })
        })
      });

      Ok(Arc::new(RouteModule { preload, render }))
    })
  })
}

/// Builds the runtime route table for one route-table generation. Resolved
/// modules cache on the returned records; a rebuilt table starts fresh.
pub fn build_route_table(
  files: &[RouteFile],
  options: &SiteOptions,
  client: &SsrStaticClient,
  manager: &Arc<QueryManager>,
) -> Result<Vec<Route>> {
  files
    .iter()
    .map(|file| {
      let pattern = Regex::new(&file.pattern)
        .with_context(|| format!("invalid route pattern {} for {}", file.pattern, file.id))?;
      Ok(Route::new(
        pattern,
        file.id.clone(),
        make_load(file.file.clone(), options.clone(), client.clone(), manager.clone()),
      ))
    })
    .collect()
}

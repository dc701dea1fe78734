/* src/cli/core/src/pipeline/routes.rs */

// Route-table source: scans the routes directory for component files,
// derives a pathname pattern per file, writes the generated table to
// `.weft/routes.json`, and re-emits on watched changes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use tokio::sync::{mpsc, watch};

use super::{BuildEvent, SourceEvent, SourceId};

const DEBOUNCE: Duration = Duration::from_millis(300);

/// One discovered route component file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteFile {
  /// Stable chunk id: the path relative to the routes directory.
  pub id: String,
  /// Pathname pattern with named capture groups.
  pub pattern: String,
  pub file: PathBuf,
}

impl RouteFile {
  pub fn has_params(&self) -> bool {
    self.pattern.contains("(?<")
  }

  /// Concrete pathname for capture-free patterns; `None` for
  /// parameterized routes, which must be listed explicitly for
  /// generation.
  pub fn static_pathname(&self) -> Option<String> {
    if self.has_params() {
      return None;
    }
    let trimmed = self.pattern.trim_start_matches('^').trim_end_matches('$');
    let trimmed = trimmed.trim_end_matches("/?");
    Some(if trimmed.is_empty() { "/".to_string() } else { trimmed.to_string() })
  }
}

/// `[name]` segments become named captures; `index` names the directory
/// itself; everything else is a literal segment.
fn pattern_segment(stem: &str) -> String {
  match stem.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
    Some(name) => format!("(?<{name}>[^/?#]+)"),
    None => regex_escape(stem),
  }
}

fn regex_escape(segment: &str) -> String {
  let mut out = String::with_capacity(segment.len());
  for ch in segment.chars() {
    if !ch.is_alphanumeric() && ch != '_' && ch != '-' {
      out.push('\\');
    }
    out.push(ch);
  }
  out
}

/// Pattern for a component file path relative to the routes directory.
pub fn pattern_for(relative: &Path) -> String {
  let mut segments: Vec<String> = Vec::new();
  let components: Vec<_> = relative.iter().filter_map(|c| c.to_str()).collect();
  for (index, component) in components.iter().enumerate() {
    let is_last = index == components.len() - 1;
    let name = if is_last {
      component.strip_suffix(".html").unwrap_or(component)
    } else {
      component
    };
    if is_last && name == "index" {
      break;
    }
    segments.push(pattern_segment(name));
  }
  if segments.is_empty() {
    "^/$".to_string()
  } else {
    format!("^/{}/?$", segments.join("/"))
  }
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
  let entries =
    std::fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
  for entry in entries {
    let path = entry?.path();
    if path.is_dir() {
      collect_files(&path, out)?;
    } else if path.extension().is_some_and(|ext| ext == "html") {
      out.push(path);
    }
  }
  Ok(())
}

/// Scans the routes directory. Capture-free routes sort before
/// parameterized ones so a literal pathname never falls through to a
/// parameter match.
pub fn scan_routes(routes_dir: &Path) -> Result<Vec<RouteFile>> {
  let mut files = Vec::new();
  collect_files(routes_dir, &mut files)?;

  let mut routes: Vec<RouteFile> = files
    .into_iter()
    .filter_map(|file| {
      let relative = file.strip_prefix(routes_dir).ok()?.to_path_buf();
      let id = relative.to_string_lossy().replace('\\', "/");
      Some(RouteFile { pattern: pattern_for(&relative), id, file })
    })
    .collect();

  routes.sort_by(|a, b| (a.has_params(), &a.id).cmp(&(b.has_params(), &b.id)));
  Ok(routes)
}

/// Writes the generated route table consumed by tooling and the client
/// runtime.
pub fn write_route_table(weft_dir: &Path, routes: &[RouteFile]) -> Result<PathBuf> {
  std::fs::create_dir_all(weft_dir)
    .with_context(|| format!("failed to create {}", weft_dir.display()))?;
  let path = weft_dir.join("routes.json");
  let json = serde_json::to_string_pretty(routes).context("failed to serialize route table")?;
  std::fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
  Ok(path)
}

pub struct RoutesSource {
  // Held for its side effect: dropping stops the watch stream.
  _watcher: RecommendedWatcher,
  pub table: watch::Receiver<Vec<RouteFile>>,
}

/// Performs the initial scan synchronously (Ready), then re-scans and
/// emits Reload on changes. A scan failure after a change is an Error
/// event; the source keeps watching.
pub async fn spawn_watch(
  routes_dir: PathBuf,
  weft_dir: PathBuf,
  events: mpsc::Sender<SourceEvent>,
) -> Result<RoutesSource> {
  let initial = scan_routes(&routes_dir)?;
  write_route_table(&weft_dir, &initial)?;
  let (table_tx, table_rx) = watch::channel(initial);
  let _ = events.send(SourceEvent::new(SourceId::Routes, BuildEvent::Ready)).await;

  let (change_tx, mut change_rx) = mpsc::channel::<()>(16);
  let mut watcher = RecommendedWatcher::new(
    move |res: std::result::Result<notify::Event, notify::Error>| {
      if res.is_ok() {
        let _ = change_tx.blocking_send(());
      }
    },
    notify::Config::default(),
  )?;
  watcher.watch(&routes_dir, RecursiveMode::Recursive)?;

  tokio::spawn(async move {
    while change_rx.recv().await.is_some() {
      // Debounce: wait, then drain pending events
      tokio::time::sleep(DEBOUNCE).await;
      while change_rx.try_recv().is_ok() {}

      match scan_routes(&routes_dir) {
        Ok(routes) => {
          let event = if write_route_table(&weft_dir, &routes).is_ok() {
            let _ = table_tx.send(routes);
            BuildEvent::Reload
          } else {
            BuildEvent::Error("failed to write route table".to_string())
          };
          if events.send(SourceEvent::new(SourceId::Routes, event)).await.is_err() {
            break;
          }
        }
        Err(e) => {
          let event = BuildEvent::Error(format!("route scan failed: {e}"));
          if events.send(SourceEvent::new(SourceId::Routes, event)).await.is_err() {
            break;
          }
        }
      }
    }
  });

  Ok(RoutesSource { _watcher: watcher, table: table_rx })
}

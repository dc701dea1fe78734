/* src/cli/core/src/pipeline/template.rs */

// Template source: reads the page template, publishes the latest content
// on a watch channel, and emits Ready (first read) / Reload (changes).
// The combined event stream never carries template text; renderer builds
// read the watch channel instead.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, watch};

use super::{BuildEvent, SourceEvent, SourceId};

const DEBOUNCE: Duration = Duration::from_millis(300);

pub struct TemplateSource {
  // Held for its side effect: dropping stops the watch stream.
  _watcher: RecommendedWatcher,
  pub content: watch::Receiver<String>,
}

pub fn read_template(path: &Path) -> Result<String> {
  std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

pub async fn spawn_watch(
  template_path: PathBuf,
  events: mpsc::Sender<SourceEvent>,
) -> Result<TemplateSource> {
  let initial = read_template(&template_path)?;
  let (content_tx, content_rx) = watch::channel(initial);
  let _ = events.send(SourceEvent::new(SourceId::Template, BuildEvent::Ready)).await;

  let (change_tx, mut change_rx) = mpsc::channel::<()>(16);
  let mut watcher = RecommendedWatcher::new(
    move |res: std::result::Result<notify::Event, notify::Error>| {
      if res.is_ok() {
        let _ = change_tx.blocking_send(());
      }
    },
    notify::Config::default(),
  )?;
  // Watch the parent: editors replace files instead of writing in place.
  let watch_target = template_path.parent().map(PathBuf::from).unwrap_or_else(|| template_path.clone());
  watcher.watch(&watch_target, RecursiveMode::NonRecursive)?;

  tokio::spawn(async move {
    while change_rx.recv().await.is_some() {
      tokio::time::sleep(DEBOUNCE).await;
      while change_rx.try_recv().is_ok() {}

      let event = match read_template(&template_path) {
        Ok(content) => {
          if *content_tx.borrow() == content {
            continue;
          }
          let _ = content_tx.send(content);
          BuildEvent::Reload
        }
        Err(e) => BuildEvent::Error(format!("{e:#}")),
      };
      if events.send(SourceEvent::new(SourceId::Template, event)).await.is_err() {
        break;
      }
    }
  });

  Ok(TemplateSource { _watcher: watcher, content: content_rx })
}

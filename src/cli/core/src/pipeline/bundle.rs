/* src/cli/core/src/pipeline/bundle.rs */

// Bundle source: invokes the module bundler (external command, or the
// built-in copy bundler when none is configured) for the client and SSR
// targets, then watches the source directories and recompiles on change.
//
// Event shape per compile pass: Compile, then Ready (first success) or
// Reload (later successes) or Error (failed pass; watching continues).
// Only a watcher failure is fatal for this source.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::shell::run_command;

use super::{BuildEvent, SourceEvent, SourceId};

const DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone)]
pub struct BundleOptions {
  pub base_dir: PathBuf,
  pub client_entry: PathBuf,
  pub ssr_entry: PathBuf,
  /// Client chunks land here (served under the static base).
  pub out_dir: PathBuf,
  /// SSR chunks land here (never served).
  pub ssr_out_dir: PathBuf,
  pub manifest_path: PathBuf,
  pub command: Option<String>,
  pub watch_dirs: Vec<PathBuf>,
  pub production: bool,
}

/// Fallback bundler: copies each entry to its output directory and writes
/// a manifest with one chunk per entry. Enough for sites whose components
/// carry no scripts of their own.
fn builtin_bundle(options: &BundleOptions) -> Result<()> {
  let mut manifest = serde_json::Map::new();
  for (entry, out_dir) in
    [(&options.client_entry, &options.out_dir), (&options.ssr_entry, &options.ssr_out_dir)]
  {
    let name = entry
      .file_name()
      .and_then(|n| n.to_str())
      .with_context(|| format!("invalid entry path {}", entry.display()))?;
    std::fs::create_dir_all(out_dir)
      .with_context(|| format!("failed to create {}", out_dir.display()))?;
    std::fs::copy(entry, out_dir.join(name))
      .with_context(|| format!("failed to copy {}", entry.display()))?;
    manifest.insert(name.to_string(), serde_json::json!([name]));
  }

  if let Some(parent) = options.manifest_path.parent() {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }
  std::fs::write(&options.manifest_path, serde_json::to_string_pretty(&manifest)?)
    .with_context(|| format!("failed to write {}", options.manifest_path.display()))?;
  Ok(())
}

/// One compile pass through the configured bundler.
pub fn compile(options: &BundleOptions) -> Result<()> {
  match &options.command {
    Some(command) => {
      let env = options.env_vars();
      let env_refs: Vec<(&str, &str)> =
        env.iter().map(|(k, v)| (*k, v.as_str())).collect();
      run_command(&options.base_dir, command, "bundler", &env_refs)
    }
    None => builtin_bundle(options),
  }
}

impl BundleOptions {
  fn env_vars(&self) -> Vec<(&'static str, String)> {
    vec![
      ("WEFT_CLIENT_ENTRY", self.client_entry.display().to_string()),
      ("WEFT_SSR_ENTRY", self.ssr_entry.display().to_string()),
      ("WEFT_OUT_DIR", self.out_dir.display().to_string()),
      ("WEFT_SSR_OUT_DIR", self.ssr_out_dir.display().to_string()),
      ("WEFT_MANIFEST", self.manifest_path.display().to_string()),
      ("WEFT_ENV", if self.production { "production" } else { "development" }.to_string()),
    ]
  }
}

async fn compile_pass(options: &BundleOptions) -> Result<()> {
  let options = options.clone();
  tokio::task::spawn_blocking(move || compile(&options))
    .await
    .context("bundler task panicked")?
}

pub struct BundleSource {
  // Held for its side effect: dropping stops the watch stream.
  _watcher: RecommendedWatcher,
}

/// Runs the first compile pass, then recompiles on watched changes.
pub async fn spawn_watch(
  options: BundleOptions,
  events: mpsc::Sender<SourceEvent>,
) -> Result<BundleSource> {
  let (change_tx, mut change_rx) = mpsc::channel::<()>(16);
  let mut watcher = RecommendedWatcher::new(
    move |res: std::result::Result<notify::Event, notify::Error>| {
      if res.is_ok() {
        let _ = change_tx.blocking_send(());
      }
    },
    notify::Config::default(),
  )?;
  for dir in &options.watch_dirs {
    if dir.exists() {
      watcher.watch(dir, RecursiveMode::Recursive)?;
    }
  }

  tokio::spawn(async move {
    let mut ready = false;
    loop {
      let _ = events.send(SourceEvent::new(SourceId::Bundle, BuildEvent::Compile)).await;
      let event = match compile_pass(&options).await {
        Ok(()) if ready => BuildEvent::Reload,
        Ok(()) => {
          ready = true;
          BuildEvent::Ready
        }
        Err(e) => BuildEvent::Error(format!("{e:#}")),
      };
      if events.send(SourceEvent::new(SourceId::Bundle, event)).await.is_err() {
        break;
      }

      // Wait for the next change; channel end means the watcher is gone.
      if change_rx.recv().await.is_none() {
        break;
      }
      tokio::time::sleep(DEBOUNCE).await;
      while change_rx.try_recv().is_ok() {}
    }
  });

  Ok(BundleSource { _watcher: watcher })
}

#[cfg(test)]
mod tests {
  use std::path::Path;

  use super::*;

  fn options(dir: &Path) -> BundleOptions {
    BundleOptions {
      base_dir: dir.to_path_buf(),
      client_entry: dir.join(".weft/entry-client.js"),
      ssr_entry: dir.join(".weft/entry-ssr.js"),
      out_dir: dir.join("build/static"),
      ssr_out_dir: dir.join(".weft/build/server"),
      manifest_path: dir.join("build/manifest.json"),
      command: None,
      watch_dirs: vec![dir.join("src")],
      production: false,
    }
  }

  fn write_entries(dir: &Path) {
    std::fs::create_dir_all(dir.join(".weft")).expect("mkdir");
    std::fs::write(dir.join(".weft/entry-client.js"), "export default 1;\n").expect("write");
    std::fs::write(dir.join(".weft/entry-ssr.js"), "export default 2;\n").expect("write");
  }

  #[test]
  fn builtin_bundler_copies_entries_and_writes_manifest() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_entries(dir.path());

    compile(&options(dir.path())).expect("compile");

    assert!(dir.path().join("build/static/entry-client.js").is_file());
    assert!(dir.path().join(".weft/build/server/entry-ssr.js").is_file());
    let manifest: serde_json::Value =
      serde_json::from_str(&std::fs::read_to_string(dir.path().join("build/manifest.json")).expect("read"))
        .expect("parse");
    assert_eq!(manifest["entry-client.js"][0], "entry-client.js");
  }

  #[test]
  fn missing_entry_is_a_compile_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    assert!(compile(&options(dir.path())).is_err());
  }

  #[test]
  fn external_command_receives_env() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut opts = options(dir.path());
    opts.command = Some("printenv WEFT_ENV > weft-env.txt".to_string());
    opts.production = true;

    compile(&opts).expect("compile");
    let env = std::fs::read_to_string(dir.path().join("weft-env.txt")).expect("read");
    assert_eq!(env.trim(), "production");
  }
}

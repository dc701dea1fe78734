/* src/cli/core/src/pipeline/mod.rs */

// Build event pipeline: every compilation source is a task pushing typed
// events into one channel; a combiner task applies the readiness gate and
// forwards the merged stream to the consumer (dev loop or generator).

pub mod bundle;
pub mod entry;
pub mod routes;
pub mod template;

use std::collections::HashSet;

use tokio::sync::mpsc;

use crate::ui;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildEvent {
  Initialize,
  Compile,
  Ready,
  Reload,
  Error(String),
}

impl BuildEvent {
  /// Wire name broadcast to live-reload clients.
  pub fn action(&self) -> &'static str {
    match self {
      Self::Initialize => "initialize",
      Self::Compile => "compile",
      Self::Ready => "ready",
      Self::Reload => "reload",
      Self::Error(_) => "error",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceId {
  Entry,
  Routes,
  Bundle,
  Template,
}

impl SourceId {
  pub fn label(self) -> &'static str {
    match self {
      Self::Entry => "entry",
      Self::Routes => "routes",
      Self::Bundle => "bundle",
      Self::Template => "template",
    }
  }
}

#[derive(Debug, Clone)]
pub struct SourceEvent {
  pub source: SourceId,
  pub event: BuildEvent,
}

impl SourceEvent {
  pub fn new(source: SourceId, event: BuildEvent) -> Self {
    Self { source, event }
  }
}

/// Merges per-source streams into one ordered downstream stream.
///
/// The gate depends only on the set of sources having reached their first
/// Ready, never on interleaving: output is suppressed until every expected
/// source has emitted Ready once, then exactly one synthetic Ready goes
/// out, then every later event is forwarded verbatim (the consumed first
/// Ready of each source excepted). A synthetic Initialize prefixes the
/// whole stream so consumers can tell startup from the first finished
/// build.
pub async fn combine_events(
  expected: Vec<SourceId>,
  mut sources: mpsc::Receiver<SourceEvent>,
  downstream: mpsc::Sender<BuildEvent>,
) {
  if downstream.send(BuildEvent::Initialize).await.is_err() {
    return;
  }

  let mut first_ready_seen: HashSet<SourceId> = HashSet::new();
  let mut gate_open = false;

  while let Some(SourceEvent { source, event }) = sources.recv().await {
    match event {
      BuildEvent::Ready if !first_ready_seen.contains(&source) => {
        first_ready_seen.insert(source);
        if !gate_open && expected.iter().all(|id| first_ready_seen.contains(id)) {
          gate_open = true;
          if downstream.send(BuildEvent::Ready).await.is_err() {
            return;
          }
        }
      }
      event => {
        if let BuildEvent::Error(message) = &event {
          ui::fail(&format!("[{}] {message}", source.label()));
        }
        if gate_open && downstream.send(event).await.is_err() {
          return;
        }
      }
    }
  }
}

/* src/server/core/src/manifest.rs */

// Compiled-asset manifest: module id -> [chunk file, ...transitive imports].
// Written by the bundler next to its output; read here to compute
// per-page script preload hints.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::errors::WeftError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetManifest {
  #[serde(flatten)]
  entries: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreloadKind {
  Script,
  Fetch,
}

impl PreloadKind {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Script => "script",
      Self::Fetch => "fetch",
    }
  }
}

/// One `<link rel="preload">` entry emitted into a rendered page's head.
#[derive(Debug, Clone)]
pub struct PreloadHint {
  pub href: String,
  pub kind: PreloadKind,
  pub crossorigin: bool,
}

impl AssetManifest {
  pub fn load(path: &Path) -> Result<Self, WeftError> {
    let content = std::fs::read_to_string(path)
      .map_err(|e| WeftError::internal(format!("failed to read {}: {e}", path.display())))?;
    serde_json::from_str(&content)
      .map_err(|e| WeftError::internal(format!("failed to parse {}: {e}", path.display())))
  }

  pub fn chunks_for(&self, id: &str) -> Option<&[String]> {
    self.entries.get(id).map(Vec::as_slice)
  }

  /// Chunk file of a module id's own facade (first entry), used for the
  /// page's `<script>` tag.
  pub fn entry_chunk(&self, id: &str) -> Option<&str> {
    self.entries.get(id).and_then(|chunks| chunks.first()).map(String::as_str)
  }

  /// Script preload hints for the given module ids, deduplicated while
  /// preserving first-seen order. Unknown ids contribute nothing.
  pub fn script_preloads(&self, ids: &[&str], base: &str) -> Vec<PreloadHint> {
    let mut seen = std::collections::HashSet::new();
    let mut hints = Vec::new();
    for id in ids {
      let Some(chunks) = self.entries.get(*id) else { continue };
      for chunk in chunks {
        let href = format!("{}/{}", base.trim_end_matches('/'), chunk);
        if seen.insert(href.clone()) {
          hints.push(PreloadHint { href, kind: PreloadKind::Script, crossorigin: true });
        }
      }
    }
    hints
  }
}

/// Render hints as `<link rel="preload">` tags; boolean attributes are
/// emitted bare, matching how browsers parse them.
pub fn render_preload_links(hints: &[PreloadHint]) -> String {
  hints
    .iter()
    .map(|hint| {
      let crossorigin = if hint.crossorigin { " crossorigin" } else { "" };
      format!(
        r#"<link rel="preload" href="{}" as="{}"{crossorigin} />"#,
        hint.href,
        hint.kind.as_str()
      )
    })
    .collect::<Vec<_>>()
    .join("")
}

/* src/cli/core/src/pipeline/entry.rs */

// Entry source: writes the generated client and SSR bundle entries. The
// dev build prepends the live-reload client import so every served page
// connects to the event stream.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use super::{BuildEvent, SourceEvent, SourceId};

pub struct EntryFiles {
  pub client: PathBuf,
  pub ssr: PathBuf,
}

fn client_entry(app_entry: &str, dev: bool) -> String {
  let dev_import = if dev { "import \"/_weft/dev-client.js\";\n" } else { "" };
  format!(
    "{dev_import}import {{ renderClient }} from \"weft\";\n\
     import routes from \"./routes.json\";\n\
     import \"../{app_entry}\";\n\n\
     export default renderClient(routes);\n"
  )
}

fn ssr_entry(app_entry: &str) -> String {
  format!(
    "import {{ renderSsr }} from \"weft\";\n\
     import routes from \"./routes.json\";\n\
     import \"../{app_entry}\";\n\n\
     export default renderSsr(routes);\n"
  )
}

pub fn write_entries(weft_dir: &Path, app_entry: &str, dev: bool) -> Result<EntryFiles> {
  std::fs::create_dir_all(weft_dir)
    .with_context(|| format!("failed to create {}", weft_dir.display()))?;

  let client = weft_dir.join("entry-client.js");
  std::fs::write(&client, client_entry(app_entry, dev))
    .with_context(|| format!("failed to write {}", client.display()))?;

  let ssr = weft_dir.join("entry-ssr.js");
  std::fs::write(&ssr, ssr_entry(app_entry))
    .with_context(|| format!("failed to write {}", ssr.display()))?;

  Ok(EntryFiles { client, ssr })
}

/// Writes both entries and reports Ready. Entries only change with the
/// config, so this source emits exactly once per run.
pub async fn spawn(
  weft_dir: &Path,
  app_entry: &str,
  dev: bool,
  events: mpsc::Sender<SourceEvent>,
) -> Result<EntryFiles> {
  let files = write_entries(weft_dir, app_entry, dev)?;
  let _ = events.send(SourceEvent::new(SourceId::Entry, BuildEvent::Ready)).await;
  Ok(files)
}

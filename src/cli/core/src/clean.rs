/* src/cli/core/src/clean.rs */

// `weft clean`: removes build output and generated files, then runs
// user-defined cleanup commands.

use std::path::Path;

use anyhow::{Context, Result};

use crate::config::WeftConfig;
use crate::shell::run_command;
use crate::ui;

fn remove_dir(base_dir: &Path, relative: &str) -> Result<()> {
  let dir = base_dir.join(relative);
  if dir.exists() {
    std::fs::remove_dir_all(&dir).with_context(|| format!("failed to remove {}", dir.display()))?;
    ui::detail(&format!("removed {relative}/"));
  }
  Ok(())
}

pub fn run_clean(config: &WeftConfig, base_dir: &Path) -> Result<()> {
  ui::arrow("cleaning project");

  remove_dir(base_dir, &config.build.out_dir)?;
  remove_dir(base_dir, ".weft")?;

  for command in &config.clean.commands {
    run_command(base_dir, command, "clean command", &[])?;
  }

  ui::ok("clean complete");
  Ok(())
}

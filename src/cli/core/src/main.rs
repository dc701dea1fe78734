/* src/cli/core/src/main.rs */

mod clean;
mod config;
mod data_cmd;
mod dev;
mod generate;
mod pipeline;
mod shell;
mod site;
mod ui;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use config::{find_weft_config, load_weft_config, WeftConfig};

#[derive(Parser)]
#[command(name = "weft", about = "Weft CLI")]
struct Cli {
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Start the dev server with hot reload
  Dev {
    /// Path to weft.toml (auto-detected if omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,
  },
  /// Statically render every route to the output directory
  Build {
    /// Path to weft.toml (auto-detected if omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,
  },
  /// Resolve a query against a running dev server
  Data {
    /// Query hash (8 hex chars)
    hash: String,
    /// Query params as a JSON object
    params: Option<String>,
    /// Base URL of the dev server
    #[arg(short, long)]
    url: Option<String>,
  },
  /// Remove build output and generated files
  Clean {
    /// Path to weft.toml (auto-detected if omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,
  },
}

/// Warn if `.weft/` is not covered by any gitignore rule
fn warn_weft_not_gitignored(base_dir: &std::path::Path) {
  use std::process::Command;
  let output =
    Command::new("git").args(["check-ignore", "-q", ".weft"]).current_dir(base_dir).output();
  match output {
    // exit 1 = not ignored by any gitignore rule
    Ok(o) if o.status.code() == Some(1) => {
      ui::warn(
        ".weft/ is not in .gitignore -- consider adding it to avoid tracking build artifacts",
      );
    }
    // exit 0 = ignored (good); other = not a git repo or git missing (skip)
    _ => {}
  }
}

/// Try to load weft.toml from cwd upward; returns None if not found
fn try_load_config() -> Option<WeftConfig> {
  let cwd = std::env::current_dir().ok()?;
  let path = find_weft_config(&cwd).ok()?;
  load_weft_config(&path).ok()
}

/// Resolve config path (explicit or auto-detected) and parse it
fn resolve_config(explicit: Option<PathBuf>) -> Result<(PathBuf, WeftConfig)> {
  let path = match explicit {
    Some(p) => p,
    None => {
      let cwd = std::env::current_dir().context("failed to get cwd")?;
      find_weft_config(&cwd)?
    }
  };
  let config = load_weft_config(&path)?;
  Ok((path, config))
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();

  match cli.command {
    Command::Dev { config } => {
      let (config_path, weft_config) = resolve_config(config)?;
      let base_dir = config_path.parent().unwrap_or_else(|| std::path::Path::new("."));
      warn_weft_not_gitignored(base_dir);
      dev::run_dev(&weft_config, base_dir).await?;
    }
    Command::Build { config } => {
      let (config_path, weft_config) = resolve_config(config)?;
      let base_dir = config_path.parent().unwrap_or_else(|| std::path::Path::new("."));
      warn_weft_not_gitignored(base_dir);
      generate::run_build(&weft_config, base_dir).await?;
    }
    Command::Data { hash, params, url } => {
      let cfg = try_load_config();
      let url = url.unwrap_or_else(|| {
        let port = cfg.as_ref().map_or(3000, |c| c.dev.port);
        format!("http://localhost:{port}")
      });
      data_cmd::run_data(&url, &hash, params.as_deref()).await?;
    }
    Command::Clean { config } => {
      let (config_path, weft_config) = resolve_config(config)?;
      let base_dir = config_path.parent().unwrap_or_else(|| std::path::Path::new("."));
      clean::run_clean(&weft_config, base_dir)?;
    }
  }

  Ok(())
}

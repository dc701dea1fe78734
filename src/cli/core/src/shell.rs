/* src/cli/core/src/shell.rs */

// Shell command helpers shared by the bundle source and the component
// compiler boundary.

use std::path::Path;
use std::process::Command;

use anyhow::{bail, Context, Result};

use crate::ui::{self, DIM, RESET};

/// Run a shell command, bail on failure (shows both stdout and stderr on
/// error).
pub(crate) fn run_command(
  base_dir: &Path,
  command: &str,
  label: &str,
  env_vars: &[(&str, &str)],
) -> Result<()> {
  ui::detail(&format!("{DIM}{command}{RESET}"));
  let mut cmd = Command::new("sh");
  cmd.args(["-c", command]).current_dir(base_dir);
  for (key, val) in env_vars {
    cmd.env(key, val);
  }
  let output = cmd.output().with_context(|| format!("failed to run {label}"))?;
  if !output.status.success() {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let mut msg = format!("{label} exited with status {}", output.status);
    if !stderr.is_empty() {
      msg.push('\n');
      msg.push_str(&stderr);
    }
    if !stdout.is_empty() {
      msg.push('\n');
      msg.push_str(&stdout);
    }
    bail!("{msg}");
  }
  Ok(())
}

/// Run a filter command: `input` on stdin, compiled output on stdout.
/// Used for the component compiler boundary.
pub(crate) fn run_filter(
  base_dir: &Path,
  command: &str,
  label: &str,
  input: &str,
) -> Result<String> {
  use std::io::Write;
  use std::process::Stdio;

  let mut child = Command::new("sh")
    .args(["-c", command])
    .current_dir(base_dir)
    .stdin(Stdio::piped())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .spawn()
    .with_context(|| format!("failed to start {label}"))?;

  if let Some(mut stdin) = child.stdin.take() {
    stdin.write_all(input.as_bytes()).with_context(|| format!("failed to feed {label}"))?;
  }

  let output = child.wait_with_output().with_context(|| format!("failed to run {label}"))?;
  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    bail!("{label} exited with status {}\n{stderr}", output.status);
  }
  String::from_utf8(output.stdout).with_context(|| format!("{label} produced invalid UTF-8"))
}

/* src/cli/core/src/config/types.rs */

use anyhow::{bail, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct WeftConfig {
  pub project: ProjectConfig,
  #[serde(default)]
  pub site: SiteSection,
  #[serde(default)]
  pub build: BuildSection,
  #[serde(default)]
  pub dev: DevSection,
  #[serde(default)]
  pub generate: GenerateSection,
  #[serde(default)]
  pub clean: CleanSection,
}

impl WeftConfig {
  pub fn validate(&self) -> Result<()> {
    if self.project.name.trim().is_empty() {
      bail!("project.name must not be empty");
    }
    if let Some(routes) = &self.generate.routes {
      for route in routes {
        if !route.starts_with('/') {
          bail!("generate.routes entries must start with '/' (got \"{route}\")");
        }
      }
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
  pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteSection {
  /// Page template with `%weft.*%` slots.
  #[serde(default = "default_template")]
  pub template: String,
  /// Directory of route component files.
  #[serde(default = "default_routes_dir")]
  pub routes_dir: String,
  /// Root of file-backed query data.
  #[serde(default = "default_data_dir")]
  pub data_dir: String,
  /// Application client entry imported by the generated entry file.
  #[serde(default = "default_entry")]
  pub entry: String,
}

impl Default for SiteSection {
  fn default() -> Self {
    Self {
      template: default_template(),
      routes_dir: default_routes_dir(),
      data_dir: default_data_dir(),
      entry: default_entry(),
    }
  }
}

fn default_template() -> String {
  "src/template.html".to_string()
}

fn default_routes_dir() -> String {
  "src/routes".to_string()
}

fn default_data_dir() -> String {
  "data".to_string()
}

fn default_entry() -> String {
  "src/index.js".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildSection {
  /// Static-generation output root.
  #[serde(default = "default_out_dir")]
  pub out_dir: String,
  /// External bundler command; the built-in copy bundler runs when unset.
  pub bundler_command: Option<String>,
  /// External component compiler; compiled markup passes through when unset.
  pub component_command: Option<String>,
  /// URL base under which compiled chunks are served.
  #[serde(default = "default_static_base")]
  pub static_base: String,
}

impl Default for BuildSection {
  fn default() -> Self {
    Self {
      out_dir: default_out_dir(),
      bundler_command: None,
      component_command: None,
      static_base: default_static_base(),
    }
  }
}

fn default_out_dir() -> String {
  "build".to_string()
}

fn default_static_base() -> String {
  "/static".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct DevSection {
  #[serde(default = "default_port")]
  pub port: u16,
  #[serde(default = "default_host")]
  pub host: String,
}

impl Default for DevSection {
  fn default() -> Self {
    Self { port: default_port(), host: default_host() }
  }
}

fn default_port() -> u16 {
  3000
}

fn default_host() -> String {
  "0.0.0.0".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateSection {
  /// Explicit target locations. When unset, capture-free routes are
  /// discovered from the route table.
  pub routes: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CleanSection {
  #[serde(default)]
  pub commands: Vec<String>,
}

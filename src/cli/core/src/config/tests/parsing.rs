/* src/cli/core/src/config/tests/parsing.rs */

use crate::config::{find_weft_config, load_weft_config, WeftConfig};

#[test]
fn minimal_config_uses_defaults() {
  let config: WeftConfig = toml::from_str(
    r#"
    [project]
    name = "demo"
    "#,
  )
  .expect("parse");

  assert_eq!(config.project.name, "demo");
  assert_eq!(config.site.template, "src/template.html");
  assert_eq!(config.site.routes_dir, "src/routes");
  assert_eq!(config.site.data_dir, "data");
  assert_eq!(config.build.out_dir, "build");
  assert_eq!(config.build.static_base, "/static");
  assert!(config.build.bundler_command.is_none());
  assert_eq!(config.dev.port, 3000);
  assert_eq!(config.dev.host, "0.0.0.0");
  assert!(config.generate.routes.is_none());
  assert!(config.clean.commands.is_empty());
}

#[test]
fn full_config_overrides() {
  let config: WeftConfig = toml::from_str(
    r#"
    [project]
    name = "films"

    [site]
    template = "templates/page.html"
    routes_dir = "pages"
    data_dir = "content"
    entry = "src/main.js"

    [build]
    out_dir = "dist"
    bundler_command = "npm run bundle"
    component_command = "weft-compile"
    static_base = "/assets"

    [dev]
    port = 4000
    host = "127.0.0.1"

    [generate]
    routes = ["/", "/about"]

    [clean]
    commands = ["rm -rf node_modules/.cache"]
    "#,
  )
  .expect("parse");

  assert_eq!(config.site.routes_dir, "pages");
  assert_eq!(config.build.bundler_command.as_deref(), Some("npm run bundle"));
  assert_eq!(config.build.static_base, "/assets");
  assert_eq!(config.dev.port, 4000);
  assert_eq!(config.generate.routes.as_deref(), Some(["/".to_string(), "/about".to_string()].as_slice()));
  assert_eq!(config.clean.commands.len(), 1);
}

#[test]
fn empty_project_name_fails_validation() {
  let config: WeftConfig = toml::from_str(
    r#"
    [project]
    name = "  "
    "#,
  )
  .expect("parse");
  assert!(config.validate().is_err());
}

#[test]
fn generate_routes_must_be_absolute() {
  let config: WeftConfig = toml::from_str(
    r#"
    [project]
    name = "demo"

    [generate]
    routes = ["about"]
    "#,
  )
  .expect("parse");
  assert!(config.validate().is_err());
}

#[test]
fn discovery_walks_upward() {
  let dir = tempfile::tempdir().expect("tempdir");
  let nested = dir.path().join("a/b/c");
  std::fs::create_dir_all(&nested).expect("mkdirs");
  std::fs::write(dir.path().join("weft.toml"), "[project]\nname = \"demo\"\n").expect("write");

  let found = find_weft_config(&nested).expect("find");
  assert!(found.ends_with("weft.toml"));
  let config = load_weft_config(&found).expect("load");
  assert_eq!(config.project.name, "demo");
}

#[test]
fn discovery_fails_outside_a_project() {
  let dir = tempfile::tempdir().expect("tempdir");
  assert!(find_weft_config(dir.path()).is_err());
}

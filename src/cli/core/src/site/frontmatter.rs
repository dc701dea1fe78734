/* src/cli/core/src/site/frontmatter.rs */

// `+++`-delimited TOML frontmatter at the top of a route component file.

use anyhow::{bail, Context, Result};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct Frontmatter {
  #[serde(default)]
  pub title: Option<String>,
  #[serde(default)]
  pub queries: Vec<QueryDecl>,
}

/// One declared query: `source` is the raw query text, a data-file path
/// template whose `{name}` placeholders bind route params.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryDecl {
  pub key: String,
  pub source: String,
}

/// Splits an optional frontmatter block from the component markup.
pub fn split(source: &str) -> Result<(Frontmatter, &str)> {
  let Some(rest) = source.strip_prefix("+++\n") else {
    return Ok((Frontmatter::default(), source));
  };
  let Some(end) = rest.find("\n+++") else {
    bail!("unterminated frontmatter block");
  };
  let frontmatter: Frontmatter =
    toml::from_str(&rest[..end]).context("invalid frontmatter TOML")?;
  let body = rest[end + "\n+++".len()..].trim_start_matches('\n');
  Ok((frontmatter, body))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn component_without_frontmatter_passes_through() {
    let (fm, body) = split("<h1>Hi</h1>").expect("split");
    assert!(fm.queries.is_empty());
    assert_eq!(body, "<h1>Hi</h1>");
  }

  #[test]
  fn frontmatter_declares_queries() {
    let source = "+++\ntitle = \"Film\"\n\n[[queries]]\nkey = \"film\"\nsource = \"films/{slug}.json\"\n+++\n<h1><!--weft:title--></h1>";
    let (fm, body) = split(source).expect("split");
    assert_eq!(fm.title.as_deref(), Some("Film"));
    assert_eq!(fm.queries.len(), 1);
    assert_eq!(fm.queries[0].key, "film");
    assert_eq!(fm.queries[0].source, "films/{slug}.json");
    assert_eq!(body, "<h1><!--weft:title--></h1>");
  }

  #[test]
  fn unterminated_block_is_an_error() {
    assert!(split("+++\ntitle = \"x\"\n").is_err());
  }

  #[test]
  fn invalid_toml_is_an_error() {
    assert!(split("+++\nnot toml ===\n+++\n<p></p>").is_err());
  }
}

/* src/cli/core/src/data_cmd.rs */

// `weft data`: resolve a query against a running dev server through the
// WebStaticClient, printing the JSON result. Useful for checking what a
// page will receive without rendering it.

use std::sync::Arc;

use anyhow::{Context, Result};

use weft_server::query::client::{BoxFuture, Fetcher};
use weft_server::{StaticClient, WebStaticClient, WeftError};

use crate::dev::server::WEFT_PREFIX;
use crate::ui;

struct HttpFetcher {
  client: reqwest::Client,
  base: String,
}

impl Fetcher for HttpFetcher {
  fn fetch(&self, url: &str) -> BoxFuture<Result<serde_json::Value, WeftError>> {
    let request = self.client.get(format!("{}{url}", self.base));
    Box::pin(async move {
      let response =
        request.send().await.map_err(|e| WeftError::data_fetch(e.to_string()))?;
      let status = response.status();
      if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(WeftError::new("DATA_FETCH", body, status.as_u16()));
      }
      response.json().await.map_err(|e| WeftError::data_fetch(e.to_string()))
    })
  }
}

pub async fn run_data(base_url: &str, hash: &str, params: Option<&str>) -> Result<()> {
  let params: serde_json::Value = match params {
    Some(text) => serde_json::from_str(text).context("params must be a JSON value")?,
    None => serde_json::Value::Object(serde_json::Map::new()),
  };

  let base = base_url.trim_end_matches('/').to_string();
  ui::arrow(&format!("{base}{WEFT_PREFIX}/data/{hash}/..."));

  let fetcher = Arc::new(HttpFetcher { client: reqwest::Client::new(), base });
  let client = WebStaticClient::new(fetcher, WEFT_PREFIX);

  let result = client
    .query(hash, params)
    .await
    .map_err(|e| anyhow::anyhow!("{e}"))?;

  println!("{}", serde_json::to_string_pretty(&result)?);
  Ok(())
}

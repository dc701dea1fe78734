/* src/server/core/src/errors.rs */

use std::fmt;

/// Error type shared by the query layer, router and renderer.
/// `Clone` is required so a shared in-flight future can hand the same
/// failure to every caller waiting on it.
#[derive(Debug, Clone)]
pub struct WeftError {
  code: String,
  message: String,
  status: u16,
}

fn default_status(code: &str) -> u16 {
  match code {
    "VALIDATION_ERROR" => 400,
    "NOT_FOUND" => 404,
    "QUERY_NOT_REGISTERED" => 404,
    "DATA_FETCH" => 500,
    "RENDER_ERROR" => 500,
    "INTERNAL_ERROR" => 500,
    _ => 500,
  }
}

impl WeftError {
  pub fn new(code: impl Into<String>, message: impl Into<String>, status: u16) -> Self {
    Self { code: code.into(), message: message.into(), status }
  }

  pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
    let code = code.into();
    let status = default_status(&code);
    Self { code, message: message.into(), status }
  }

  pub fn validation(msg: impl Into<String>) -> Self {
    Self::with_code("VALIDATION_ERROR", msg)
  }

  pub fn not_found(msg: impl Into<String>) -> Self {
    Self::with_code("NOT_FOUND", msg)
  }

  pub fn query_not_registered(hash: &str) -> Self {
    Self::with_code("QUERY_NOT_REGISTERED", format!("query with hash {hash} was not registered"))
  }

  pub fn data_fetch(msg: impl Into<String>) -> Self {
    Self::with_code("DATA_FETCH", msg)
  }

  pub fn render(msg: impl Into<String>) -> Self {
    Self::with_code("RENDER_ERROR", msg)
  }

  pub fn internal(msg: impl Into<String>) -> Self {
    Self::with_code("INTERNAL_ERROR", msg)
  }

  pub fn code(&self) -> &str {
    &self.code
  }

  pub fn message(&self) -> &str {
    &self.message
  }

  pub fn status(&self) -> u16 {
    self.status
  }
}

impl fmt::Display for WeftError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}", self.code, self.message)
  }
}

impl std::error::Error for WeftError {}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_status_known_codes() {
    assert_eq!(default_status("VALIDATION_ERROR"), 400);
    assert_eq!(default_status("NOT_FOUND"), 404);
    assert_eq!(default_status("QUERY_NOT_REGISTERED"), 404);
    assert_eq!(default_status("DATA_FETCH"), 500);
    assert_eq!(default_status("RENDER_ERROR"), 500);
  }

  #[test]
  fn default_status_unknown_code() {
    assert_eq!(default_status("CUSTOM"), 500);
  }

  #[test]
  fn convenience_constructors() {
    assert_eq!(WeftError::validation("x").status(), 400);
    assert_eq!(WeftError::not_found("x").status(), 404);
    assert_eq!(WeftError::query_not_registered("ab").status(), 404);
    assert_eq!(WeftError::data_fetch("x").status(), 500);
    assert_eq!(WeftError::render("x").status(), 500);
    assert_eq!(WeftError::internal("x").status(), 500);
  }

  #[test]
  fn display_format() {
    let err = WeftError::not_found("missing");
    assert_eq!(err.to_string(), "NOT_FOUND: missing");
  }

  #[test]
  fn query_not_registered_names_hash() {
    let err = WeftError::query_not_registered("4f9f2cab");
    assert!(err.message().contains("4f9f2cab"));
  }
}

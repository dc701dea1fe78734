/* src/server/core/src/query/replay.rs */

use std::sync::Mutex;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::errors::WeftError;

/// One resolved query request, recorded the first time a
/// `(hash, params)` pair settles during a render pass.
#[derive(Debug, Clone)]
pub struct FetchedRequest {
  pub hash: String,
  pub params: serde_json::Value,
  pub result: serde_json::Value,
}

/// Append-only record of resolved requests. Subscribers receive the full
/// history first, then live entries until the log closes. Static
/// generation consumes one subscription per run to extract data artifacts.
pub struct ReplayLog {
  inner: Mutex<LogInner>,
}

struct LogInner {
  history: Vec<FetchedRequest>,
  senders: Vec<UnboundedSender<FetchedRequest>>,
  closed: bool,
}

impl ReplayLog {
  pub fn new() -> Self {
    Self { inner: Mutex::new(LogInner { history: Vec::new(), senders: Vec::new(), closed: false }) }
  }

  /// Publishes after close are dropped; the log is already sealed.
  pub fn publish(&self, request: FetchedRequest) {
    let Ok(mut inner) = self.inner.lock() else { return };
    if inner.closed {
      return;
    }
    inner.senders.retain(|sender| sender.send(request.clone()).is_ok());
    inner.history.push(request);
  }

  pub fn subscribe(&self) -> Result<UnboundedReceiver<FetchedRequest>, WeftError> {
    let mut inner = self.inner.lock().map_err(|_| WeftError::internal("replay log poisoned"))?;
    if inner.closed {
      return Err(WeftError::internal("replay log was already closed"));
    }
    let (sender, receiver) = unbounded_channel();
    for request in &inner.history {
      let _ = sender.send(request.clone());
    }
    inner.senders.push(sender);
    Ok(receiver)
  }

  /// Seals the log and ends every subscriber stream.
  pub fn close(&self) -> Result<(), WeftError> {
    let mut inner = self.inner.lock().map_err(|_| WeftError::internal("replay log poisoned"))?;
    if inner.closed {
      return Err(WeftError::internal("replay log was already closed"));
    }
    inner.closed = true;
    inner.senders.clear();
    Ok(())
  }
}

impl Default for ReplayLog {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn request(hash: &str) -> FetchedRequest {
    FetchedRequest { hash: hash.to_string(), params: json!({}), result: json!({"ok": true}) }
  }

  #[tokio::test]
  async fn subscriber_replays_history_then_streams() {
    let log = ReplayLog::new();
    log.publish(request("aa"));

    let mut rx = log.subscribe().expect("subscribe");
    log.publish(request("bb"));
    log.close().expect("close");

    assert_eq!(rx.recv().await.map(|r| r.hash), Some("aa".to_string()));
    assert_eq!(rx.recv().await.map(|r| r.hash), Some("bb".to_string()));
    assert!(rx.recv().await.is_none());
  }

  #[tokio::test]
  async fn two_subscribers_see_the_same_entries() {
    let log = ReplayLog::new();
    let mut first = log.subscribe().expect("first");
    let mut second = log.subscribe().expect("second");
    log.publish(request("aa"));
    log.close().expect("close");

    assert_eq!(first.recv().await.map(|r| r.hash), Some("aa".to_string()));
    assert_eq!(second.recv().await.map(|r| r.hash), Some("aa".to_string()));
  }

  #[test]
  fn close_twice_errors() {
    let log = ReplayLog::new();
    log.close().expect("first close");
    assert!(log.close().is_err());
    assert!(log.subscribe().is_err());
  }
}

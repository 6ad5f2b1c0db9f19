//! Clients for the remote record, blob, and identity services.

pub mod auth;
pub mod client;
pub mod storage;
pub mod types;

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;

/// Failure taxonomy for remote operations.
///
/// `Unreachable` marks network-level failures; the composition layer reacts
/// by degrading to the offline view. Everything else is surfaced to the
/// caller as a message.
#[derive(Debug, Error)]
pub enum RemoteError {
  #[error("service unreachable: {0}")]
  Unreachable(String),
  #[error("{0}")]
  Validation(String),
  #[error("category still has songs assigned to it")]
  CategoryInUse,
  #[error("not authorized")]
  Unauthorized,
  #[error("request failed: {0}")]
  Api(String),
}

impl From<reqwest::Error> for RemoteError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_connect() || e.is_timeout() {
      RemoteError::Unreachable(e.to_string())
    } else {
      RemoteError::Api(e.to_string())
    }
  }
}

/// Push-driven network reachability state.
///
/// The remote clients report each request outcome here; interested parties
/// subscribe and observe transitions over a watch channel. Nobody polls.
#[derive(Clone)]
pub struct Reachability {
  tx: Arc<watch::Sender<bool>>,
}

impl Reachability {
  pub fn new(initially_online: bool) -> Self {
    let (tx, _rx) = watch::channel(initially_online);
    Self { tx: Arc::new(tx) }
  }

  pub fn subscribe(&self) -> watch::Receiver<bool> {
    self.tx.subscribe()
  }

  pub fn is_online(&self) -> bool {
    *self.tx.borrow()
  }

  /// Publish a transition. Repeated reports of the same state are dropped so
  /// subscribers only wake on actual changes.
  pub fn set_online(&self, online: bool) {
    self.tx.send_if_modified(|state| {
      if *state != online {
        *state = online;
        true
      } else {
        false
      }
    });
  }
}

/// Parse a service base URL, normalizing the trailing slash so joins keep
/// the full path.
pub(crate) fn parse_base(url: &str) -> Result<url::Url, RemoteError> {
  let normalized = if url.ends_with('/') {
    url.to_string()
  } else {
    format!("{}/", url)
  };
  url::Url::parse(&normalized)
    .map_err(|e| RemoteError::Validation(format!("invalid service url {}: {}", url, e)))
}

/// Send a request, report the outcome to the reachability tracker, and turn
/// non-success statuses into errors.
pub(crate) async fn send_checked(
  net: &Reachability,
  req: reqwest::RequestBuilder,
) -> Result<reqwest::Response, RemoteError> {
  match req.send().await {
    Ok(resp) => {
      net.set_online(true);
      let status = resp.status();
      if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(RemoteError::Unauthorized);
      }
      if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(RemoteError::Api(format!("{}: {}", status, body.trim())));
      }
      Ok(resp)
    }
    Err(e) => {
      let err = RemoteError::from(e);
      if matches!(err, RemoteError::Unreachable(_)) {
        net.set_online(false);
      }
      Err(err)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_reachability_transitions() {
    let net = Reachability::new(true);
    let mut rx = net.subscribe();
    assert!(net.is_online());

    net.set_online(false);
    assert!(!net.is_online());
    assert!(rx.has_changed().unwrap());
    assert!(!*rx.borrow_and_update());

    // Same state again does not wake subscribers.
    net.set_online(false);
    assert!(!rx.has_changed().unwrap());

    net.set_online(true);
    assert!(*rx.borrow_and_update());
  }
}

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// An authenticated user reference. The access token, when present, is used as
/// the bearer for remote calls; acquiring it is the auth collaborator's job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Identity {
  pub user_id: String,
  pub access_token: Option<String>,
}

/// Gate for every remote-touching operation. While no identity is present the
/// application operates purely on the local cache.
pub struct SessionGate {
  identity: Mutex<Option<Identity>>,
}

impl SessionGate {
  pub fn new() -> Self {
    Self { identity: Mutex::new(None) }
  }

  pub fn with_identity(identity: Identity) -> Self {
    Self { identity: Mutex::new(Some(identity)) }
  }

  pub fn sign_in(&self, identity: Identity) {
    if let Ok(mut guard) = self.identity.lock() {
      *guard = Some(identity);
    }
  }

  pub fn sign_out(&self) {
    if let Ok(mut guard) = self.identity.lock() {
      *guard = None;
    }
  }

  pub fn current(&self) -> Option<Identity> {
    self.identity.lock().map(|guard| guard.clone()).unwrap_or(None)
  }

  pub fn is_signed_in(&self) -> bool {
    self.current().is_some()
  }
}

impl Default for SessionGate {
  fn default() -> Self {
    Self::new()
  }
}

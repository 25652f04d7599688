use std::env;

use crate::session::Identity;

/// Environment-driven runtime configuration. Every field is optional; the
/// application runs cache-only when the remote credentials are absent.
#[derive(Debug, Clone, Default)]
pub struct Config {
  pub supabase_url: Option<String>,
  pub supabase_anon_key: Option<String>,
  pub access_token: Option<String>,
  pub user_id: Option<String>,
  pub gemini_api_key: Option<String>,
}

impl Config {
  pub fn from_env() -> Self {
    Self {
      supabase_url: env_value("SUPABASE_URL"),
      supabase_anon_key: env_value("SUPABASE_ANON_KEY"),
      access_token: env_value("SUPABASE_ACCESS_TOKEN"),
      user_id: env_value("CASHBOOK_USER_ID"),
      gemini_api_key: env_value("GEMINI_API_KEY"),
    }
  }

  pub fn identity(&self) -> Option<Identity> {
    self.user_id.as_ref().map(|user_id| Identity {
      user_id: user_id.clone(),
      access_token: self.access_token.clone(),
    })
  }

  pub fn remote_credentials(&self) -> Option<(String, String)> {
    match (&self.supabase_url, &self.supabase_anon_key) {
      (Some(url), Some(key)) => Some((url.clone(), key.clone())),
      _ => None,
    }
  }
}

fn env_value(name: &str) -> Option<String> {
  env::var(name)
    .ok()
    .map(|value| value.trim().to_string())
    .filter(|value| !value.is_empty())
}

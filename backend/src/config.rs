//! Connection settings for the managed backend.
//!
//! Two values are required (project URL and public anon key); a session
//! access token and a request timeout are optional. Values come from the
//! process environment, with a `.env` file in the working directory read
//! first when present.

use std::time::Duration;

use tracing::{debug, info};
use url::Url;

use crate::error::{BackendError, BackendResult};

pub const URL_VAR: &str = "SUPABASE_URL";
pub const ANON_KEY_VAR: &str = "SUPABASE_ANON_KEY";
pub const ACCESS_TOKEN_VAR: &str = "SUPABASE_ACCESS_TOKEN";
pub const TIMEOUT_VAR: &str = "CHARGE_SLOT_TIMEOUT_SECS";

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Project base URL, e.g. `https://abcd.supabase.co`
    pub url: Url,
    /// Public API key sent with every request
    pub anon_key: String,
    /// Session token of the signed-in user, if one was obtained out of band
    pub access_token: Option<String>,
    pub request_timeout: Duration,
}

impl BackendConfig {
    pub fn new(url: &str, anon_key: &str) -> BackendResult<Self> {
        let url = Url::parse(url.trim())
            .map_err(|e| BackendError::Configuration(format!("Invalid {}: {}", URL_VAR, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(BackendError::Configuration(format!(
                "{} must use http or https, got {}",
                URL_VAR,
                url.scheme()
            )));
        }

        let anon_key = anon_key.trim();
        if anon_key.is_empty() {
            return Err(BackendError::Configuration(format!("{} is empty", ANON_KEY_VAR)));
        }

        Ok(Self {
            url,
            anon_key: anon_key.to_string(),
            access_token: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.access_token = if token.trim().is_empty() { None } else { Some(token) };
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Load settings from the environment (and `.env`, if present)
    pub fn from_env() -> BackendResult<Self> {
        match dotenvy::dotenv() {
            Ok(path) => debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(BackendError::Configuration(format!("Failed to read .env: {}", e))),
        }

        let url = required_var(URL_VAR)?;
        let anon_key = required_var(ANON_KEY_VAR)?;
        let mut config = Self::new(&url, &anon_key)?;

        if let Ok(token) = std::env::var(ACCESS_TOKEN_VAR) {
            config = config.with_access_token(token);
        }

        if let Ok(raw) = std::env::var(TIMEOUT_VAR) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                BackendError::Configuration(format!("{} must be a whole number of seconds", TIMEOUT_VAR))
            })?;
            config = config.with_request_timeout(Duration::from_secs(secs));
        }

        info!(
            "Backend configured for {} (session token: {})",
            config.url,
            if config.access_token.is_some() { "present" } else { "absent" }
        );
        Ok(config)
    }

    /// Token used for the `Authorization` header
    pub fn bearer_token(&self) -> &str {
        self.access_token.as_deref().unwrap_or(&self.anon_key)
    }

    pub fn rest_url(&self, table: &str) -> BackendResult<Url> {
        self.join(&format!("rest/v1/{}", table))
    }

    pub fn auth_url(&self, path: &str) -> BackendResult<Url> {
        self.join(&format!("auth/v1/{}", path))
    }

    /// Realtime socket endpoint (`ws`/`wss` mirror of the project URL)
    pub fn realtime_url(&self) -> BackendResult<Url> {
        let mut url = self.join("realtime/v1/websocket")?;
        let scheme = if self.url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|_| BackendError::Configuration(format!("Cannot derive {} realtime URL", scheme)))?;
        url.query_pairs_mut()
            .append_pair("apikey", &self.anon_key)
            .append_pair("vsn", "1.0.0");
        Ok(url)
    }

    fn join(&self, path: &str) -> BackendResult<Url> {
        let mut base = self.url.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        base.join(path)
            .map_err(|e| BackendError::Configuration(format!("Invalid endpoint {}: {}", path, e)))
    }
}

fn required_var(name: &str) -> BackendResult<String> {
    std::env::var(name).map_err(|_| BackendError::Configuration(format!("{} is not set", name)))
}

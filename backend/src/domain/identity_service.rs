use std::sync::Arc;

use shared::User;
use tracing::{info, warn};

use crate::error::BackendResult;
use crate::storage::traits::IdentityProvider;

/// Result of a login attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// The prompt was dismissed or left blank; nothing was sent
    Skipped,
    /// The provider accepted the request to email a sign-in link
    LinkSent { email: String },
}

/// Tracks who is signed in and starts the one-time link login
#[derive(Clone)]
pub struct IdentityService {
    provider: Arc<dyn IdentityProvider>,
}

impl IdentityService {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self { provider }
    }

    /// Resolve the signed-in user once at load; provider errors mean signed out
    pub async fn resolve_current_user(&self) -> Option<User> {
        match self.provider.current_user().await {
            Ok(Some(user)) => {
                info!("Signed in as {}", user.display_name());
                Some(user)
            }
            Ok(None) => {
                info!("No signed-in user");
                None
            }
            Err(e) => {
                warn!("Failed to resolve current user, continuing signed out: {}", e);
                None
            }
        }
    }

    /// Request a sign-in link for whatever the login prompt returned
    pub async fn login(&self, email_input: Option<&str>) -> BackendResult<LoginOutcome> {
        let email = match email_input.map(str::trim) {
            Some(email) if !email.is_empty() => email,
            _ => {
                info!("Login prompt dismissed");
                return Ok(LoginOutcome::Skipped);
            }
        };

        self.provider.send_login_link(email).await?;
        info!("Sign-in link sent to {}", email);

        Ok(LoginOutcome::LinkSent {
            email: email.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use crate::storage::memory::InMemoryBackend;

    #[tokio::test]
    async fn test_resolve_current_user() {
        let backend = Arc::new(InMemoryBackend::new());
        let service = IdentityService::new(backend.clone());
        assert_eq!(service.resolve_current_user().await, None);

        let user = User {
            id: "u1".to_string(),
            email: Some("driver@example.com".to_string()),
        };
        backend.set_current_user(Some(user.clone())).await;
        assert_eq!(service.resolve_current_user().await, Some(user));
    }

    #[tokio::test]
    async fn test_login_skips_blank_input() {
        let backend = Arc::new(InMemoryBackend::new());
        let service = IdentityService::new(backend.clone());

        assert_eq!(service.login(None).await.unwrap(), LoginOutcome::Skipped);
        assert_eq!(service.login(Some("   ")).await.unwrap(), LoginOutcome::Skipped);
        assert!(backend.login_links().await.is_empty());
    }

    #[tokio::test]
    async fn test_login_sends_trimmed_email() {
        let backend = Arc::new(InMemoryBackend::new());
        let service = IdentityService::new(backend.clone());

        let outcome = service.login(Some(" driver@example.com ")).await.unwrap();
        assert_eq!(
            outcome,
            LoginOutcome::LinkSent {
                email: "driver@example.com".to_string()
            }
        );
        assert_eq!(backend.login_links().await, vec!["driver@example.com".to_string()]);
    }

    #[tokio::test]
    async fn test_login_failure_is_reported() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.fail_login("rate limited").await;
        let service = IdentityService::new(backend.clone());

        let result = service.login(Some("driver@example.com")).await;
        assert!(matches!(result, Err(BackendError::Api { status: 429, .. })));
    }
}

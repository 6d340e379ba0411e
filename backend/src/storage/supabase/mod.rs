//! Supabase-style managed backend adapter.
//!
//! `SupabaseClient` talks to the auth (GoTrue) and table (PostgREST) HTTP
//! APIs; `SupabaseRealtime` holds the realtime change feed socket.

mod realtime;

pub use realtime::{PhoenixMessage, SupabaseRealtime};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use shared::{NewReservation, Reservation, ReservationId, User};
use tracing::{debug, error, info, warn};

use crate::config::BackendConfig;
use crate::error::{BackendError, BackendResult};
use crate::storage::traits::{IdentityProvider, ReservationStore, RESERVATIONS_TABLE};

#[derive(Debug, Serialize)]
struct OtpRequest<'a> {
    email: &'a str,
    create_user: bool,
}

/// HTTP client for the auth and table APIs
#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    config: BackendConfig,
}

impl SupabaseClient {
    pub fn new(config: BackendConfig) -> BackendResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(BackendError::Http)?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Add the api key and bearer headers every endpoint expects
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.config.anon_key)
            .bearer_auth(self.config.bearer_token())
    }

    async fn ensure_success(response: Response, action: &str) -> BackendResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response.text().await.unwrap_or_default();
        error!("{} failed: {} - {}", action, status, error_text);
        Err(BackendError::api(status.as_u16(), error_text))
    }
}

#[async_trait]
impl IdentityProvider for SupabaseClient {
    async fn current_user(&self) -> BackendResult<Option<User>> {
        if self.config.access_token.is_none() {
            debug!("No session token configured, treating as signed out");
            return Ok(None);
        }

        let url = self.config.auth_url("user")?;
        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(BackendError::Http)?;

        if matches!(response.status(), StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            warn!("Session token rejected ({}), treating as signed out", response.status());
            return Ok(None);
        }

        let response = Self::ensure_success(response, "Get user").await?;
        let user: User = response
            .json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))?;

        info!("Resolved user {}", user.id);
        Ok(Some(user))
    }

    async fn send_login_link(&self, email: &str) -> BackendResult<()> {
        let url = self.config.auth_url("otp")?;
        let body = OtpRequest {
            email,
            create_user: true,
        };

        debug!("Requesting one-time login link");
        let response = self
            .authorize(self.client.post(url).json(&body))
            .send()
            .await
            .map_err(BackendError::Http)?;

        Self::ensure_success(response, "Send login link").await?;
        info!("Login link requested for {}", email);
        Ok(())
    }
}

#[async_trait]
impl ReservationStore for SupabaseClient {
    async fn select_all(&self) -> BackendResult<Vec<Reservation>> {
        let url = self.config.rest_url(RESERVATIONS_TABLE)?;
        let response = self
            .authorize(self.client.get(url).query(&[("select", "*")]))
            .send()
            .await
            .map_err(BackendError::Http)?;

        let response = Self::ensure_success(response, "Select reservations").await?;
        let rows: Vec<Reservation> = response
            .json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))?;

        debug!("Fetched {} reservations", rows.len());
        Ok(rows)
    }

    async fn insert(&self, reservation: &NewReservation) -> BackendResult<Reservation> {
        let url = self.config.rest_url(RESERVATIONS_TABLE)?;
        let response = self
            .authorize(
                self.client
                    .post(url)
                    .header("Prefer", "return=representation")
                    .json(reservation),
            )
            .send()
            .await
            .map_err(BackendError::Http)?;

        let response = Self::ensure_success(response, "Insert reservation").await?;
        let mut rows: Vec<Reservation> = response
            .json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))?;

        if rows.is_empty() {
            return Err(BackendError::Parse("Insert returned no rows".to_string()));
        }
        let row = rows.swap_remove(0);
        info!("Inserted reservation {} ({} {})", row.id, row.date, row.time_slot);
        Ok(row)
    }

    async fn delete_by_id(&self, id: &ReservationId) -> BackendResult<()> {
        let url = self.config.rest_url(RESERVATIONS_TABLE)?;
        let filter = format!("eq.{}", id);
        let response = self
            .authorize(self.client.delete(url).query(&[("id", filter.as_str())]))
            .send()
            .await
            .map_err(BackendError::Http)?;

        Self::ensure_success(response, "Delete reservation").await?;
        info!("Deleted reservation {}", id);
        Ok(())
    }
}

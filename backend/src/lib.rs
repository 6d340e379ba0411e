//! # Charge Slot Backend
//!
//! Client-side backend layer for the charge slot calendar. The managed
//! service (auth, reservations table, realtime feed) is reached through the
//! traits in [`storage::traits`]; the domain services on top of them are
//! what the UI talks to.
//!
//! - `domain` - identity, reservation view-model, calendar grid
//! - `storage` - contracts plus Supabase and in-memory implementations
//! - `config` - connection settings

use std::sync::Arc;

pub mod config;
pub mod domain;
pub mod error;
pub mod storage;

pub use config::BackendConfig;
pub use error::{BackendError, BackendResult};

use storage::{ChangeFeed, IdentityProvider, InMemoryBackend, ReservationStore, SupabaseClient, SupabaseRealtime};

/// The managed-backend clients the services are built from
#[derive(Clone)]
pub struct BackendClients {
    pub identity: Arc<dyn IdentityProvider>,
    pub store: Arc<dyn ReservationStore>,
    pub feed: Arc<dyn ChangeFeed>,
}

impl BackendClients {
    /// Clients for a Supabase project
    pub fn supabase(config: BackendConfig) -> BackendResult<Self> {
        let client = Arc::new(SupabaseClient::new(config.clone())?);
        let realtime = Arc::new(SupabaseRealtime::new(config));

        Ok(Self {
            identity: client.clone(),
            store: client,
            feed: realtime,
        })
    }

    /// All three roles served by one in-memory backend
    pub fn in_memory(backend: Arc<InMemoryBackend>) -> Self {
        Self {
            identity: backend.clone(),
            store: backend.clone(),
            feed: backend,
        }
    }
}

/// Main backend struct that orchestrates all services
#[derive(Clone)]
pub struct Backend {
    pub identity_service: domain::IdentityService,
    pub reservation_service: domain::ReservationService,
    pub calendar_service: domain::CalendarService,
}

impl Backend {
    /// Create a backend from explicitly constructed clients
    pub fn new(clients: BackendClients) -> Self {
        Self {
            identity_service: domain::IdentityService::new(clients.identity),
            reservation_service: domain::ReservationService::new(clients.store, clients.feed),
            calendar_service: domain::CalendarService::new(),
        }
    }

    /// Connect to the Supabase project described by `config`
    pub fn connect(config: BackendConfig) -> BackendResult<Self> {
        Ok(Self::new(BackendClients::supabase(config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use shared::{CellState, TimeSlot, User};

    #[tokio::test]
    async fn test_backend_wires_services_to_one_store() {
        let memory = Arc::new(InMemoryBackend::new());
        let user = User {
            id: "u1".to_string(),
            email: Some("driver@example.com".to_string()),
        };
        memory.set_current_user(Some(user.clone())).await;
        let backend = Backend::new(BackendClients::in_memory(memory.clone()));

        let current = backend.identity_service.resolve_current_user().await;
        assert_eq!(current.as_ref(), Some(&user));

        let today = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        backend
            .reservation_service
            .reserve(current.as_ref(), today, TimeSlot::Evening19)
            .await
            .unwrap();
        backend.reservation_service.load_all().await;

        let window = backend.calendar_service.day_window(today);
        let grid = backend.calendar_service.generate_grid(
            &window,
            &backend.reservation_service.reservations(),
            current.as_ref(),
        );
        assert_eq!(grid.cell(today, TimeSlot::Evening19).unwrap().state, CellState::Mine);
    }

    #[test]
    fn test_supabase_clients_from_config() {
        let config = BackendConfig::new("https://demo.supabase.co", "anon").unwrap();
        assert!(Backend::connect(config).is_ok());
    }
}

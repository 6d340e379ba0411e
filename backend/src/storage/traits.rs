//! # Storage Traits
//!
//! Interfaces of the managed backend consumed by the domain layer. The
//! identity provider, the reservation table and the change feed all live in
//! the remote service; these traits describe the contract only, so the domain
//! services can run against the real service or an in-memory fake.

use async_trait::async_trait;
use shared::{ChangeEvent, NewReservation, Reservation, ReservationId, User};
use tokio::sync::{mpsc, oneshot};

use crate::error::BackendResult;

/// Table holding one row per reservation
pub const RESERVATIONS_TABLE: &str = "reservations";

/// Authentication provider (one-time link login, current session lookup)
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The currently authenticated user, or `None` when signed out
    async fn current_user(&self) -> BackendResult<Option<User>>;

    /// Ask the provider to email a one-time sign-in link
    async fn send_login_link(&self, email: &str) -> BackendResult<()>;
}

/// The `reservations` table
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Every reservation row, unfiltered
    async fn select_all(&self) -> BackendResult<Vec<Reservation>>;

    /// Insert a row and return it with its store-assigned id
    async fn insert(&self, reservation: &NewReservation) -> BackendResult<Reservation>;

    /// Delete a row by id
    async fn delete_by_id(&self, id: &ReservationId) -> BackendResult<()>;
}

/// Push feed of row-level changes
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Open a named channel listening to every insert/update/delete on `table`
    async fn subscribe(&self, channel: &str, table: &str) -> BackendResult<ChangeSubscription>;
}

/// Live subscription to the change feed.
///
/// Events arrive on `events`. The channel is released when the subscription
/// is dropped or `release` is called.
#[derive(Debug)]
pub struct ChangeSubscription {
    pub channel: String,
    events: mpsc::Receiver<ChangeEvent>,
    release: Option<oneshot::Sender<()>>,
}

impl ChangeSubscription {
    /// `release` fires when the subscriber lets go of the channel; feeds that
    /// need to tell the server (or clean up local state) listen on the other end.
    pub fn new(
        channel: impl Into<String>,
        events: mpsc::Receiver<ChangeEvent>,
        release: oneshot::Sender<()>,
    ) -> Self {
        Self {
            channel: channel.into(),
            events,
            release: Some(release),
        }
    }

    /// Next change event, or `None` once the feed has closed
    pub async fn next_event(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    pub fn release(mut self) {
        self.signal_release();
    }

    fn signal_release(&mut self) {
        if let Some(release) = self.release.take() {
            // Receiver gone means the feed already shut down.
            let _ = release.send(());
        }
        self.events.close();
    }
}

impl Drop for ChangeSubscription {
    fn drop(&mut self) {
        self.signal_release();
    }
}

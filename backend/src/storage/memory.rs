//! In-memory managed backend for tests and offline runs.
//!
//! Behaves like the remote service seen through its contract: rows get
//! sequential integer ids, inserts and deletes push a change event to every
//! open subscription, and the signed-in user is whatever was set last. Every
//! call is recorded so tests can assert on what the domain layer issued.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use shared::{ChangeEvent, ChangeKind, NewReservation, Reservation, ReservationId, User};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, warn};

use crate::error::{BackendError, BackendResult};
use crate::storage::traits::{
    ChangeFeed, ChangeSubscription, IdentityProvider, ReservationStore, RESERVATIONS_TABLE,
};

const SUBSCRIPTION_BUFFER: usize = 64;

/// Scripted outcome for the next `select_all` call
#[derive(Debug, Clone)]
pub enum ScriptedSelect {
    Rows(Vec<Reservation>),
    Fail(String),
}

#[derive(Debug, Default)]
struct MemoryState {
    current_user: Option<User>,
    rows: Vec<Reservation>,
    next_id: i64,
    scripted_selects: VecDeque<ScriptedSelect>,
    fail_next_insert: Option<String>,
    fail_next_delete: Option<String>,
    fail_login: Option<String>,
    select_calls: usize,
    inserts: Vec<NewReservation>,
    deletes: Vec<ReservationId>,
    login_links: Vec<String>,
    subscribers: Vec<Subscriber>,
}

#[derive(Debug)]
struct Subscriber {
    channel: String,
    table: String,
    events: mpsc::Sender<ChangeEvent>,
}

impl MemoryState {
    fn broadcast(&mut self, event: ChangeEvent) {
        self.subscribers.retain(|s| !s.events.is_closed());
        for subscriber in self.subscribers.iter().filter(|s| s.table == event.table) {
            if let Err(e) = subscriber.events.try_send(event.clone()) {
                warn!("Dropping change event for channel '{}': {}", subscriber.channel, e);
            }
        }
    }
}

/// In-memory identity provider, reservation table and change feed
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_current_user(&self, user: Option<User>) {
        self.state.lock().await.current_user = user;
    }

    /// Seed rows without emitting change events; ids are kept as given
    pub async fn seed(&self, rows: Vec<Reservation>) {
        let mut state = self.state.lock().await;
        state.rows.extend(rows);
    }

    /// Rows currently stored
    pub async fn rows(&self) -> Vec<Reservation> {
        self.state.lock().await.rows.clone()
    }

    /// Queue a response for an upcoming `select_all`, ahead of the real rows
    pub async fn script_select(&self, response: ScriptedSelect) {
        self.state.lock().await.scripted_selects.push_back(response);
    }

    pub async fn fail_next_insert(&self, message: &str) {
        self.state.lock().await.fail_next_insert = Some(message.to_string());
    }

    pub async fn fail_next_delete(&self, message: &str) {
        self.state.lock().await.fail_next_delete = Some(message.to_string());
    }

    pub async fn fail_login(&self, message: &str) {
        self.state.lock().await.fail_login = Some(message.to_string());
    }

    /// Push a change event to every open subscription on `table`
    pub async fn emit(&self, table: &str, kind: ChangeKind) {
        let mut state = self.state.lock().await;
        state.broadcast(ChangeEvent {
            table: table.to_string(),
            kind,
        });
    }

    pub async fn select_calls(&self) -> usize {
        self.state.lock().await.select_calls
    }

    pub async fn inserts(&self) -> Vec<NewReservation> {
        self.state.lock().await.inserts.clone()
    }

    pub async fn deletes(&self) -> Vec<ReservationId> {
        self.state.lock().await.deletes.clone()
    }

    pub async fn login_links(&self) -> Vec<String> {
        self.state.lock().await.login_links.clone()
    }

    /// Subscriptions whose receiving side is still open
    pub async fn active_subscriptions(&self) -> usize {
        let mut state = self.state.lock().await;
        state.subscribers.retain(|s| !s.events.is_closed());
        state.subscribers.len()
    }
}

#[async_trait]
impl IdentityProvider for InMemoryBackend {
    async fn current_user(&self) -> BackendResult<Option<User>> {
        Ok(self.state.lock().await.current_user.clone())
    }

    async fn send_login_link(&self, email: &str) -> BackendResult<()> {
        let mut state = self.state.lock().await;
        state.login_links.push(email.to_string());
        match state.fail_login.take() {
            Some(message) => Err(BackendError::api(429, message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ReservationStore for InMemoryBackend {
    async fn select_all(&self) -> BackendResult<Vec<Reservation>> {
        let mut state = self.state.lock().await;
        state.select_calls += 1;

        match state.scripted_selects.pop_front() {
            Some(ScriptedSelect::Rows(rows)) => Ok(rows),
            Some(ScriptedSelect::Fail(message)) => Err(BackendError::api(503, message)),
            None => Ok(state.rows.clone()),
        }
    }

    async fn insert(&self, reservation: &NewReservation) -> BackendResult<Reservation> {
        let mut state = self.state.lock().await;
        state.inserts.push(reservation.clone());

        if let Some(message) = state.fail_next_insert.take() {
            return Err(BackendError::api(409, message));
        }

        state.next_id += 1;
        let row = Reservation {
            id: ReservationId::new(state.next_id.to_string()),
            user_id: reservation.user_id.clone(),
            date: reservation.date.clone(),
            time_slot: reservation.time_slot.clone(),
        };
        state.rows.push(row.clone());
        debug!("Inserted reservation {} ({} {})", row.id, row.date, row.time_slot);

        state.broadcast(ChangeEvent {
            table: RESERVATIONS_TABLE.to_string(),
            kind: ChangeKind::Insert,
        });
        Ok(row)
    }

    async fn delete_by_id(&self, id: &ReservationId) -> BackendResult<()> {
        let mut state = self.state.lock().await;
        state.deletes.push(id.clone());

        if let Some(message) = state.fail_next_delete.take() {
            return Err(BackendError::api(500, message));
        }

        let before = state.rows.len();
        state.rows.retain(|row| &row.id != id);
        if state.rows.len() < before {
            debug!("Deleted reservation {}", id);
            state.broadcast(ChangeEvent {
                table: RESERVATIONS_TABLE.to_string(),
                kind: ChangeKind::Delete,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ChangeFeed for InMemoryBackend {
    async fn subscribe(&self, channel: &str, table: &str) -> BackendResult<ChangeSubscription> {
        let (events_tx, events_rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        // Releasing closes the receiver, which is how this feed notices.
        let (release_tx, _release_rx) = oneshot::channel();

        let mut state = self.state.lock().await;
        state.subscribers.push(Subscriber {
            channel: channel.to_string(),
            table: table.to_string(),
            events: events_tx,
        });
        debug!("Opened in-memory channel '{}' on {}", channel, table);

        Ok(ChangeSubscription::new(channel, events_rx, release_tx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_reservation(user_id: &str, date: &str, slot: &str) -> NewReservation {
        NewReservation {
            user_id: user_id.to_string(),
            date: date.to_string(),
            time_slot: slot.to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_sequential_ids() {
        let backend = InMemoryBackend::new();

        let first = backend.insert(&new_reservation("u1", "2024-01-10", "18:00-19:00")).await.unwrap();
        let second = backend.insert(&new_reservation("u2", "2024-01-10", "19:00-20:00")).await.unwrap();

        assert_eq!(first.id.as_str(), "1");
        assert_eq!(second.id.as_str(), "2");
        assert_eq!(backend.select_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_mutations_notify_subscribers() {
        let backend = InMemoryBackend::new();
        let mut subscription = backend.subscribe("test", RESERVATIONS_TABLE).await.unwrap();

        let row = backend.insert(&new_reservation("u1", "2024-01-10", "18:00-19:00")).await.unwrap();
        backend.delete_by_id(&row.id).await.unwrap();

        assert_eq!(subscription.next_event().await.unwrap().kind, ChangeKind::Insert);
        assert_eq!(subscription.next_event().await.unwrap().kind, ChangeKind::Delete);
    }

    #[tokio::test]
    async fn test_deleting_missing_row_is_silent() {
        let backend = InMemoryBackend::new();
        let subscription = backend.subscribe("test", RESERVATIONS_TABLE).await.unwrap();

        backend.delete_by_id(&ReservationId::new("99")).await.unwrap();

        assert_eq!(backend.deletes().await, vec![ReservationId::new("99")]);
        drop(subscription);
        assert_eq!(backend.active_subscriptions().await, 0);
    }

    #[tokio::test]
    async fn test_scripted_selects_run_before_real_rows() {
        let backend = InMemoryBackend::new();
        backend.script_select(ScriptedSelect::Fail("unavailable".to_string())).await;

        assert!(backend.select_all().await.is_err());
        assert!(backend.select_all().await.unwrap().is_empty());
        assert_eq!(backend.select_calls().await, 2);
    }

    #[tokio::test]
    async fn test_released_subscription_is_pruned() {
        let backend = InMemoryBackend::new();
        let subscription = backend.subscribe("test", RESERVATIONS_TABLE).await.unwrap();
        assert_eq!(backend.active_subscriptions().await, 1);

        subscription.release();
        assert_eq!(backend.active_subscriptions().await, 0);
    }

    #[tokio::test]
    async fn test_events_are_scoped_to_table() {
        let backend = InMemoryBackend::new();
        let mut subscription = backend.subscribe("test", RESERVATIONS_TABLE).await.unwrap();

        backend.emit("profiles", ChangeKind::Update).await;
        backend.emit(RESERVATIONS_TABLE, ChangeKind::Update).await;

        let event = subscription.next_event().await.unwrap();
        assert_eq!(event.table, RESERVATIONS_TABLE);
        assert_eq!(event.kind, ChangeKind::Update);
    }
}

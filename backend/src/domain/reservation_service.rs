//! Reservation view-model.
//!
//! Holds the in-memory list of every reservation, refreshed by a full
//! re-fetch whenever the change feed reports anything on the reservations
//! table. Reserve and cancel only issue the write; the view updates when the
//! resulting change event comes back and the list is fetched again.
//!
//! The existence and ownership checks run against the local list only. They
//! are not atomic with the write, so two users reserving the same free cell at
//! the same time can both succeed and leave two rows for one cell.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::NaiveDate;
use shared::{
    format_reservation_date, CalendarCell, CellAction, NewReservation, Reservation, ReservationId,
    TimeSlot, User,
};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::BackendResult;
use crate::storage::traits::{ChangeFeed, ReservationStore, RESERVATIONS_TABLE};

/// Name of the realtime channel opened by the view-model
pub const CHANGE_CHANNEL: &str = "realtime reservations";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// Insert issued and accepted by the store
    Reserved(Reservation),
    /// The local list already has a row for this cell; nothing was sent
    AlreadyTaken,
    /// No signed-in user; the view should ask the user to log in
    NotSignedIn,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    /// Delete issued for this row
    Cancelled(ReservationId),
    /// No row for this cell owned by the user; nothing was sent
    NothingToCancel,
    /// No signed-in user; nothing was sent
    NotSignedIn,
}

/// Result of clicking a cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellOutcome {
    Reserve(ReserveOutcome),
    Cancel(CancelOutcome),
}

#[derive(Clone)]
pub struct ReservationService {
    store: Arc<dyn ReservationStore>,
    feed: Arc<dyn ChangeFeed>,
    reservations: Arc<RwLock<Vec<Reservation>>>,
}

impl ReservationService {
    pub fn new(store: Arc<dyn ReservationStore>, feed: Arc<dyn ChangeFeed>) -> Self {
        Self {
            store,
            feed,
            reservations: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Snapshot of the in-memory list, as of the last completed load
    pub fn reservations(&self) -> Vec<Reservation> {
        self.reservations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace_reservations(&self, rows: Vec<Reservation>) {
        *self
            .reservations
            .write()
            .unwrap_or_else(PoisonError::into_inner) = rows;
    }

    /// Fetch every reservation and replace the in-memory list.
    ///
    /// A failed fetch leaves an empty list behind; the error is only logged.
    pub async fn load_all(&self) -> Vec<Reservation> {
        let rows = match self.store.select_all().await {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Failed to load reservations, showing none: {}", e);
                Vec::new()
            }
        };

        debug!("Loaded {} reservations", rows.len());
        self.replace_reservations(rows.clone());
        rows
    }

    /// Open the standing subscription on the reservations table.
    ///
    /// Each event triggers exactly one `load_all`, processed in arrival
    /// order, after which `on_change` receives the new list. The returned
    /// guard must be kept alive; dropping it releases the channel.
    pub async fn subscribe_to_changes<F>(&self, on_change: F) -> BackendResult<ReservationSubscription>
    where
        F: Fn(&[Reservation]) + Send + Sync + 'static,
    {
        let mut subscription = self.feed.subscribe(CHANGE_CHANNEL, RESERVATIONS_TABLE).await?;
        info!("Subscribed to changes on '{}'", RESERVATIONS_TABLE);

        let service = self.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = subscription.next_event().await {
                debug!("Reservations changed ({:?}), reloading", event.kind);
                let rows = service.load_all().await;
                on_change(&rows);
            }
            warn!("Change feed closed; the calendar will no longer refresh");
        });

        Ok(ReservationSubscription {
            channel: CHANGE_CHANNEL.to_string(),
            task: Some(task),
        })
    }

    /// Reserve (date, slot) for `user`
    pub async fn reserve(
        &self,
        user: Option<&User>,
        date: NaiveDate,
        slot: TimeSlot,
    ) -> BackendResult<ReserveOutcome> {
        let Some(user) = user else {
            info!("Reserve attempted while signed out");
            return Ok(ReserveOutcome::NotSignedIn);
        };

        let date = format_reservation_date(date);
        let exists = self
            .reservations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|r| r.matches(&date, slot));
        if exists {
            debug!("{} {} already reserved, ignoring", date, slot);
            return Ok(ReserveOutcome::AlreadyTaken);
        }

        let request = NewReservation {
            user_id: user.id.clone(),
            date,
            time_slot: slot.label().to_string(),
        };
        let row = self.store.insert(&request).await?;
        info!("Reserved {} {} for {}", row.date, row.time_slot, user.id);

        Ok(ReserveOutcome::Reserved(row))
    }

    /// Cancel `user`'s reservation of (date, slot)
    pub async fn cancel(
        &self,
        user: Option<&User>,
        date: NaiveDate,
        slot: TimeSlot,
    ) -> BackendResult<CancelOutcome> {
        let Some(user) = user else {
            return Ok(CancelOutcome::NotSignedIn);
        };

        let date = format_reservation_date(date);
        let target = self
            .reservations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|r| r.matches(&date, slot) && r.is_owned_by(user))
            .map(|r| r.id.clone());

        let Some(id) = target else {
            debug!("No reservation of {} {} owned by {}", date, slot, user.id);
            return Ok(CancelOutcome::NothingToCancel);
        };

        self.store.delete_by_id(&id).await?;
        info!("Cancelled reservation {} ({} {})", id, date, slot);

        Ok(CancelOutcome::Cancelled(id))
    }

    /// Run the action a click on `cell` stands for
    pub async fn dispatch(&self, user: Option<&User>, cell: &CalendarCell) -> BackendResult<CellOutcome> {
        match cell.action() {
            CellAction::Reserve => self
                .reserve(user, cell.date, cell.slot)
                .await
                .map(CellOutcome::Reserve),
            CellAction::Cancel => self
                .cancel(user, cell.date, cell.slot)
                .await
                .map(CellOutcome::Cancel),
        }
    }
}

/// Guard for the standing change subscription; releases it when dropped
#[derive(Debug)]
pub struct ReservationSubscription {
    channel: String,
    task: Option<JoinHandle<()>>,
}

impl ReservationSubscription {
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Stop listening and wait until the channel has been released
    pub async fn unsubscribe(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            // Cancellation is the expected result here.
            let _ = task.await;
            info!("Unsubscribed from '{}'", self.channel);
        }
    }
}

impl Drop for ReservationSubscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

//! # Actions Module
//!
//! Bridges UI events and the backend services. Every backend call runs as a
//! task on the app's tokio runtime so the render loop never blocks; results
//! come back as `UiMessage`s and are applied at the start of the next frame.
//!
//! ## Data Flow:
//! 1. A click (or startup) spawns a task calling the backend service
//! 2. The task sends its result through the message channel and asks egui to repaint
//! 3. `process_messages()` updates app state and surfaces notices/errors
//!
//! Reserve and cancel never touch the local list; the change feed reload
//! is what makes the grid change.

use eframe::egui;
use shared::{CalendarCell, Reservation};
use tracing::{info, warn};

use charge_slot_backend::domain::{CancelOutcome, CellOutcome, LoginOutcome, ReserveOutcome};

use crate::ui::app_state::{ChargeSlotApp, UiMessage};

/// The app never receives the session from the emailed link itself
pub const SESSION_HINT: &str = "This app does not pick up the session from the link: \
after signing in, set SUPABASE_ACCESS_TOKEN to your session token and restart to reserve slots.";

impl ChargeSlotApp {
    /// Resolve the user, fetch reservations and open the change subscription
    pub fn start_initial_load(&mut self, ctx: egui::Context) {
        info!("Loading initial data");
        let backend = self.backend.clone();
        let tx = self.messages_tx.clone();

        self.runtime.spawn(async move {
            let user = backend.identity_service.resolve_current_user().await;
            backend.reservation_service.load_all().await;
            let _ = tx.send(UiMessage::Loaded { user });
            ctx.request_repaint();

            let repaint_ctx = ctx.clone();
            let subscription = backend
                .reservation_service
                .subscribe_to_changes(move |_rows: &[Reservation]| repaint_ctx.request_repaint())
                .await
                .map_err(|e| e.to_string());

            let _ = tx.send(UiMessage::Subscribed(subscription));
            ctx.request_repaint();
        });
    }

    /// Run the action for a clicked cell
    pub fn dispatch_cell(&mut self, ctx: &egui::Context, cell: CalendarCell) {
        info!("Cell clicked: {} {} ({:?})", cell.iso_date(), cell.slot, cell.state);
        let service = self.backend.reservation_service.clone();
        let user = self.current_user.clone();
        let tx = self.messages_tx.clone();
        let ctx = ctx.clone();

        self.pending_actions += 1;
        self.runtime.spawn(async move {
            let result = service
                .dispatch(user.as_ref(), &cell)
                .await
                .map_err(|e| e.to_string());
            let _ = tx.send(UiMessage::CellFinished(result));
            ctx.request_repaint();
        });
    }

    /// Submit whatever the login prompt holds
    pub fn submit_login(&mut self, ctx: &egui::Context) {
        let email_input = std::mem::take(&mut self.login_modal.email_input);
        self.login_modal.open = false;

        let identity = self.backend.identity_service.clone();
        let tx = self.messages_tx.clone();
        let ctx = ctx.clone();

        self.pending_actions += 1;
        self.runtime.spawn(async move {
            let result = identity
                .login(Some(email_input.as_str()))
                .await
                .map_err(|e| e.to_string());
            let _ = tx.send(UiMessage::LoginFinished(result));
            ctx.request_repaint();
        });
    }

    /// Apply results of finished background work
    pub fn process_messages(&mut self) {
        while let Ok(message) = self.messages_rx.try_recv() {
            match message {
                UiMessage::Loaded { user } => {
                    self.current_user = user;
                    self.loading = false;
                }
                UiMessage::Subscribed(Ok(subscription)) => {
                    self.subscription = Some(subscription);
                }
                UiMessage::Subscribed(Err(e)) => {
                    warn!("Live updates unavailable: {}", e);
                    self.error_message = Some(format!("Live updates unavailable: {}", e));
                }
                UiMessage::CellFinished(result) => {
                    self.pending_actions = self.pending_actions.saturating_sub(1);
                    self.apply_cell_outcome(result);
                }
                UiMessage::LoginFinished(result) => {
                    self.pending_actions = self.pending_actions.saturating_sub(1);
                    match result {
                        Ok(LoginOutcome::LinkSent { email }) => {
                            self.notice = Some(format!(
                                "A sign-in link has been sent to {}. Please check your inbox. {}",
                                email, SESSION_HINT
                            ));
                        }
                        Ok(LoginOutcome::Skipped) => {}
                        Err(e) => {
                            warn!("Login link request failed: {}", e);
                            self.error_message = Some(format!("Could not send sign-in link: {}", e));
                        }
                    }
                }
            }
        }
    }

    fn apply_cell_outcome(&mut self, result: Result<CellOutcome, String>) {
        match result {
            Ok(CellOutcome::Reserve(ReserveOutcome::NotSignedIn)) => {
                self.notice = Some("Please log in first.".to_string());
            }
            Ok(CellOutcome::Reserve(ReserveOutcome::Reserved(row))) => {
                info!("Reservation {} accepted, waiting for change feed", row.id);
            }
            Ok(CellOutcome::Cancel(CancelOutcome::Cancelled(id))) => {
                info!("Cancellation of {} accepted, waiting for change feed", id);
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Reservation action failed: {}", e);
                self.error_message = Some(format!("Reservation update failed: {}", e));
            }
        }
    }
}

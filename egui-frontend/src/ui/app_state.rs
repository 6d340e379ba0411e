//! # App State Module
//!
//! Central application state for the charge slot calendar.
//!
//! ## Key Types:
//! - `BackendMode` - remote Supabase project or in-memory demo
//! - `ChargeSlotApp` - main application state struct
//! - `UiMessage` - results of background work handed back to the UI thread
//!
//! The day window is computed once here and never rolls over; the user is
//! resolved once at startup. Reservations themselves live in the backend's
//! view-model and are read fresh every frame.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use anyhow::Context as _;
use chrono::{Duration, Local};
use charge_slot_backend::domain::{CellOutcome, LoginOutcome, ReservationSubscription};
use charge_slot_backend::storage::InMemoryBackend;
use charge_slot_backend::{Backend, BackendClients, BackendConfig};
use shared::{format_reservation_date, DayWindow, Reservation, ReservationId, TimeSlot, User};
use tokio::runtime::Runtime;
use tracing::info;

/// Where reservations come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendMode {
    /// Supabase project configured through the environment
    Remote,
    /// In-memory backend with a signed-in demo user
    Offline,
}

/// Work finished on the runtime, applied on the next frame
pub enum UiMessage {
    /// User resolved and first fetch done; the grid can be shown
    Loaded { user: Option<User> },
    /// Outcome of opening the change subscription
    Subscribed(Result<ReservationSubscription, String>),
    CellFinished(Result<CellOutcome, String>),
    LoginFinished(Result<LoginOutcome, String>),
}

/// Login prompt state
#[derive(Debug, Default)]
pub struct LoginModalState {
    pub open: bool,
    pub email_input: String,
}

/// Main application struct for the egui charge slot calendar
pub struct ChargeSlotApp {
    pub backend: Backend,
    pub runtime: Runtime,

    // Frozen for the session
    pub day_window: DayWindow,

    // Identity
    pub current_user: Option<User>,

    // UI state
    pub loading: bool,
    pub pending_actions: usize,
    pub error_message: Option<String>,
    /// Blocking notice; the user must acknowledge it
    pub notice: Option<String>,
    pub login_modal: LoginModalState,

    pub messages_tx: Sender<UiMessage>,
    pub messages_rx: Receiver<UiMessage>,
    pub subscription: Option<ReservationSubscription>,
}

impl ChargeSlotApp {
    /// Create the app and start the initial load in the background
    pub fn new(cc: &eframe::CreationContext<'_>, mode: BackendMode) -> anyhow::Result<Self> {
        info!("Initializing ChargeSlotApp");

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .context("Failed to start async runtime")?;

        let backend = match mode {
            BackendMode::Remote => {
                let config = BackendConfig::from_env().context("Backend configuration")?;
                Backend::connect(config)?
            }
            BackendMode::Offline => runtime.block_on(offline_backend()),
        };

        let mut app = Self::with_backend(backend, runtime);
        app.start_initial_load(cc.egui_ctx.clone());

        Ok(app)
    }

    /// App state around an already built backend, before anything is loaded
    pub fn with_backend(backend: Backend, runtime: Runtime) -> Self {
        let day_window = backend.calendar_service.current_day_window();
        let (messages_tx, messages_rx) = mpsc::channel();

        Self {
            backend,
            runtime,
            day_window,
            current_user: None,
            loading: true,
            pending_actions: 0,
            error_message: None,
            notice: None,
            login_modal: LoginModalState::default(),
            messages_tx,
            messages_rx,
            subscription: None,
        }
    }
}

impl Drop for ChargeSlotApp {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.runtime.block_on(subscription.unsubscribe());
        }
    }
}

/// In-memory backend seeded with a demo user and a few neighbours' bookings
async fn offline_backend() -> Backend {
    let memory = Arc::new(InMemoryBackend::new());
    let demo_user = User {
        id: uuid::Uuid::new_v4().to_string(),
        email: Some("demo@localhost".to_string()),
    };
    memory.set_current_user(Some(demo_user)).await;

    let today = Local::now().date_naive();
    let neighbour = uuid::Uuid::new_v4().to_string();
    let seeded: Vec<Reservation> = [(0, TimeSlot::Evening19), (1, TimeSlot::Evening21), (3, TimeSlot::Evening18)]
        .iter()
        .enumerate()
        .map(|(i, (offset, slot))| Reservation {
            id: ReservationId::new(format!("seed-{}", i + 1)),
            user_id: neighbour.clone(),
            date: format_reservation_date(today + Duration::days(*offset)),
            time_slot: slot.label().to_string(),
        })
        .collect();
    memory.seed(seeded).await;

    Backend::new(BackendClients::in_memory(memory))
}

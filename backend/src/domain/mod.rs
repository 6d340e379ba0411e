pub mod calendar;
pub mod identity_service;
pub mod reservation_service;

pub use calendar::CalendarService;
pub use identity_service::{IdentityService, LoginOutcome};
pub use reservation_service::{
    CancelOutcome, CellOutcome, ReservationService, ReservationSubscription, ReserveOutcome,
    CHANGE_CHANNEL,
};

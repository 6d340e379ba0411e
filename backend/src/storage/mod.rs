//! Storage adapters for the managed backend.

pub mod memory;
pub mod supabase;
pub mod traits;

pub use memory::{InMemoryBackend, ScriptedSelect};
pub use supabase::{SupabaseClient, SupabaseRealtime};
pub use traits::{
    ChangeFeed, ChangeSubscription, IdentityProvider, ReservationStore, RESERVATIONS_TABLE,
};

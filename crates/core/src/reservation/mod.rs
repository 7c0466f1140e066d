//! Reservations: tentative holds against future balance.
//!
//! A reservation reduces what can be reserved next but never touches the
//! ledger until it is confirmed, at which point it becomes USAGE debits.

pub mod lifecycle;
pub mod manager;
pub mod types;

#[cfg(test)]
mod manager_props;

pub use lifecycle::{LifecycleStep, ReservationLifecycle};
pub use manager::{APPROVED_STATUS, ReservationManager};
pub use types::{
    Availability, CancelOutcome, NewReservation, Reservation, ReservationStatus,
    ReservationTransition,
};

pub mod engine;
pub mod release;
pub mod sweep;

#[cfg(test)]
mod test_support;

pub use engine::{BookingConfirmation, Reservation, ReservationEngine};
pub use release::{HoldPolicy, ReleaseJob, ReleaseOutcome, ReleaseScheduler};
pub use sweep::HoldSweeper;

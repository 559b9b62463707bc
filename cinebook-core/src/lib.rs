pub mod seat;
pub mod order;
pub mod showtime;
pub mod layout;
pub mod repository;

pub use seat::{Seat, SeatState, SeatRequest};
pub use order::{Order, OrderSummary};
pub use showtime::{default_seat_layout, venue_label, LayoutConfig, NewShowtime, Showtime, ShowtimeDetails};
pub use layout::{SeatLayout, SeatView, ShowtimeLayout};
pub use repository::{HeldSeat, SeatRepository, SeatTransaction};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFoundError(String),
    #[error("Conflict: {0}")]
    ConflictError(String),
    #[error("Forbidden: {0}")]
    ForbiddenError(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

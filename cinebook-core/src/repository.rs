use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{CoreResult, LayoutConfig, NewShowtime, Order, OrderSummary, Seat, Showtime, ShowtimeDetails};

/// One storage transaction. Row locks taken by `lock_seat` are held until
/// `commit` or `rollback`; dropping the transaction rolls it back.
#[async_trait]
pub trait SeatTransaction: Send {
    /// Lock the seat row scoped to (seat id, showtime id) and read it.
    /// `None` if the seat does not exist for that showtime.
    async fn lock_seat(&mut self, seat_id: Uuid, showtime_id: Uuid) -> CoreResult<Option<Seat>>;

    /// Write back a seat previously returned by `lock_seat`.
    async fn save_seat(&mut self, seat: &Seat) -> CoreResult<()>;

    /// Insert an order and its seat links.
    async fn insert_order(&mut self, order: &Order) -> CoreResult<()>;

    async fn commit(self: Box<Self>) -> CoreResult<()>;

    async fn rollback(self: Box<Self>) -> CoreResult<()>;
}

/// A hold found by the reconciliation sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeldSeat {
    pub seat_id: Uuid,
    pub showtime_id: Uuid,
}

/// Storage for showtimes, their seats and the orders booked against them.
#[async_trait]
pub trait SeatRepository: Send + Sync {
    async fn begin(&self) -> CoreResult<Box<dyn SeatTransaction>>;

    async fn find_showtime(&self, showtime_id: Uuid) -> CoreResult<Option<ShowtimeDetails>>;

    /// Unlocked read of every seat of a showtime.
    async fn list_seats(&self, showtime_id: Uuid) -> CoreResult<Vec<Seat>>;

    /// Insert a showtime together with its generated seat set.
    async fn create_showtime(&self, showtime: &NewShowtime, layout: &LayoutConfig) -> CoreResult<Showtime>;

    /// Orders of one user, newest first.
    async fn list_orders(&self, user_id: Uuid) -> CoreResult<Vec<OrderSummary>>;

    /// Seats still reserved (and not booked) whose hold was placed at or before `cutoff`.
    async fn find_expired_holds(&self, cutoff: DateTime<Utc>) -> CoreResult<Vec<HeldSeat>>;
}

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use cinebook_core::{
    CoreError, CoreResult, HeldSeat, LayoutConfig, NewShowtime, Order, OrderSummary, Seat, SeatRepository,
    SeatTransaction, Showtime, ShowtimeDetails,
};
use cinebook_store::MemorySeatRepository;

/// A single-row showtime "A1".."A{count}" at `price`, seats in row order.
pub async fn showtime_with_seats(count: u32, price: i32) -> (MemorySeatRepository, Uuid, Vec<Seat>) {
    let repo = MemorySeatRepository::new();
    let movie_id = repo.add_movie("Inception").await;
    let venue_id = repo.add_venue("PVR Cinemas", "Mumbai").await;

    let layout = LayoutConfig { rows: "A".to_string(), seats_per_row: count, seat_price: price };
    let showtime = repo
        .create_showtime(&NewShowtime { movie_id, venue_id, timing: "18:00".to_string() }, &layout)
        .await
        .unwrap();

    let mut seats = repo.list_seats(showtime.id).await.unwrap();
    seats.sort_by_key(|s| s.row_index());
    (repo, showtime.id, seats)
}

/// Fails the first `failures` calls to `begin`, then behaves like the wrapped store.
pub struct FlakyRepository {
    inner: MemorySeatRepository,
    failures: AtomicU32,
}

impl FlakyRepository {
    pub fn new(inner: MemorySeatRepository, failures: u32) -> Self {
        Self { inner, failures: AtomicU32::new(failures) }
    }

    pub fn failures_left(&self) -> u32 {
        self.failures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SeatRepository for FlakyRepository {
    async fn begin(&self) -> CoreResult<Box<dyn SeatTransaction>> {
        let failed = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(CoreError::InternalError("database error: connection reset".to_string()));
        }
        self.inner.begin().await
    }

    async fn find_showtime(&self, showtime_id: Uuid) -> CoreResult<Option<ShowtimeDetails>> {
        self.inner.find_showtime(showtime_id).await
    }

    async fn list_seats(&self, showtime_id: Uuid) -> CoreResult<Vec<Seat>> {
        self.inner.list_seats(showtime_id).await
    }

    async fn create_showtime(&self, showtime: &NewShowtime, layout: &LayoutConfig) -> CoreResult<Showtime> {
        self.inner.create_showtime(showtime, layout).await
    }

    async fn list_orders(&self, user_id: Uuid) -> CoreResult<Vec<OrderSummary>> {
        self.inner.list_orders(user_id).await
    }

    async fn find_expired_holds(&self, cutoff: DateTime<Utc>) -> CoreResult<Vec<HeldSeat>> {
        self.inner.find_expired_holds(cutoff).await
    }
}

/// Every transaction fails to lock seats of `showtime_id`; other showtimes are untouched.
pub struct PoisonedShowtime {
    inner: MemorySeatRepository,
    showtime_id: Uuid,
}

impl PoisonedShowtime {
    pub fn new(inner: MemorySeatRepository, showtime_id: Uuid) -> Self {
        Self { inner, showtime_id }
    }
}

struct PoisonedTransaction {
    inner: Box<dyn SeatTransaction>,
    showtime_id: Uuid,
}

#[async_trait]
impl SeatTransaction for PoisonedTransaction {
    async fn lock_seat(&mut self, seat_id: Uuid, showtime_id: Uuid) -> CoreResult<Option<Seat>> {
        if showtime_id == self.showtime_id {
            return Err(CoreError::InternalError("database error: deadlock detected".to_string()));
        }
        self.inner.lock_seat(seat_id, showtime_id).await
    }

    async fn save_seat(&mut self, seat: &Seat) -> CoreResult<()> {
        self.inner.save_seat(seat).await
    }

    async fn insert_order(&mut self, order: &Order) -> CoreResult<()> {
        self.inner.insert_order(order).await
    }

    async fn commit(self: Box<Self>) -> CoreResult<()> {
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> CoreResult<()> {
        self.inner.rollback().await
    }
}

#[async_trait]
impl SeatRepository for PoisonedShowtime {
    async fn begin(&self) -> CoreResult<Box<dyn SeatTransaction>> {
        let inner = self.inner.begin().await?;
        Ok(Box::new(PoisonedTransaction { inner, showtime_id: self.showtime_id }))
    }

    async fn find_showtime(&self, showtime_id: Uuid) -> CoreResult<Option<ShowtimeDetails>> {
        self.inner.find_showtime(showtime_id).await
    }

    async fn list_seats(&self, showtime_id: Uuid) -> CoreResult<Vec<Seat>> {
        self.inner.list_seats(showtime_id).await
    }

    async fn create_showtime(&self, showtime: &NewShowtime, layout: &LayoutConfig) -> CoreResult<Showtime> {
        self.inner.create_showtime(showtime, layout).await
    }

    async fn list_orders(&self, user_id: Uuid) -> CoreResult<Vec<OrderSummary>> {
        self.inner.list_orders(user_id).await
    }

    async fn find_expired_holds(&self, cutoff: DateTime<Utc>) -> CoreResult<Vec<HeldSeat>> {
        self.inner.find_expired_holds(cutoff).await
    }
}

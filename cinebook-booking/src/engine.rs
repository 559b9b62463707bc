use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use cinebook_core::{
    CoreError, CoreResult, LayoutConfig, NewShowtime, Order, OrderSummary, Seat, SeatRepository, SeatRequest,
    SeatTransaction, Showtime, ShowtimeLayout,
};

use crate::release::{HoldPolicy, ReleaseJob, ReleaseOutcome, ReleaseScheduler};

/// Seats now held for the requesting user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reservation {
    pub showtime_id: Uuid,
    pub seat_ids: Vec<Uuid>,
    pub reserved_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingConfirmation {
    pub order_id: Uuid,
    pub total_price: i32,
    pub seats: Vec<String>,
}

/// Reserve, book and read seats of a showtime. All coordination goes through
/// the storage row locks; the engine itself keeps no state between calls.
#[derive(Clone)]
pub struct ReservationEngine {
    repo: Arc<dyn SeatRepository>,
    releases: ReleaseScheduler,
    layout: LayoutConfig,
}

impl ReservationEngine {
    pub fn new(repo: Arc<dyn SeatRepository>, policy: HoldPolicy) -> Self {
        Self {
            releases: ReleaseScheduler::new(repo.clone(), policy),
            repo,
            layout: LayoutConfig::default(),
        }
    }

    pub fn with_layout(mut self, layout: LayoutConfig) -> Self {
        self.layout = layout;
        self
    }

    pub fn policy(&self) -> &HoldPolicy {
        self.releases.policy()
    }

    /// Hold every requested seat for the user, or none of them.
    pub async fn reserve(&self, request: &SeatRequest) -> CoreResult<Reservation> {
        let (reservation, _release) = self.reserve_inner(request).await?;
        Ok(reservation)
    }

    async fn reserve_inner(
        &self,
        request: &SeatRequest,
    ) -> CoreResult<(Reservation, JoinHandle<CoreResult<ReleaseOutcome>>)> {
        request.validate()?;

        // Postgres keeps microseconds; the release job compares against this stamp.
        let reserved_at = Utc::now().trunc_subsecs(6);

        let mut tx = self.repo.begin().await?;
        if let Err(e) = hold_seats(tx.as_mut(), request, reserved_at).await {
            rollback(tx, request.showtime_id).await;
            if matches!(e, CoreError::ConflictError(_)) {
                warn!("Reservation for user {} rejected: {}", request.user_id, e);
            }
            return Err(e);
        }
        tx.commit().await?;

        info!(
            "User {} reserved {} seat(s) for showtime {}",
            request.user_id,
            request.seat_ids.len(),
            request.showtime_id
        );

        let release = self.releases.schedule(ReleaseJob {
            showtime_id: request.showtime_id,
            seat_ids: request.seat_ids.clone(),
            placed_at: reserved_at,
        });

        let reservation = Reservation {
            showtime_id: request.showtime_id,
            seat_ids: request.seat_ids.clone(),
            reserved_at,
            expires_at: reserved_at
                .checked_add_signed(self.policy().ttl_delta())
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        };

        Ok((reservation, release))
    }

    /// Turn the user's own holds into a single order.
    pub async fn book(&self, request: &SeatRequest) -> CoreResult<BookingConfirmation> {
        request.validate()?;

        let mut tx = self.repo.begin().await?;
        let (order, seats) = match book_seats(tx.as_mut(), request).await {
            Ok(booked) => booked,
            Err(e) => {
                rollback(tx, request.showtime_id).await;
                if matches!(e, CoreError::ConflictError(_) | CoreError::ForbiddenError(_)) {
                    warn!("Booking for user {} rejected: {}", request.user_id, e);
                }
                return Err(e);
            }
        };
        tx.commit().await?;

        info!(
            "User {} booked order {} ({} seat(s), total {}) for showtime {}",
            request.user_id,
            order.id,
            seats.len(),
            order.total_price,
            request.showtime_id
        );

        Ok(BookingConfirmation {
            order_id: order.id,
            total_price: order.total_price,
            seats,
        })
    }

    pub async fn seat_layout(&self, showtime_id: Uuid) -> CoreResult<ShowtimeLayout> {
        let details = self
            .repo
            .find_showtime(showtime_id)
            .await?
            .ok_or_else(|| CoreError::NotFoundError("ShowTime not found".to_string()))?;

        let seats = self.repo.list_seats(showtime_id).await?;
        Ok(ShowtimeLayout::new(details, &seats))
    }

    pub async fn list_orders(&self, user_id: Uuid) -> CoreResult<Vec<OrderSummary>> {
        self.repo.list_orders(user_id).await
    }

    /// Create a showtime with the configured seat grid.
    pub async fn create_showtime(&self, showtime: &NewShowtime) -> CoreResult<Showtime> {
        self.repo.create_showtime(showtime, &self.layout).await
    }
}

async fn lock_existing(tx: &mut dyn SeatTransaction, seat_id: Uuid, showtime_id: Uuid) -> CoreResult<Seat> {
    tx.lock_seat(seat_id, showtime_id)
        .await?
        .ok_or_else(|| CoreError::NotFoundError(format!("Seat {} not found", seat_id)))
}

async fn hold_seats(tx: &mut dyn SeatTransaction, request: &SeatRequest, at: DateTime<Utc>) -> CoreResult<()> {
    for seat_id in request.lock_order() {
        let mut seat = lock_existing(tx, seat_id, request.showtime_id).await?;
        seat.reserve(request.user_id, at)?;
        tx.save_seat(&seat).await?;
    }
    Ok(())
}

async fn book_seats(tx: &mut dyn SeatTransaction, request: &SeatRequest) -> CoreResult<(Order, Vec<String>)> {
    let mut seats = Vec::with_capacity(request.seat_ids.len());
    for seat_id in request.lock_order() {
        let seat = lock_existing(tx, seat_id, request.showtime_id).await?;
        seat.ensure_bookable_by(request.user_id)?;
        seats.push(seat);
    }

    let order = Order::for_seats(request.user_id, request.showtime_id, &seats);
    tx.insert_order(&order).await?;

    for seat in &mut seats {
        seat.book(request.user_id)?;
        tx.save_seat(seat).await?;
    }

    let mut numbers: Vec<String> = seats.into_iter().map(|s| s.seat_number).collect();
    numbers.sort();
    Ok((order, numbers))
}

async fn rollback(tx: Box<dyn SeatTransaction>, showtime_id: Uuid) {
    if let Err(e) = tx.rollback().await {
        warn!("Rollback for showtime {} failed: {}", showtime_id, e);
    }
}

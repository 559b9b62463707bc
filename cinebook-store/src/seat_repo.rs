use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use cinebook_core::showtime::default_seat_layout;
use cinebook_core::{
    venue_label, CoreError, CoreResult, HeldSeat, LayoutConfig, NewShowtime, Order, OrderSummary, Seat,
    SeatRepository, SeatState, SeatTransaction, Showtime, ShowtimeDetails,
};

use crate::database::db_err;

pub struct PostgresSeatRepository {
    pool: PgPool,
}

impl PostgresSeatRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct SeatRow {
    id: Uuid,
    showtime_id: Uuid,
    seat_number: String,
    price: i32,
    is_reserved: bool,
    is_booked: bool,
    reserved_by: Option<Uuid>,
    reserved_at: Option<DateTime<Utc>>,
}

impl From<SeatRow> for Seat {
    fn from(row: SeatRow) -> Self {
        Seat {
            id: row.id,
            showtime_id: row.showtime_id,
            seat_number: row.seat_number,
            price: row.price,
            state: SeatState::from_flags(row.is_reserved, row.is_booked),
            reserved_by: row.reserved_by,
            reserved_at: row.reserved_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ShowtimeRow {
    id: Uuid,
    movie_id: Uuid,
    venue_id: Uuid,
    timing: String,
    movie_name: String,
    venue_name: String,
    venue_location: String,
}

#[derive(sqlx::FromRow)]
struct OrderSummaryRow {
    id: Uuid,
    total_price: i32,
    created_at: DateTime<Utc>,
    timing: String,
    movie_name: String,
    venue_name: String,
    venue_location: String,
    seats: Vec<String>,
}

#[derive(sqlx::FromRow)]
struct HeldSeatRow {
    id: Uuid,
    showtime_id: Uuid,
}

pub struct PgSeatTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl SeatTransaction for PgSeatTransaction {
    async fn lock_seat(&mut self, seat_id: Uuid, showtime_id: Uuid) -> CoreResult<Option<Seat>> {
        let row = sqlx::query_as::<_, SeatRow>(
            r#"
            SELECT id, showtime_id, seat_number, price, is_reserved, is_booked, reserved_by, reserved_at
            FROM seats
            WHERE id = $1 AND showtime_id = $2
            FOR UPDATE
            "#,
        )
        .bind(seat_id)
        .bind(showtime_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err)?;

        Ok(row.map(Seat::from))
    }

    async fn save_seat(&mut self, seat: &Seat) -> CoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE seats
            SET is_available = $2, is_reserved = $3, is_booked = $4, reserved_by = $5, reserved_at = $6
            WHERE id = $1
            "#,
        )
        .bind(seat.id)
        .bind(seat.is_available())
        .bind(seat.is_reserved())
        .bind(seat.is_booked())
        .bind(seat.reserved_by)
        .bind(seat.reserved_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;

        if result.rows_affected() != 1 {
            return Err(CoreError::InternalError(format!("seat {} was not updated", seat.id)));
        }

        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, showtime_id, total_price, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(order.id)
        .bind(order.user_id)
        .bind(order.showtime_id)
        .bind(order.total_price)
        .bind(order.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;

        sqlx::query(
            r#"
            INSERT INTO order_seats (order_id, seat_id)
            SELECT $1, seat_id FROM UNNEST($2::uuid[]) AS t(seat_id)
            "#,
        )
        .bind(order.id)
        .bind(&order.seat_ids)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> CoreResult<()> {
        self.tx.commit().await.map_err(db_err)
    }

    async fn rollback(self: Box<Self>) -> CoreResult<()> {
        self.tx.rollback().await.map_err(db_err)
    }
}

#[async_trait]
impl SeatRepository for PostgresSeatRepository {
    async fn begin(&self) -> CoreResult<Box<dyn SeatTransaction>> {
        let tx = self.pool.begin().await.map_err(db_err)?;
        Ok(Box::new(PgSeatTransaction { tx }))
    }

    async fn find_showtime(&self, showtime_id: Uuid) -> CoreResult<Option<ShowtimeDetails>> {
        let row = sqlx::query_as::<_, ShowtimeRow>(
            r#"
            SELECT st.id, st.movie_id, st.venue_id, st.timing,
                   m.title AS movie_name, v.name AS venue_name, v.location AS venue_location
            FROM showtimes st
            JOIN movies m ON m.id = st.movie_id
            JOIN venues v ON v.id = st.venue_id
            WHERE st.id = $1
            "#,
        )
        .bind(showtime_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(|r| ShowtimeDetails {
            id: r.id,
            movie_id: r.movie_id,
            venue_id: r.venue_id,
            timing: r.timing,
            movie_name: r.movie_name,
            venue_name: venue_label(&r.venue_name, &r.venue_location),
        }))
    }

    async fn list_seats(&self, showtime_id: Uuid) -> CoreResult<Vec<Seat>> {
        let rows = sqlx::query_as::<_, SeatRow>(
            r#"
            SELECT id, showtime_id, seat_number, price, is_reserved, is_booked, reserved_by, reserved_at
            FROM seats
            WHERE showtime_id = $1
            ORDER BY seat_number
            "#,
        )
        .bind(showtime_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(Seat::from).collect())
    }

    async fn create_showtime(&self, showtime: &NewShowtime, layout: &LayoutConfig) -> CoreResult<Showtime> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let movie: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM movies WHERE id = $1")
            .bind(showtime.movie_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?;
        if movie.is_none() {
            return Err(CoreError::NotFoundError(format!("Movie {} not found", showtime.movie_id)));
        }

        let venue: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM venues WHERE id = $1")
            .bind(showtime.venue_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?;
        if venue.is_none() {
            return Err(CoreError::NotFoundError(format!("Venue {} not found", showtime.venue_id)));
        }

        let id = Uuid::new_v4();
        let (created_at,): (DateTime<Utc>,) = sqlx::query_as(
            r#"
            INSERT INTO showtimes (id, movie_id, venue_id, timing)
            VALUES ($1, $2, $3, $4)
            RETURNING created_at
            "#,
        )
        .bind(id)
        .bind(showtime.movie_id)
        .bind(showtime.venue_id)
        .bind(&showtime.timing)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        let seats = default_seat_layout(id, layout);
        let seat_ids: Vec<Uuid> = seats.iter().map(|s| s.id).collect();
        let numbers: Vec<String> = seats.iter().map(|s| s.seat_number.clone()).collect();
        let prices: Vec<i32> = seats.iter().map(|s| s.price).collect();

        sqlx::query(
            r#"
            INSERT INTO seats (id, showtime_id, seat_number, price, is_available, is_reserved, is_booked)
            SELECT t.id, $2, t.seat_number, t.price, TRUE, FALSE, FALSE
            FROM UNNEST($1::uuid[], $3::text[], $4::int4[]) AS t(id, seat_number, price)
            "#,
        )
        .bind(&seat_ids)
        .bind(id)
        .bind(&numbers)
        .bind(&prices)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;

        tracing::info!("Created showtime {} with {} seats", id, seats.len());

        Ok(Showtime {
            id,
            movie_id: showtime.movie_id,
            venue_id: showtime.venue_id,
            timing: showtime.timing.clone(),
            created_at,
        })
    }

    async fn list_orders(&self, user_id: Uuid) -> CoreResult<Vec<OrderSummary>> {
        let rows = sqlx::query_as::<_, OrderSummaryRow>(
            r#"
            SELECT o.id, o.total_price, o.created_at, st.timing,
                   m.title AS movie_name, v.name AS venue_name, v.location AS venue_location,
                   COALESCE(
                       ARRAY_AGG(s.seat_number ORDER BY s.seat_number) FILTER (WHERE s.id IS NOT NULL),
                       ARRAY[]::text[]
                   ) AS seats
            FROM orders o
            JOIN showtimes st ON st.id = o.showtime_id
            JOIN movies m ON m.id = st.movie_id
            JOIN venues v ON v.id = st.venue_id
            LEFT JOIN order_seats os ON os.order_id = o.id
            LEFT JOIN seats s ON s.id = os.seat_id
            WHERE o.user_id = $1
            GROUP BY o.id, st.timing, m.title, v.name, v.location
            ORDER BY o.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows
            .into_iter()
            .map(|r| OrderSummary {
                id: r.id,
                total_price: r.total_price,
                seats: r.seats,
                movie_name: r.movie_name,
                venue_name: venue_label(&r.venue_name, &r.venue_location),
                showtime: r.timing,
                created_at: r.created_at,
            })
            .collect())
    }

    async fn find_expired_holds(&self, cutoff: DateTime<Utc>) -> CoreResult<Vec<HeldSeat>> {
        let rows = sqlx::query_as::<_, HeldSeatRow>(
            r#"
            SELECT id, showtime_id
            FROM seats
            WHERE is_reserved AND NOT is_booked
              AND (reserved_at IS NULL OR reserved_at <= $1)
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows
            .into_iter()
            .map(|r| HeldSeat { seat_id: r.id, showtime_id: r.showtime_id })
            .collect())
    }
}

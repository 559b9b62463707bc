use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use cinebook_core::showtime::default_seat_layout;
use cinebook_core::{
    venue_label, CoreError, CoreResult, HeldSeat, LayoutConfig, NewShowtime, Order, OrderSummary, Seat,
    SeatRepository, SeatTransaction, Showtime, ShowtimeDetails,
};

#[derive(Default)]
struct MemoryState {
    movies: HashMap<Uuid, String>,
    venues: HashMap<Uuid, (String, String)>,
    showtimes: HashMap<Uuid, Showtime>,
    seats: HashMap<Uuid, Seat>,
    orders: Vec<Order>,
}

impl MemoryState {
    fn details(&self, showtime: &Showtime) -> ShowtimeDetails {
        let movie_name = self.movies.get(&showtime.movie_id).cloned().unwrap_or_default();
        let venue_name = self
            .venues
            .get(&showtime.venue_id)
            .map(|(name, location)| venue_label(name, location))
            .unwrap_or_default();

        ShowtimeDetails {
            id: showtime.id,
            movie_id: showtime.movie_id,
            venue_id: showtime.venue_id,
            timing: showtime.timing.clone(),
            movie_name,
            venue_name,
        }
    }
}

/// In-process seat store with the same transactional contract as Postgres:
/// one mutex per seat row held until commit or rollback, and writes that stay
/// private to the transaction until it commits.
#[derive(Clone, Default)]
pub struct MemorySeatRepository {
    state: Arc<Mutex<MemoryState>>,
    row_locks: Arc<Mutex<HashMap<Uuid, Arc<Mutex<()>>>>>,
}

impl MemorySeatRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_movie(&self, title: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().await.movies.insert(id, title.to_string());
        id
    }

    pub async fn add_venue(&self, name: &str, location: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.state
            .lock()
            .await
            .venues
            .insert(id, (name.to_string(), location.to_string()));
        id
    }

    /// Committed state of a seat.
    pub async fn seat(&self, seat_id: Uuid) -> Option<Seat> {
        self.state.lock().await.seats.get(&seat_id).cloned()
    }

    pub async fn seat_by_number(&self, showtime_id: Uuid, seat_number: &str) -> Option<Seat> {
        self.state
            .lock()
            .await
            .seats
            .values()
            .find(|s| s.showtime_id == showtime_id && s.seat_number == seat_number)
            .cloned()
    }

    pub async fn orders(&self) -> Vec<Order> {
        self.state.lock().await.orders.clone()
    }

    async fn row_lock(&self, seat_id: Uuid) -> Arc<Mutex<()>> {
        self.row_locks.lock().await.entry(seat_id).or_default().clone()
    }
}

pub struct MemoryTransaction {
    repo: MemorySeatRepository,
    guards: HashMap<Uuid, OwnedMutexGuard<()>>,
    seats: HashMap<Uuid, Seat>,
    orders: Vec<Order>,
}

impl MemoryTransaction {
    async fn read_seat(&self, seat_id: Uuid, showtime_id: Uuid) -> Option<Seat> {
        if let Some(seat) = self.seats.get(&seat_id) {
            return Some(seat.clone());
        }
        self.repo
            .state
            .lock()
            .await
            .seats
            .get(&seat_id)
            .filter(|s| s.showtime_id == showtime_id)
            .cloned()
    }
}

#[async_trait]
impl SeatTransaction for MemoryTransaction {
    async fn lock_seat(&mut self, seat_id: Uuid, showtime_id: Uuid) -> CoreResult<Option<Seat>> {
        if self.guards.contains_key(&seat_id) {
            return Ok(self.read_seat(seat_id, showtime_id).await);
        }

        // A row that does not match takes no lock.
        if self.read_seat(seat_id, showtime_id).await.is_none() {
            return Ok(None);
        }

        let guard = self.repo.row_lock(seat_id).await.lock_owned().await;
        self.guards.insert(seat_id, guard);

        // Re-read: the previous holder may have committed while we waited.
        Ok(self.read_seat(seat_id, showtime_id).await)
    }

    async fn save_seat(&mut self, seat: &Seat) -> CoreResult<()> {
        if !self.guards.contains_key(&seat.id) {
            return Err(CoreError::InternalError(format!(
                "seat {} saved without holding its row lock",
                seat.id
            )));
        }
        self.seats.insert(seat.id, seat.clone());
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> CoreResult<()> {
        self.orders.push(order.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> CoreResult<()> {
        let MemoryTransaction { repo, guards, seats, orders } = *self;

        {
            let mut state = repo.state.lock().await;
            state.seats.extend(seats);
            state.orders.extend(orders);
        }

        // Row locks are released only once the writes are visible.
        drop(guards);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> CoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl SeatRepository for MemorySeatRepository {
    async fn begin(&self) -> CoreResult<Box<dyn SeatTransaction>> {
        Ok(Box::new(MemoryTransaction {
            repo: self.clone(),
            guards: HashMap::new(),
            seats: HashMap::new(),
            orders: Vec::new(),
        }))
    }

    async fn find_showtime(&self, showtime_id: Uuid) -> CoreResult<Option<ShowtimeDetails>> {
        let state = self.state.lock().await;
        Ok(state.showtimes.get(&showtime_id).map(|st| state.details(st)))
    }

    async fn list_seats(&self, showtime_id: Uuid) -> CoreResult<Vec<Seat>> {
        let state = self.state.lock().await;
        let mut seats: Vec<Seat> = state
            .seats
            .values()
            .filter(|s| s.showtime_id == showtime_id)
            .cloned()
            .collect();
        seats.sort_by(|a, b| a.seat_number.cmp(&b.seat_number));
        Ok(seats)
    }

    async fn create_showtime(&self, showtime: &NewShowtime, layout: &LayoutConfig) -> CoreResult<Showtime> {
        let mut state = self.state.lock().await;

        if !state.movies.contains_key(&showtime.movie_id) {
            return Err(CoreError::NotFoundError(format!("Movie {} not found", showtime.movie_id)));
        }
        if !state.venues.contains_key(&showtime.venue_id) {
            return Err(CoreError::NotFoundError(format!("Venue {} not found", showtime.venue_id)));
        }

        let created = Showtime {
            id: Uuid::new_v4(),
            movie_id: showtime.movie_id,
            venue_id: showtime.venue_id,
            timing: showtime.timing.clone(),
            created_at: Utc::now(),
        };

        for seat in default_seat_layout(created.id, layout) {
            state.seats.insert(seat.id, seat);
        }
        state.showtimes.insert(created.id, created.clone());

        Ok(created)
    }

    async fn list_orders(&self, user_id: Uuid) -> CoreResult<Vec<OrderSummary>> {
        let state = self.state.lock().await;

        let mut orders: Vec<&Order> = state.orders.iter().filter(|o| o.user_id == user_id).collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(orders
            .into_iter()
            .map(|order| {
                let mut seats: Vec<String> = order
                    .seat_ids
                    .iter()
                    .filter_map(|id| state.seats.get(id))
                    .map(|s| s.seat_number.clone())
                    .collect();
                seats.sort();

                let details = state.showtimes.get(&order.showtime_id).map(|st| state.details(st));
                let (movie_name, venue_name, showtime) = match details {
                    Some(d) => (d.movie_name, d.venue_name, d.timing),
                    None => Default::default(),
                };

                OrderSummary {
                    id: order.id,
                    total_price: order.total_price,
                    seats,
                    movie_name,
                    venue_name,
                    showtime,
                    created_at: order.created_at,
                }
            })
            .collect())
    }

    async fn find_expired_holds(&self, cutoff: DateTime<Utc>) -> CoreResult<Vec<HeldSeat>> {
        let state = self.state.lock().await;
        Ok(state
            .seats
            .values()
            .filter(|s| s.held_since(cutoff))
            .map(|s| HeldSeat { seat_id: s.id, showtime_id: s.showtime_id })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn showtime(repo: &MemorySeatRepository) -> Showtime {
        let movie_id = repo.add_movie("Inception").await;
        let venue_id = repo.add_venue("PVR Cinemas", "Mumbai").await;
        repo.create_showtime(
            &NewShowtime { movie_id, venue_id, timing: "18:00".to_string() },
            &LayoutConfig::default(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_showtime_generates_layout() {
        let repo = MemorySeatRepository::new();
        let st = showtime(&repo).await;

        let seats = repo.list_seats(st.id).await.unwrap();
        assert_eq!(seats.len(), 50);
        assert!(seats.iter().all(|s| s.is_available()));

        let details = repo.find_showtime(st.id).await.unwrap().unwrap();
        assert_eq!(details.movie_name, "Inception");
        assert_eq!(details.venue_name, "PVR Cinemas - Mumbai");
    }

    #[tokio::test]
    async fn test_create_showtime_unknown_movie() {
        let repo = MemorySeatRepository::new();
        let venue_id = repo.add_venue("INOX", "Delhi").await;

        let err = repo
            .create_showtime(
                &NewShowtime { movie_id: Uuid::new_v4(), venue_id, timing: "10:00".to_string() },
                &LayoutConfig::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFoundError(_)));
    }

    #[tokio::test]
    async fn test_lock_scoped_to_showtime() {
        let repo = MemorySeatRepository::new();
        let st = showtime(&repo).await;
        let a1 = repo.seat_by_number(st.id, "A1").await.unwrap();

        let mut tx = repo.begin().await.unwrap();
        assert!(tx.lock_seat(a1.id, Uuid::new_v4()).await.unwrap().is_none());
        assert!(tx.lock_seat(Uuid::new_v4(), st.id).await.unwrap().is_none());
        assert_eq!(tx.lock_seat(a1.id, st.id).await.unwrap(), Some(a1));
    }

    #[tokio::test]
    async fn test_uncommitted_writes_are_private() {
        let repo = MemorySeatRepository::new();
        let st = showtime(&repo).await;
        let mut a1 = repo.seat_by_number(st.id, "A1").await.unwrap();

        let mut tx = repo.begin().await.unwrap();
        tx.lock_seat(a1.id, st.id).await.unwrap();
        a1.reserve(Uuid::new_v4(), Utc::now()).unwrap();
        tx.save_seat(&a1).await.unwrap();

        assert!(repo.seat(a1.id).await.unwrap().is_available());

        tx.rollback().await.unwrap();
        assert!(repo.seat(a1.id).await.unwrap().is_available());
    }

    #[tokio::test]
    async fn test_save_requires_lock() {
        let repo = MemorySeatRepository::new();
        let st = showtime(&repo).await;
        let a1 = repo.seat_by_number(st.id, "A1").await.unwrap();

        let mut tx = repo.begin().await.unwrap();
        let err = tx.save_seat(&a1).await.unwrap_err();
        assert!(matches!(err, CoreError::InternalError(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_row_lock_blocks_until_commit() {
        let repo = MemorySeatRepository::new();
        let st = showtime(&repo).await;
        let mut a1 = repo.seat_by_number(st.id, "A1").await.unwrap();
        let holder = Uuid::new_v4();

        let mut first = repo.begin().await.unwrap();
        first.lock_seat(a1.id, st.id).await.unwrap();

        let contender = {
            let repo = repo.clone();
            let (seat_id, showtime_id) = (a1.id, st.id);
            tokio::spawn(async move {
                let mut tx = repo.begin().await.unwrap();
                tx.lock_seat(seat_id, showtime_id).await.unwrap().unwrap()
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        a1.reserve(holder, Utc::now()).unwrap();
        first.save_seat(&a1).await.unwrap();
        first.commit().await.unwrap();

        let seen = contender.await.unwrap();
        assert!(seen.is_reserved());
        assert_eq!(seen.reserved_by, Some(holder));
    }

    #[tokio::test]
    async fn test_dropped_transaction_releases_locks() {
        let repo = MemorySeatRepository::new();
        let st = showtime(&repo).await;
        let a1 = repo.seat_by_number(st.id, "A1").await.unwrap();

        {
            let mut tx = repo.begin().await.unwrap();
            tx.lock_seat(a1.id, st.id).await.unwrap();
        }

        let mut tx = repo.begin().await.unwrap();
        let locked = tokio::time::timeout(Duration::from_secs(1), tx.lock_seat(a1.id, st.id)).await;
        assert!(locked.is_ok());
    }
}

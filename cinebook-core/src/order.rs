use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Seat;

/// Immutable record of a completed booking. Only Book creates one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub showtime_id: Uuid,
    pub total_price: i32,
    pub seat_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Build an order over the given seats; the total is the sum of their prices.
    pub fn for_seats(user_id: Uuid, showtime_id: Uuid, seats: &[Seat]) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            showtime_id,
            total_price: seats.iter().map(|s| s.price).sum(),
            seat_ids: seats.iter().map(|s| s.id).collect(),
            created_at: Utc::now(),
        }
    }
}

/// Order history entry as shown to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub id: Uuid,
    pub total_price: i32,
    pub seats: Vec<String>,
    pub movie_name: String,
    pub venue_name: String,
    pub showtime: String,
    pub created_at: DateTime<Utc>,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Seat;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Showtime {
    pub id: Uuid,
    pub movie_id: Uuid,
    pub venue_id: Uuid,
    pub timing: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewShowtime {
    pub movie_id: Uuid,
    pub venue_id: Uuid,
    pub timing: String,
}

/// Showtime joined with the names a seat map header needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowtimeDetails {
    pub id: Uuid,
    pub movie_id: Uuid,
    pub venue_id: Uuid,
    pub timing: String,
    pub movie_name: String,
    pub venue_name: String,
}

/// "PVR Cinemas - Mumbai"
pub fn venue_label(name: &str, location: &str) -> String {
    format!("{} - {}", name, location)
}

/// Shape of the seat grid generated for every new showtime.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// One character per row label, in order.
    pub rows: String,
    pub seats_per_row: u32,
    pub seat_price: i32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            rows: "ABCDE".to_string(),
            seats_per_row: 10,
            seat_price: 250,
        }
    }
}

/// Generate the seat set a showtime owns for its whole life: A1..A10, B1..B10
/// and so on, all available.
pub fn default_seat_layout(showtime_id: Uuid, layout: &LayoutConfig) -> Vec<Seat> {
    layout
        .rows
        .chars()
        .flat_map(|row| {
            (1..=layout.seats_per_row)
                .map(move |n| Seat::new(showtime_id, format!("{}{}", row, n), layout.seat_price))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let showtime_id = Uuid::new_v4();
        let seats = default_seat_layout(showtime_id, &LayoutConfig::default());

        assert_eq!(seats.len(), 50);
        assert_eq!(seats[0].seat_number, "A1");
        assert_eq!(seats[9].seat_number, "A10");
        assert_eq!(seats[49].seat_number, "E10");

        for seat in &seats {
            assert!(seat.is_available(), "{} should start available", seat.seat_number);
            assert_eq!(seat.price, 250);
            assert_eq!(seat.showtime_id, showtime_id);
            assert_eq!(seat.reserved_by, None);
        }
    }

    #[test]
    fn test_custom_layout() {
        let layout = LayoutConfig {
            rows: "XY".to_string(),
            seats_per_row: 3,
            seat_price: 100,
        };
        let numbers: Vec<String> = default_seat_layout(Uuid::new_v4(), &layout)
            .into_iter()
            .map(|s| s.seat_number)
            .collect();

        assert_eq!(numbers, vec!["X1", "X2", "X3", "Y1", "Y2", "Y3"]);
    }

    #[test]
    fn test_venue_label() {
        assert_eq!(venue_label("INOX", "Delhi"), "INOX - Delhi");
    }
}

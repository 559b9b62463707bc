use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Seat, ShowtimeDetails};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatView {
    pub id: Uuid,
    pub seat_number: String,
    pub is_reserved: bool,
    pub is_booked: bool,
    pub is_available: bool,
    pub price: i32,
}

impl From<&Seat> for SeatView {
    fn from(seat: &Seat) -> Self {
        Self {
            id: seat.id,
            seat_number: seat.seat_number.clone(),
            is_reserved: seat.is_reserved(),
            is_booked: seat.is_booked(),
            is_available: seat.is_available(),
            price: seat.price,
        }
    }
}

/// Seats grouped by row label. Rows iterate in label order; seats within a
/// row in numeric order, so A2 comes before A10.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeatLayout {
    rows: BTreeMap<String, Vec<SeatView>>,
}

impl SeatLayout {
    pub fn from_seats(seats: &[Seat]) -> Self {
        let mut grouped: BTreeMap<String, Vec<&Seat>> = BTreeMap::new();

        for seat in seats {
            // Seats without a number have no row to live in.
            let Some(label) = seat.row_label() else {
                tracing::debug!("Skipping seat {} without a seat number", seat.id);
                continue;
            };
            grouped.entry(label.to_string()).or_default().push(seat);
        }

        let rows = grouped
            .into_iter()
            .map(|(label, mut row)| {
                row.sort_by(|a, b| {
                    let ka = (a.row_index().unwrap_or(u32::MAX), &a.seat_number);
                    let kb = (b.row_index().unwrap_or(u32::MAX), &b.seat_number);
                    ka.cmp(&kb)
                });
                (label, row.into_iter().map(SeatView::from).collect())
            })
            .collect();

        Self { rows }
    }

    pub fn row(&self, label: &str) -> Option<&[SeatView]> {
        self.rows.get(label).map(Vec::as_slice)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    pub fn seat_count(&self) -> usize {
        self.rows.values().map(Vec::len).sum()
    }
}

/// Seat map for one showtime together with its header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowtimeLayout {
    pub showtime: String,
    pub venue: Uuid,
    pub venue_name: String,
    pub movie_name: String,
    pub seats: SeatLayout,
}

impl ShowtimeLayout {
    pub fn new(details: ShowtimeDetails, seats: &[Seat]) -> Self {
        Self {
            showtime: details.timing,
            venue: details.venue_id,
            venue_name: details.venue_name,
            movie_name: details.movie_name,
            seats: SeatLayout::from_seats(seats),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_groups_by_row_in_stable_order() {
        let showtime_id = Uuid::new_v4();
        let mut reserved = Seat::new(showtime_id, "A2", 250);
        reserved.reserve(Uuid::new_v4(), Utc::now()).unwrap();

        let seats = vec![
            Seat::new(showtime_id, "B1", 300),
            Seat::new(showtime_id, "A10", 250),
            reserved,
            Seat::new(showtime_id, "A1", 250),
        ];

        let layout = SeatLayout::from_seats(&seats);
        assert_eq!(layout.labels().collect::<Vec<_>>(), vec!["A", "B"]);

        let row_a = layout.row("A").unwrap();
        let numbers: Vec<&str> = row_a.iter().map(|s| s.seat_number.as_str()).collect();
        assert_eq!(numbers, vec!["A1", "A2", "A10"]);

        assert!(row_a[1].is_reserved);
        assert!(!row_a[1].is_available);
        assert!(!row_a[1].is_booked);
        assert_eq!(layout.row("B").unwrap()[0].price, 300);
    }

    #[test]
    fn test_skips_seats_without_number() {
        let showtime_id = Uuid::new_v4();
        let seats = vec![Seat::new(showtime_id, "", 250), Seat::new(showtime_id, "A1", 250)];

        let layout = SeatLayout::from_seats(&seats);
        assert_eq!(layout.seat_count(), 1);
        assert_eq!(layout.row("A").unwrap().len(), 1);
    }

    #[test]
    fn test_serializes_as_row_map() {
        let showtime_id = Uuid::new_v4();
        let layout = SeatLayout::from_seats(&[Seat::new(showtime_id, "C3", 250)]);

        let json = serde_json::to_value(&layout).unwrap();
        assert_eq!(json["C"][0]["seat_number"], "C3");
        assert_eq!(json["C"][0]["is_available"], true);
    }
}

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CoreError, CoreResult};

/// Where a seat is in its lifecycle. Exactly one state holds at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatState {
    Available,
    Reserved,
    Booked,
}

impl SeatState {
    /// Rebuild the state from the persisted reserved/booked flags. Booked wins
    /// over reserved; neither means available.
    pub fn from_flags(is_reserved: bool, is_booked: bool) -> Self {
        if is_booked {
            SeatState::Booked
        } else if is_reserved {
            SeatState::Reserved
        } else {
            SeatState::Available
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub id: Uuid,
    pub showtime_id: Uuid,
    pub seat_number: String,
    pub price: i32,
    pub state: SeatState,
    pub reserved_by: Option<Uuid>,
    pub reserved_at: Option<DateTime<Utc>>,
}

impl Seat {
    pub fn new(showtime_id: Uuid, seat_number: impl Into<String>, price: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            showtime_id,
            seat_number: seat_number.into(),
            price,
            state: SeatState::Available,
            reserved_by: None,
            reserved_at: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.state == SeatState::Available
    }

    pub fn is_reserved(&self) -> bool {
        self.state == SeatState::Reserved
    }

    pub fn is_booked(&self) -> bool {
        self.state == SeatState::Booked
    }

    /// Row label, the first character of the seat number ("A" for "A10").
    pub fn row_label(&self) -> Option<char> {
        self.seat_number.chars().next()
    }

    /// Position within the row ("A10" -> 10). `None` if the suffix is not numeric.
    pub fn row_index(&self) -> Option<u32> {
        let label = self.row_label()?;
        self.seat_number[label.len_utf8()..].parse().ok()
    }

    /// Available -> Reserved, stamping the holder.
    pub fn reserve(&mut self, user_id: Uuid, at: DateTime<Utc>) -> CoreResult<()> {
        if !self.is_available() {
            return Err(CoreError::ConflictError(format!(
                "Seat {} is already booked or reserved",
                self.seat_number
            )));
        }

        self.state = SeatState::Reserved;
        self.reserved_by = Some(user_id);
        self.reserved_at = Some(at);
        Ok(())
    }

    /// Check that `user_id` may convert this hold into a booking.
    pub fn ensure_bookable_by(&self, user_id: Uuid) -> CoreResult<()> {
        if !self.is_reserved() {
            return Err(CoreError::ConflictError(format!(
                "Seat {} is not reserved or reservation expired",
                self.seat_number
            )));
        }

        if self.reserved_by != Some(user_id) {
            return Err(CoreError::ForbiddenError(format!(
                "Seat {} is reserved by another user; you can only book seats you reserved",
                self.seat_number
            )));
        }

        Ok(())
    }

    /// Reserved -> Booked. The holder is kept as the buyer of record.
    pub fn book(&mut self, user_id: Uuid) -> CoreResult<()> {
        self.ensure_bookable_by(user_id)?;
        self.state = SeatState::Booked;
        Ok(())
    }

    /// Whether this seat carries a hold placed at or before `cutoff`.
    /// A reserved seat without a timestamp counts as held since forever.
    pub fn held_since(&self, cutoff: DateTime<Utc>) -> bool {
        self.is_reserved() && self.reserved_at.map_or(true, |at| at <= cutoff)
    }

    /// Reserved -> Available for a hold placed at or before `cutoff`. Returns
    /// whether the seat changed; booked seats, available seats and newer holds
    /// are left alone.
    pub fn release_if_held_since(&mut self, cutoff: DateTime<Utc>) -> bool {
        if !self.held_since(cutoff) {
            return false;
        }

        self.state = SeatState::Available;
        self.reserved_by = None;
        self.reserved_at = None;
        true
    }
}

/// A Reserve or Book request on behalf of an already authenticated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatRequest {
    pub showtime_id: Uuid,
    pub user_id: Uuid,
    pub seat_ids: Vec<Uuid>,
}

impl SeatRequest {
    pub fn new(showtime_id: Uuid, user_id: Uuid, seat_ids: Vec<Uuid>) -> Self {
        Self { showtime_id, user_id, seat_ids }
    }

    /// Reject empty and duplicate seat sets before any storage access.
    pub fn validate(&self) -> CoreResult<()> {
        if self.seat_ids.is_empty() {
            return Err(CoreError::ValidationError("seat_ids must not be empty".to_string()));
        }

        let mut seen = HashSet::with_capacity(self.seat_ids.len());
        for id in &self.seat_ids {
            if !seen.insert(id) {
                return Err(CoreError::ValidationError(format!(
                    "Duplicate seat IDs found: {}",
                    id
                )));
            }
        }

        Ok(())
    }

    /// Seat ids in the order their row locks are taken. A single global
    /// order keeps overlapping batches from deadlocking.
    pub fn lock_order(&self) -> Vec<Uuid> {
        let mut ids = self.seat_ids.clone();
        ids.sort();
        ids
    }
}

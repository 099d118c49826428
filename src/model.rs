use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::limits::MAX_BOOKING_ID_LEN;

/// Unix milliseconds. The only time type.
pub type Ms = i64;

/// Opaque booking identifier. New ids are ULIDs; ids loaded from an existing
/// mirror may be any non-empty string (the original data file used UUIDs).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BookingId(String);

impl BookingId {
    pub fn generate() -> Self {
        Self(Ulid::new().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BookingId {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err("empty booking id".into());
        }
        if trimmed.len() > MAX_BOOKING_ID_LEN {
            return Err(format!("booking id longer than {MAX_BOOKING_ID_LEN} bytes"));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl FromStr for BookingId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.to_string())
    }
}

impl From<BookingId> for String {
    fn from(id: BookingId) -> Self {
        id.0
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    /// Back-to-back spans (`a.end == b.start`) do not overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Contact details of whoever holds a booking. Opaque to the store.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Owner {
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// A reservation of one room. Field names on disk follow the original data file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: BookingId,
    #[serde(rename = "user")]
    pub owner_name: String,
    #[serde(rename = "email")]
    pub owner_email: String,
    #[serde(rename = "phone")]
    pub owner_phone: String,
    #[serde(with = "crate::clock::iso8601")]
    pub start_time: Ms,
    #[serde(with = "crate::clock::iso8601")]
    pub end_time: Ms,
    pub room: String,
    #[serde(with = "crate::clock::iso8601", default = "crate::clock::system_now_ms")]
    pub created_at: Ms,
}

impl Booking {
    pub fn span(&self) -> Span {
        Span {
            start: self.start_time,
            end: self.end_time,
        }
    }
}

/// Replacement values for an update. `None` keeps the stored value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BookingPatch {
    pub room: Option<String>,
    pub start_time: Option<Ms>,
    pub end_time: Option<Ms>,
    pub owner_name: Option<String>,
    pub owner_email: Option<String>,
    pub owner_phone: Option<String>,
}

impl BookingPatch {
    /// Merge onto `current`. Identity and creation stamp never change.
    pub fn apply_to(&self, current: &Booking) -> Booking {
        Booking {
            id: current.id.clone(),
            owner_name: self.owner_name.clone().unwrap_or_else(|| current.owner_name.clone()),
            owner_email: self.owner_email.clone().unwrap_or_else(|| current.owner_email.clone()),
            owner_phone: self.owner_phone.clone().unwrap_or_else(|| current.owner_phone.clone()),
            start_time: self.start_time.unwrap_or(current.start_time),
            end_time: self.end_time.unwrap_or(current.end_time),
            room: self.room.clone().unwrap_or_else(|| current.room.clone()),
            created_at: current.created_at,
        }
    }
}

/// All bookings of one room, sorted by `start_time`.
#[derive(Debug, Clone, Default)]
pub struct RoomState {
    pub bookings: Vec<Booking>,
}

impl RoomState {
    /// Insert booking maintaining sort order by start.
    pub fn insert_booking(&mut self, booking: Booking) {
        let pos = self
            .bookings
            .binary_search_by_key(&booking.start_time, |b| b.start_time)
            .unwrap_or_else(|e| e);
        self.bookings.insert(pos, booking);
    }

    pub fn remove_booking(&mut self, id: &BookingId) -> Option<Booking> {
        let pos = self.bookings.iter().position(|b| &b.id == id)?;
        Some(self.bookings.remove(pos))
    }

    /// Bookings whose span overlaps the query window.
    /// Binary search skips everything starting at or after `query.end`.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &Booking> {
        let right_bound = self
            .bookings
            .partition_point(|b| b.start_time < query.end);
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| b.end_time > query.start)
    }

    pub fn is_empty(&self) -> bool {
        self.bookings.is_empty()
    }
}

/// A mutation of the booking table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Created(Booking),
    Updated(Booking),
    Deleted(BookingId),
    Cleared,
}

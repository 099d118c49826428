use std::collections::HashMap;

use crate::model::*;

/// The authoritative in-memory collection: bookings grouped by room, plus a
/// reverse index from booking id to room.
#[derive(Debug, Clone, Default)]
pub struct BookingTable {
    rooms: HashMap<String, RoomState>,
    booking_room: HashMap<BookingId, String>,
}

impl BookingTable {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Lookups ──────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.booking_room.len()
    }

    pub fn is_empty(&self) -> bool {
        self.booking_room.is_empty()
    }

    pub fn contains(&self, id: &BookingId) -> bool {
        self.booking_room.contains_key(id)
    }

    pub fn get(&self, id: &BookingId) -> Option<&Booking> {
        let room = self.booking_room.get(id)?;
        self.rooms.get(room)?.bookings.iter().find(|b| &b.id == id)
    }

    pub fn room(&self, room: &str) -> Option<&RoomState> {
        self.rooms.get(room)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Booking> {
        self.rooms.values().flat_map(|rs| rs.bookings.iter())
    }

    /// Owned copy of every booking, in no particular order.
    pub fn snapshot(&self) -> Vec<Booking> {
        self.iter().cloned().collect()
    }

    // ── Change application ───────────────────────────────────

    fn insert(&mut self, booking: Booking) {
        self.booking_room.insert(booking.id.clone(), booking.room.clone());
        self.rooms
            .entry(booking.room.clone())
            .or_default()
            .insert_booking(booking);
    }

    fn remove(&mut self, id: &BookingId) -> Option<Booking> {
        let room = self.booking_room.remove(id)?;
        let rs = self.rooms.get_mut(&room)?;
        let removed = rs.remove_booking(id);
        if rs.is_empty() {
            self.rooms.remove(&room);
        }
        removed
    }

    /// Apply a change with no validation. Callers check intervals and conflicts first.
    pub fn apply(&mut self, change: &Change) {
        match change {
            Change::Created(booking) => self.insert(booking.clone()),
            Change::Updated(booking) => {
                self.remove(&booking.id);
                self.insert(booking.clone());
            }
            Change::Deleted(id) => {
                self.remove(id);
            }
            Change::Cleared => {
                self.rooms.clear();
                self.booking_room.clear();
            }
        }
    }

    /// The table as it would look after `change`, leaving `self` untouched.
    pub fn with_change(&self, change: &Change) -> Self {
        let mut next = self.clone();
        next.apply(change);
        next
    }
}

use crate::model::*;

use super::{Store, StoreError};

impl Store {
    pub async fn get(&self, id: &BookingId) -> Result<Option<Booking>, StoreError> {
        let guard = self.ready().await?.read().await;
        Ok(guard.get(id).cloned())
    }

    /// Every booking, in no particular order.
    pub async fn list(&self) -> Result<Vec<Booking>, StoreError> {
        let guard = self.ready().await?.read().await;
        Ok(guard.snapshot())
    }

    /// Bookings of one room, ordered by start.
    pub async fn list_room(&self, room: &str) -> Result<Vec<Booking>, StoreError> {
        let guard = self.ready().await?.read().await;
        Ok(guard
            .room(room)
            .map(|rs| rs.bookings.clone())
            .unwrap_or_default())
    }

    pub async fn len(&self) -> Result<usize, StoreError> {
        let guard = self.ready().await?.read().await;
        Ok(guard.len())
    }
}

use tracing::debug;

use crate::model::*;
use crate::observability;

use super::conflict::{check_no_conflict, validate_interval};
use super::table::BookingTable;
use super::{Store, StoreError};

fn check_or_count(
    table: &BookingTable,
    room: &str,
    span: &Span,
    exclude: Option<&BookingId>,
    op: &'static str,
) -> Result<(), StoreError> {
    check_no_conflict(table, room, span, exclude).inspect_err(|_| {
        metrics::counter!(observability::CONFLICTS_TOTAL, "op" => op).increment(1);
    })
}

impl Store {
    /// Book `room` for `[start, end)`. The returned booking is a copy.
    pub async fn create(
        &self,
        room: impl Into<String>,
        start: Ms,
        end: Ms,
        owner: Owner,
    ) -> Result<Booking, StoreError> {
        let span = validate_interval(start, end)?;
        let room = room.into();
        let mut guard = self.ready().await?.write().await;

        check_or_count(&guard, &room, &span, None, "create")?;

        let mut id = BookingId::generate();
        while guard.contains(&id) {
            id = BookingId::generate();
        }
        let booking = Booking {
            id,
            owner_name: owner.name,
            owner_email: owner.email,
            owner_phone: owner.phone,
            start_time: span.start,
            end_time: span.end,
            room,
            created_at: self.clock.now_ms(),
        };
        self.persist_and_apply(&mut guard, &Change::Created(booking.clone()))
            .await?;
        metrics::counter!(observability::BOOKINGS_CREATED_TOTAL).increment(1);
        debug!("created booking {} in {} [{}, {})", booking.id, booking.room, start, end);
        Ok(booking)
    }

    /// Replace the fields set in `patch`. The merged interval is re-validated
    /// and checked against every other booking of the resulting room.
    pub async fn update(&self, id: &BookingId, patch: BookingPatch) -> Result<Booking, StoreError> {
        let mut guard = self.ready().await?.write().await;
        let current = guard
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        let updated = patch.apply_to(current);

        let span = validate_interval(updated.start_time, updated.end_time)?;
        check_or_count(&guard, &updated.room, &span, Some(id), "update")?;

        self.persist_and_apply(&mut guard, &Change::Updated(updated.clone()))
            .await?;
        metrics::counter!(observability::BOOKINGS_UPDATED_TOTAL).increment(1);
        debug!("updated booking {id}");
        Ok(updated)
    }

    /// Remove a booking. Returns `false`, without touching the mirror, if it
    /// did not exist.
    pub async fn delete(&self, id: &BookingId) -> Result<bool, StoreError> {
        let mut guard = self.ready().await?.write().await;
        if !guard.contains(id) {
            return Ok(false);
        }
        self.persist_and_apply(&mut guard, &Change::Deleted(id.clone()))
            .await?;
        metrics::counter!(observability::BOOKINGS_DELETED_TOTAL).increment(1);
        debug!("deleted booking {id}");
        Ok(true)
    }

    /// Drop every booking and persist the empty collection.
    pub async fn clear(&self) -> Result<(), StoreError> {
        let mut guard = self.ready().await?.write().await;
        let removed = guard.len();
        self.persist_and_apply(&mut guard, &Change::Cleared).await?;
        debug!("cleared {removed} bookings");
        Ok(())
    }
}

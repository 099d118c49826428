use crate::model::*;

use super::table::BookingTable;
use super::StoreError;

pub(crate) fn validate_interval(start: Ms, end: Ms) -> Result<Span, StoreError> {
    if start >= end {
        return Err(StoreError::InvalidInterval { start, end });
    }
    Ok(Span::new(start, end))
}

/// Fail with the id of the first booking in `room` that overlaps `span`.
/// `exclude` skips the booking being updated so it never conflicts with itself.
pub(crate) fn check_no_conflict(
    table: &BookingTable,
    room: &str,
    span: &Span,
    exclude: Option<&BookingId>,
) -> Result<(), StoreError> {
    let Some(rs) = table.room(room) else {
        return Ok(());
    };
    for existing in rs.overlapping(span) {
        if Some(&existing.id) == exclude {
            continue;
        }
        // new_start < existing_end && new_end > existing_start
        if span.start < existing.end_time && span.end > existing.start_time {
            return Err(StoreError::Conflict(existing.id.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const H: Ms = 3_600_000;

    fn table_with(bookings: &[(&str, Ms, Ms)]) -> (BookingTable, Vec<BookingId>) {
        let mut table = BookingTable::new();
        let mut ids = Vec::new();
        for (room, start, end) in bookings {
            let b = Booking {
                id: BookingId::generate(),
                owner_name: "x".into(),
                owner_email: "x@example.com".into(),
                owner_phone: "0".into(),
                start_time: *start,
                end_time: *end,
                room: (*room).into(),
                created_at: 0,
            };
            ids.push(b.id.clone());
            table.apply(&Change::Created(b));
        }
        (table, ids)
    }

    #[test]
    fn rejects_empty_and_reversed_intervals() {
        assert_eq!(
            validate_interval(10 * H, 10 * H),
            Err(StoreError::InvalidInterval { start: 10 * H, end: 10 * H })
        );
        assert!(validate_interval(11 * H, 10 * H).is_err());
        assert_eq!(validate_interval(10 * H, 11 * H), Ok(Span::new(10 * H, 11 * H)));
    }

    #[test]
    fn back_to_back_is_legal() {
        let (table, _) = table_with(&[("room-1", 10 * H, 11 * H)]);
        assert!(check_no_conflict(&table, "room-1", &Span::new(11 * H, 12 * H), None).is_ok());
        assert!(check_no_conflict(&table, "room-1", &Span::new(9 * H, 10 * H), None).is_ok());
    }

    #[test]
    fn partial_and_enclosing_overlaps_conflict() {
        let (table, ids) = table_with(&[("room-1", 10 * H, 11 * H)]);
        let half = Span::new(10 * H + 30 * 60_000, 11 * H + 30 * 60_000);
        assert_eq!(
            check_no_conflict(&table, "room-1", &half, None),
            Err(StoreError::Conflict(ids[0].clone()))
        );
        let enclosing = Span::new(9 * H, 12 * H);
        assert!(check_no_conflict(&table, "room-1", &enclosing, None).is_err());
        let inside = Span::new(10 * H + 1, 11 * H - 1);
        assert!(check_no_conflict(&table, "room-1", &inside, None).is_err());
    }

    #[test]
    fn other_rooms_do_not_conflict() {
        let (table, _) = table_with(&[("room-1", 10 * H, 11 * H)]);
        assert!(check_no_conflict(&table, "room-2", &Span::new(10 * H, 11 * H), None).is_ok());
    }

    #[test]
    fn excluded_booking_is_skipped() {
        let (table, ids) = table_with(&[("room-1", 9 * H, 10 * H), ("room-1", 10 * H, 11 * H)]);
        let same = Span::new(9 * H, 10 * H);
        assert!(check_no_conflict(&table, "room-1", &same, Some(&ids[0])).is_ok());
        let into_next = Span::new(9 * H + 30 * 60_000, 10 * H + 30 * 60_000);
        assert_eq!(
            check_no_conflict(&table, "room-1", &into_next, Some(&ids[0])),
            Err(StoreError::Conflict(ids[1].clone()))
        );
    }
}
